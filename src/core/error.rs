//! Error types shared across the fetch, extract, filter and store stages.
//!
//! Each stage has its own enum so callers can decide per kind whether a
//! failure skips a single unit of work or aborts the whole cycle.

use std::path::PathBuf;

/// Failure of a single HTTP request.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// DNS, TLS, connection, timeout or body read failure
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The remote answered with a non-2xx status
    #[error("HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::HttpStatus { status, .. } => Some(*status),
            FetchError::Network(_) => None,
        }
    }
}

/// Failure while turning a remote payload into slot candidates.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No security token found in booking page")]
    TokenNotFound,

    #[error("Security token rejected after {attempts} attempts")]
    TokenRejected { attempts: u32 },
}

impl From<serde_json::Error> for ExtractError {
    fn from(e: serde_json::Error) -> Self {
        ExtractError::Parse(e.to_string())
    }
}

/// Failure to normalize partial date information into a calendar date.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DateError {
    #[error("Unknown month name: {0:?}")]
    UnknownMonth(String),

    #[error("Invalid day {day:?} for month {month:?}")]
    InvalidDay { month: String, day: String },
}

/// Failure to read or write the seen-slot file.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Seen-slot file {path} is corrupt: {reason}")]
    CorruptStore { path: PathBuf, reason: String },

    #[error("Failed to read seen slots from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to persist seen slots to {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Invalid email address {address:?}: {reason}")]
    Address { address: String, reason: String },

    #[error("Failed to build email: {0}")]
    Message(String),

    #[error("SMTP delivery failed: {0}")]
    Transport(String),
}
