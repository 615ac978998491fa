use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which remote integration to poll for slots.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Nonce-protected form endpoint, queried once per day
    Token,
    /// JSON calendar API, queried once per month
    #[default]
    Calendar,
    /// Best-effort scrape of the rendered booking page
    Scrape,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub months_lookahead: u32,
    pub smtp_server: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_email: String,
    pub to_emails: Vec<String>,
    pub data_file: PathBuf,
    pub send_email: bool,
    pub source: SourceKind,
    pub booking_url: String,
    pub calendar_api_url: String,
    pub ajax_url: String,
    pub ajax_action: String,
    pub calendar_id: String,
    pub timezone: String,
    pub variant_id: String,
    pub http_timeout_secs: u64,
}

impl AppConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Overlay the values present in a JSON config file. Keys missing from
    /// the file keep their current value.
    pub fn merge_file(mut self, path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let file: FileConfig = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        file.apply(&mut self);
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(self)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let smtp_password = env::var("SLOTWATCH_SMTP_PASSWORD").unwrap_or("pass".to_string());
        let data_file =
            env::var("SLOTWATCH_DATA_FILE").unwrap_or("seen_appointments.json".to_string());

        Self {
            months_lookahead: 3,
            smtp_server: String::from("smtp.example.com"),
            smtp_port: 587,
            smtp_username: String::from("user"),
            smtp_password,
            from_email: String::from("scraper@example.com"),
            to_emails: vec![String::from("recipient@example.com")],
            data_file: PathBuf::from(data_file),
            send_email: false,
            source: SourceKind::default(),
            booking_url: String::from("https://melanzana.com/book-an-appointment"),
            calendar_api_url: String::from(
                "https://app.cowlendar.com/extapi/calendar/685b42f202405a8372cd6b78/availability",
            ),
            ajax_url: String::from("https://melanzana.com/wp-admin/admin-ajax.php"),
            ajax_action: String::from("get_timeslots"),
            calendar_id: String::from("1"),
            timezone: String::from("America/Denver"),
            variant_id: String::from("41855678382123"),
            http_timeout_secs: 30,
        }
    }
}

/// Shape of the JSON config file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileConfig {
    months_lookahead: Option<u32>,
    smtp_server: Option<String>,
    smtp_port: Option<u16>,
    smtp_username: Option<String>,
    smtp_password: Option<String>,
    from_email: Option<String>,
    to_emails: Option<Vec<String>>,
    data_file: Option<PathBuf>,
    send_email: Option<bool>,
    source: Option<SourceKind>,
    booking_url: Option<String>,
    calendar_api_url: Option<String>,
    ajax_url: Option<String>,
    ajax_action: Option<String>,
    calendar_id: Option<String>,
    timezone: Option<String>,
    variant_id: Option<String>,
    http_timeout_secs: Option<u64>,
}

macro_rules! overlay {
    ($src:ident, $dst:ident, $($field:ident),+ $(,)?) => {
        $(
            if let Some(v) = $src.$field {
                $dst.$field = v;
            }
        )+
    };
}

impl FileConfig {
    fn apply(self, config: &mut AppConfig) {
        let file = self;
        overlay!(
            file,
            config,
            months_lookahead,
            smtp_server,
            smtp_port,
            smtp_username,
            smtp_password,
            from_email,
            to_emails,
            data_file,
            send_email,
            source,
            booking_url,
            calendar_api_url,
            ajax_url,
            ajax_action,
            calendar_id,
            timezone,
            variant_id,
            http_timeout_secs,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_values_override_defaults() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"monthsLookahead": 5, "toEmails": ["a@example.com", "b@example.com"], "source": "scrape"}"#,
        )?;

        let config = AppConfig::default().merge_file(&path)?;
        assert_eq!(config.months_lookahead, 5);
        assert_eq!(config.to_emails, vec!["a@example.com", "b@example.com"]);
        assert_eq!(config.source, SourceKind::Scrape);
        // Untouched keys keep their defaults
        assert_eq!(config.smtp_port, 587);
        assert_eq!(config.http_timeout(), Duration::from_secs(30));

        Ok(())
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let result = AppConfig::default().merge_file(Path::new("/definitely/not/here.json"));
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }

    #[test]
    fn test_malformed_config_file_is_an_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.json");
        fs::write(&path, "{ not json")?;

        let result = AppConfig::default().merge_file(&path);
        assert!(result.is_err());

        Ok(())
    }
}
