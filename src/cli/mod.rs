use anyhow::Result;
use chrono::Local;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::core::{AppConfig, SourceKind};
use crate::fetch::Fetcher;
use crate::jobs::CheckAvailability;
use crate::notify::SmtpNotifier;
use crate::sources::SlotSource;

/// Poll a booking site for newly opened appointment slots and email
/// anything that hasn't been reported before.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// JSON config file, applied on top of the defaults
    #[arg(long)]
    config_file: Option<PathBuf>,

    /// Number of months ahead to check
    #[arg(long)]
    months: Option<u32>,

    #[arg(long)]
    smtp_server: Option<String>,

    #[arg(long)]
    smtp_port: Option<u16>,

    #[arg(long)]
    smtp_user: Option<String>,

    #[arg(long)]
    smtp_pass: Option<String>,

    #[arg(long)]
    from_email: Option<String>,

    /// Comma separated list of recipients
    #[arg(long, value_delimiter = ',')]
    to_emails: Option<Vec<String>>,

    /// Where previously reported appointments are stored
    #[arg(long)]
    data_file: Option<PathBuf>,

    /// Which booking integration to poll
    #[arg(long, value_enum)]
    source: Option<SourceKind>,

    /// Send an email when new appointments are found (`--send-email false`
    /// turns it off even if the config file enables it)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    send_email: Option<bool>,
}

impl Cli {
    /// Defaults, then the config file, then any flags given on the
    /// command line.
    pub fn config(&self) -> Result<AppConfig> {
        let mut config = AppConfig::default();
        if let Some(path) = &self.config_file {
            config = config.merge_file(path)?;
        }
        self.apply_to(&mut config);
        Ok(config)
    }

    fn apply_to(&self, config: &mut AppConfig) {
        if let Some(months) = self.months {
            config.months_lookahead = months;
        }
        if let Some(server) = &self.smtp_server {
            config.smtp_server = server.clone();
        }
        if let Some(port) = self.smtp_port {
            config.smtp_port = port;
        }
        if let Some(user) = &self.smtp_user {
            config.smtp_username = user.clone();
        }
        if let Some(pass) = &self.smtp_pass {
            config.smtp_password = pass.clone();
        }
        if let Some(from) = &self.from_email {
            config.from_email = from.clone();
        }
        if let Some(to) = &self.to_emails {
            config.to_emails = to
                .iter()
                .map(|addr| addr.trim().to_string())
                .filter(|addr| !addr.is_empty())
                .collect();
        }
        if let Some(path) = &self.data_file {
            config.data_file = path.clone();
        }
        if let Some(source) = self.source {
            config.source = source;
        }
        if let Some(send_email) = self.send_email {
            config.send_email = send_email;
        }
    }
}

pub async fn run() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Cli::parse();
    let config = args.config()?;

    tracing::info!(
        "Using data file {} with a {} month lookahead",
        config.data_file.display(),
        config.months_lookahead
    );

    let fetcher = Fetcher::new(config.http_timeout())?;
    let source = SlotSource::from_config(&config);
    let notifier = SmtpNotifier::from_config(&config);

    let job = CheckAvailability {
        config: &config,
        source: &source,
        fetcher: &fetcher,
        notifier: &notifier,
    };
    let report = job.run(Local::now().date_naive()).await?;

    tracing::info!(
        "Cycle complete: {} candidates, {} new, notified: {}, saved: {}",
        report.candidates,
        report.new_slots.len(),
        report.notified,
        report.persisted
    );

    Ok(())
}
