use anyhow::Result;
use chrono::NaiveDate;

use crate::core::AppConfig;
use crate::fetch::Fetcher;
use crate::filter::filter_new;
use crate::notify::{Notification, Notifier};
use crate::slots::Slot;
use crate::sources::SlotSource;
use crate::store::SeenSet;

/// Outcome of a single polling cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub candidates: usize,
    pub new_slots: Vec<Slot>,
    pub notified: bool,
    pub persisted: bool,
}

/// Everything one cycle needs. The notifier is only consulted when
/// `send_email` is enabled in the config.
pub struct CheckAvailability<'a> {
    pub config: &'a AppConfig,
    pub source: &'a SlotSource,
    pub fetcher: &'a Fetcher,
    pub notifier: &'a dyn Notifier,
}

impl CheckAvailability<'_> {
    /// Load what was already reported, collect from the source, report
    /// anything new and write the merged set back.
    ///
    /// A corrupt seen file or a source that can't produce anything aborts
    /// the cycle before the store is touched. Notification and persist
    /// failures are logged and reflected in the report.
    pub async fn run(&self, today: NaiveDate) -> Result<CycleReport> {
        let AppConfig {
            data_file,
            months_lookahead,
            send_email,
            booking_url,
            ..
        } = self.config;

        let mut seen = SeenSet::load(data_file)?;
        tracing::info!("Loaded {} previously seen appointments", seen.len());

        tracing::info!(
            "Checking {} source for the next {} months",
            self.source.name(),
            months_lookahead
        );
        let candidates = self
            .source
            .collect(self.fetcher, today, *months_lookahead)
            .await?;

        let new_slots = filter_new(&candidates, &seen, *months_lookahead, today);
        let mut report = CycleReport {
            candidates: candidates.len(),
            new_slots: new_slots.clone(),
            ..Default::default()
        };

        if new_slots.is_empty() {
            tracing::info!("No new appointments found");
        } else {
            tracing::info!("Found {} new appointments", new_slots.len());
            for slot in &new_slots {
                tracing::info!("New appointment: {}", slot);
            }

            if *send_email {
                let notification = Notification::for_slots(&new_slots, booking_url);
                match self.notifier.send(&notification).await {
                    Ok(()) => report.notified = true,
                    Err(e) => tracing::error!("Failed to send notification: {}", e),
                }
            } else {
                tracing::info!("Email notifications disabled, skipping send");
            }
        }

        seen.extend(new_slots);
        match seen.save(data_file) {
            Ok(()) => report.persisted = true,
            Err(e) => tracing::error!("Failed to save seen appointments: {}", e),
        }

        Ok(report)
    }
}
