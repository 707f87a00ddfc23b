use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::debounce::Debouncer;
use crate::api::{mapper, ApiError, RemoteStore};
use crate::clock::Clock;
use crate::models::{CustomCheck, JournalEntry};
use crate::week::WeekKey;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(800);

/// Remote state pulled once per sign-in
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hydration {
    pub entries: BTreeMap<WeekKey, JournalEntry>,
    /// `None` when the user has no settings row yet
    pub custom_checks: Option<Vec<CustomCheck>>,
}

/// Mirrors local edits to the remote store for one signed-in user.
/// Two independent debounced channels: the edited week and the custom
/// checklist. Failed writes are logged and dropped.
pub struct SyncLayer {
    remote: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
    user_id: String,
    entry_channel: Debouncer,
    checks_channel: Debouncer,
}

impl SyncLayer {
    pub fn new(remote: Arc<dyn RemoteStore>, clock: Arc<dyn Clock>, user_id: &str, debounce: Duration) -> Self {
        log::info!("Starting sync for user {} ({}ms debounce)", user_id, debounce.as_millis());
        Self {
            remote,
            clock,
            user_id: user_id.to_string(),
            entry_channel: Debouncer::new(debounce),
            checks_channel: Debouncer::new(debounce),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Fetch the settings row and every week row of the user
    pub async fn hydrate(&self) -> Result<Hydration, ApiError> {
        let (settings, weeks) = futures::join!(
            self.remote.fetch_settings(&self.user_id),
            self.remote.fetch_weeks(&self.user_id)
        );

        let weeks = weeks?;
        let settings = settings?;
        log::info!("Fetched {} remote weeks for {}", weeks.len(), self.user_id);

        Ok(Hydration {
            entries: mapper::week_rows_to_entries(weeks),
            custom_checks: settings.map(|row| row.custom_checks),
        })
    }

    /// Upsert the week after the quiet period; replaces any pending week push
    pub fn push_entry(&self, key: WeekKey, entry: &JournalEntry) {
        let row = mapper::entry_to_week_row(&self.user_id, key, entry, self.clock.now());
        let remote = Arc::clone(&self.remote);

        log::debug!("Week {} queued for sync", key);
        self.entry_channel.call(async move {
            match remote.upsert_week(&row).await {
                Ok(()) => log::debug!("Week {} synced", key),
                Err(e) => log::warn!("Failed to sync week {}: {}", key, e),
            }
        });
    }

    /// Upsert the custom checklist after the quiet period
    pub fn push_custom_checks(&self, checks: &[CustomCheck]) {
        let row = mapper::checks_to_settings_row(&self.user_id, checks, self.clock.now());
        let remote = Arc::clone(&self.remote);

        log::debug!("{} custom checks queued for sync", checks.len());
        self.checks_channel.call(async move {
            if let Err(e) = remote.upsert_settings(&row).await {
                log::warn!("Failed to sync custom checks for {}: {}", row.user_id, e);
            }
        });
    }

    pub fn has_pending(&self) -> bool {
        self.entry_channel.is_pending() || self.checks_channel.is_pending()
    }

    pub fn cancel_pending(&self) {
        self.entry_channel.cancel();
        self.checks_channel.cancel();
    }
}

impl Drop for SyncLayer {
    fn drop(&mut self) {
        self.cancel_pending();
        log::debug!("Sync for user {} stopped", self.user_id);
    }
}
