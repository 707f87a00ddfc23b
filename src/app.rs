use tokio::sync::watch;

use crate::commands::{self, ScreenshotFile, ScreenshotImport, TradeImportSummary};
use crate::error::Result;
use crate::models::{fixed_check, CustomCheck, EntryPatch, JournalEntry};
use crate::store::EntryStore;
use crate::sync::SyncLayer;
use crate::week::{DateInput, WeekKey, week_key_for};

/// The journal as one signed-in user edits it: the entry store, the
/// selected week and, while a session is attached, the remote mirror.
/// Every mutation is pushed to the sync channel it touches.
pub struct JournalApp {
    store: EntryStore,
    sync: Option<SyncLayer>,
    /// Set by the idle timeout; once true the session is detached
    ended: Option<watch::Receiver<bool>>,
    current_week: WeekKey,
}

impl JournalApp {
    pub fn new(store: EntryStore) -> Self {
        let current_week = WeekKey::current(store.clock());
        Self {
            store,
            sync: None,
            ended: None,
            current_week,
        }
    }

    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    pub fn current_week(&self) -> WeekKey {
        self.current_week
    }

    pub fn is_syncing(&self) -> bool {
        self.sync.is_some()
    }

    /// Hydrate from the remote store and start mirroring edits. A failed
    /// pull is logged and the local state is kept.
    pub async fn attach_session(&mut self, sync: SyncLayer) {
        match sync.hydrate().await {
            Ok(hydration) => {
                self.store.merge_remote(hydration.entries);
                if let Some(checks) = hydration.custom_checks {
                    self.store.set_custom_checks(checks);
                }
            }
            Err(e) => log::warn!("Hydration failed for {}, keeping local journal: {}", sync.user_id(), e),
        }
        self.sync = Some(sync);
    }

    /// Stop mirroring and forget the in-memory journal
    pub fn detach_session(&mut self) {
        if let Some(sync) = self.sync.take() {
            log::info!("Detaching session {}", sync.user_id());
        }
        self.ended = None;
        self.store.reset();
    }

    /// Detach as soon as `ended` reports the session over, so edits made
    /// after a timeout start from an empty journal
    pub fn watch_termination(&mut self, ended: watch::Receiver<bool>) {
        self.ended = Some(ended);
    }

    fn detach_if_ended(&mut self) {
        if self.ended.as_ref().is_some_and(|ended| *ended.borrow()) {
            log::info!("Session ended, dropping the in-memory journal");
            self.detach_session();
        }
    }

    pub fn select_week<'a>(&mut self, input: impl Into<DateInput<'a>>) -> WeekKey {
        self.current_week = week_key_for(input, self.store.clock());
        self.current_week
    }

    pub fn current_entry(&self) -> JournalEntry {
        self.store.get(&self.current_week)
    }

    pub fn current_score(&self) -> u32 {
        self.store.score(&self.current_week)
    }

    pub fn update_entry(&mut self, key: WeekKey, patch: EntryPatch) -> JournalEntry {
        self.detach_if_ended();
        let entry = self.store.update(key, patch).clone();
        self.push_entry(key, &entry);
        entry
    }

    pub fn update_current(&mut self, patch: EntryPatch) -> JournalEntry {
        self.update_entry(self.current_week, patch)
    }

    /// Tick or untick a checklist item of the current week. Fixed item ids
    /// go to `answers`, anything else to `customAnswers`.
    pub fn set_check(&mut self, id: &str, ticked: bool) -> JournalEntry {
        self.detach_if_ended();
        let entry = self.current_entry();
        let patch = if fixed_check(id).is_some() {
            let mut answers = entry.answers;
            answers.insert(id.to_string(), ticked);
            EntryPatch::answers(answers)
        } else {
            let mut custom_answers = entry.custom_answers;
            custom_answers.insert(id.to_string(), ticked);
            EntryPatch::custom_answers(custom_answers)
        };
        self.update_current(patch)
    }

    pub fn add_tag(&mut self, key: WeekKey, tag: &str) -> JournalEntry {
        self.detach_if_ended();
        let entry = self.store.add_tag(key, tag).clone();
        self.push_entry(key, &entry);
        entry
    }

    pub fn remove_tag(&mut self, key: WeekKey, tag: &str) -> JournalEntry {
        self.detach_if_ended();
        let entry = self.store.remove_tag(key, tag).clone();
        self.push_entry(key, &entry);
        entry
    }

    /// Replace the current week's trades with the in-week rows of a log
    pub fn import_trade_log(&mut self, content: &str) -> Result<TradeImportSummary> {
        self.detach_if_ended();
        let week = self.current_week;
        let summary = commands::import_trade_log(&mut self.store, week, content)?;
        let entry = self.store.get(&week);
        self.push_entry(week, &entry);
        Ok(summary)
    }

    pub fn attach_screenshots(&mut self, files: Vec<ScreenshotFile>) -> ScreenshotImport {
        self.detach_if_ended();
        let week = self.current_week;
        let result = commands::attach_screenshots(&mut self.store, week, files);
        if result.added > 0 {
            let entry = self.store.get(&week);
            self.push_entry(week, &entry);
        }
        result
    }

    pub fn remove_screenshot(&mut self, id: &str) -> JournalEntry {
        self.detach_if_ended();
        let week = self.current_week;
        let entry = self.store.remove_screenshot(week, id).clone();
        self.push_entry(week, &entry);
        entry
    }

    pub fn custom_checks(&self) -> &[CustomCheck] {
        self.store.custom_checks()
    }

    pub fn add_custom_check(&mut self, label: &str) -> Result<CustomCheck> {
        self.detach_if_ended();
        let check = self.store.add_custom_check(label)?;
        self.push_custom_checks();
        Ok(check)
    }

    pub fn rename_custom_check(&mut self, id: &str, label: &str) -> Result<()> {
        self.detach_if_ended();
        self.store.rename_custom_check(id, label)?;
        self.push_custom_checks();
        Ok(())
    }

    pub fn remove_custom_check(&mut self, id: &str) -> bool {
        self.detach_if_ended();
        let removed = self.store.remove_custom_check(id);
        if removed {
            self.push_custom_checks();
        }
        removed
    }

    pub fn export_backup(&self) -> Result<String> {
        commands::export_backup(&self.store)
    }

    /// Replace the journal with a backup; the checklist and the selected
    /// week are pushed upstream afterwards
    pub fn restore_backup(&mut self, json_data: &str) -> Result<(usize, usize)> {
        self.detach_if_ended();
        let counts = commands::restore_backup(&mut self.store, json_data)?;
        self.push_custom_checks();
        let entry = self.current_entry();
        self.push_entry(self.current_week, &entry);
        Ok(counts)
    }

    fn push_entry(&self, key: WeekKey, entry: &JournalEntry) {
        if let Some(sync) = &self.sync {
            sync.push_entry(key, entry);
        }
    }

    fn push_custom_checks(&self) {
        if let Some(sync) = &self.sync {
            sync.push_custom_checks(self.store.custom_checks());
        }
    }
}
