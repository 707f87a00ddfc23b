use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::clock::Clock;
use crate::db::LocalCache;
use crate::error::{JournalError, Result};
use crate::models::{CustomCheck, EntryPatch, JournalDocument, JournalEntry};
use crate::week::WeekKey;

/// One line of the history table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekSummary {
    pub week: WeekKey,
    pub score: u32,
    pub number_of_trades: u32,
    pub pnl: f64,
    pub tags: Vec<String>,
    pub screenshot_count: usize,
}

/// Week-keyed journal entries plus the shared custom checklist.
/// Every mutation rewrites the local cache.
pub struct EntryStore {
    entries: BTreeMap<WeekKey, JournalEntry>,
    custom_checks: Vec<CustomCheck>,
    cache: Arc<dyn LocalCache>,
    clock: Arc<dyn Clock>,
}

impl EntryStore {
    pub fn new(cache: Arc<dyn LocalCache>, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: BTreeMap::new(),
            custom_checks: Vec::new(),
            cache,
            clock,
        }
    }

    /// Store seeded from the local cache. An unreadable cache is logged
    /// and the store starts empty.
    pub fn load(cache: Arc<dyn LocalCache>, clock: Arc<dyn Clock>) -> Self {
        let mut store = Self::new(cache, clock);
        match store.cache.load() {
            Ok(Some(document)) => {
                log::info!(
                    "Loaded {} cached weeks and {} custom checks",
                    document.entries.len(),
                    document.custom_checks.len()
                );
                store.entries = document.entries;
                store.custom_checks = document.custom_checks;
            }
            Ok(None) => log::info!("No cached journal found"),
            Err(e) => log::warn!("Ignoring unreadable journal cache: {}", e),
        }
        store
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Entry for `key`, or a complete empty entry when the week is new
    pub fn get(&self, key: &WeekKey) -> JournalEntry {
        self.entries.get(key).cloned().unwrap_or_default()
    }

    pub fn contains(&self, key: &WeekKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn entries(&self) -> &BTreeMap<WeekKey, JournalEntry> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Shallow-merge `patch` into the week's entry, creating it if needed
    pub fn update(&mut self, key: WeekKey, patch: EntryPatch) -> &JournalEntry {
        let now = self.clock.now();
        let entry = self.entries.entry(key).or_default();
        entry.apply(patch, now);
        self.persist();
        &self.entries[&key]
    }

    /// Remote entries overwrite local ones for the same week; local-only
    /// weeks stay
    pub fn merge_remote(&mut self, remote: BTreeMap<WeekKey, JournalEntry>) {
        let incoming = remote.len();
        self.entries.extend(remote);
        log::info!("Merged {} remote weeks, {} weeks in store", incoming, self.entries.len());
        self.persist();
    }

    pub fn custom_checks(&self) -> &[CustomCheck] {
        &self.custom_checks
    }

    pub fn set_custom_checks(&mut self, checks: Vec<CustomCheck>) {
        self.custom_checks = checks;
        self.persist();
    }

    pub fn add_custom_check(&mut self, label: &str) -> Result<CustomCheck> {
        if label.trim().is_empty() {
            return Err(JournalError::ValidationError("Check label cannot be empty".to_string()));
        }
        let check = CustomCheck::new(label);
        self.custom_checks.push(check.clone());
        self.persist();
        Ok(check)
    }

    pub fn rename_custom_check(&mut self, id: &str, label: &str) -> Result<()> {
        if label.trim().is_empty() {
            return Err(JournalError::ValidationError("Check label cannot be empty".to_string()));
        }
        let check = self
            .custom_checks
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| JournalError::ValidationError(format!("Unknown check {}", id)))?;
        check.label = label.trim().to_string();
        self.persist();
        Ok(())
    }

    /// Answers already recorded for the check remain in old entries
    pub fn remove_custom_check(&mut self, id: &str) -> bool {
        let before = self.custom_checks.len();
        self.custom_checks.retain(|c| c.id != id);
        let removed = self.custom_checks.len() != before;
        if removed {
            self.persist();
        }
        removed
    }

    pub fn add_tag(&mut self, key: WeekKey, tag: &str) -> &JournalEntry {
        let tag = tag.trim();
        let mut tags = self.get(&key).tags;
        if !tag.is_empty() {
            tags.insert(tag.to_string());
        }
        self.update(key, EntryPatch::tags(tags))
    }

    pub fn remove_tag(&mut self, key: WeekKey, tag: &str) -> &JournalEntry {
        let mut tags: BTreeSet<String> = self.get(&key).tags;
        tags.remove(tag.trim());
        self.update(key, EntryPatch::tags(tags))
    }

    pub fn remove_screenshot(&mut self, key: WeekKey, id: &str) -> &JournalEntry {
        let mut screenshots = self.get(&key).screenshots;
        screenshots.retain(|s| s.id != id);
        self.update(key, EntryPatch::screenshots(screenshots))
    }

    pub fn score(&self, key: &WeekKey) -> u32 {
        self.get(key).score(&self.custom_checks)
    }

    /// Stored weeks, newest first
    pub fn history(&self) -> Vec<WeekSummary> {
        self.entries
            .iter()
            .rev()
            .map(|(week, entry)| WeekSummary {
                week: *week,
                score: entry.score(&self.custom_checks),
                number_of_trades: entry.stats.number_of_trades,
                pnl: entry.stats.pnl,
                tags: entry.tags.iter().cloned().collect(),
                screenshot_count: entry.screenshots.len(),
            })
            .collect()
    }

    pub fn document(&self) -> JournalDocument {
        JournalDocument {
            entries: self.entries.clone(),
            custom_checks: self.custom_checks.clone(),
        }
    }

    /// Drop everything and take `document` as the new state
    pub fn replace_all(&mut self, document: JournalDocument) {
        self.entries = document.entries;
        self.custom_checks = document.custom_checks;
        self.persist();
    }

    /// Forget in-memory state without touching the cache (sign-out)
    pub fn reset(&mut self) {
        self.entries.clear();
        self.custom_checks.clear();
    }

    fn persist(&self) {
        if let Err(e) = self.cache.save(&self.document()) {
            log::warn!("Failed to write journal cache: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::db::MemoryCache;
    use crate::models::Screenshot;
    use chrono::{TimeDelta, TimeZone, Utc};

    fn key() -> WeekKey {
        WeekKey::parse("2026-10-12_2026-10-18").unwrap()
    }

    fn store() -> (EntryStore, Arc<MemoryCache>, ManualClock) {
        let cache = Arc::new(MemoryCache::new());
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 14, 9, 0, 0).unwrap());
        let store = EntryStore::new(cache.clone(), Arc::new(clock.clone()));
        (store, cache, clock)
    }

    #[test]
    fn test_get_missing_week_returns_default() {
        let (store, _, _) = store();
        let entry = store.get(&key());
        assert_eq!(entry, JournalEntry::default());
        assert!(!store.contains(&key()));
    }

    #[test]
    fn test_context_update_keeps_tags_and_screenshots() {
        let (mut store, _, clock) = store();
        store.add_tag(key(), "breakout");
        store.update(
            key(),
            EntryPatch::screenshots(vec![Screenshot {
                id: "s1".to_string(),
                name: "chart.png".to_string(),
                image_data: "data:image/png;base64,AAAA".to_string(),
            }]),
        );
        let created = store.get(&key()).created_at;

        clock.advance(TimeDelta::minutes(3));
        let entry = store.update(key(), EntryPatch::context("Patient entries, two clean setups"));

        assert_eq!(entry.context, "Patient entries, two clean setups");
        assert!(entry.tags.contains("breakout"));
        assert_eq!(entry.screenshots.len(), 1);
        assert_eq!(entry.created_at, created);
        assert_eq!(entry.updated_at, Some(clock.now()));
    }

    #[test]
    fn test_every_mutation_is_cached() {
        let (mut store, cache, _) = store();
        store.update(key(), EntryPatch::context("cached"));

        let document = cache.load().unwrap().unwrap();
        assert_eq!(document.entries[&key()].context, "cached");
    }

    #[test]
    fn test_merge_remote_is_additive() {
        let (mut store, _, _) = store();
        let local_only = key().previous();
        store.update(local_only, EntryPatch::context("local only"));
        store.update(key(), EntryPatch::context("local"));

        let mut remote_entry = JournalEntry::default();
        remote_entry.context = "remote".to_string();
        store.merge_remote(BTreeMap::from([(key(), remote_entry)]));

        assert_eq!(store.get(&key()).context, "remote");
        assert_eq!(store.get(&local_only).context, "local only");
    }

    #[test]
    fn test_history_is_newest_first() {
        let (mut store, _, _) = store();
        store.update(key().previous(), EntryPatch::context("older"));
        store.update(key(), EntryPatch::context("newer"));

        let weeks: Vec<WeekKey> = store.history().iter().map(|w| w.week).collect();
        assert_eq!(weeks, vec![key(), key().previous()]);
    }

    #[test]
    fn test_custom_checks_lifecycle() {
        let (mut store, _, _) = store();
        assert!(store.add_custom_check("   ").is_err());

        let check = store.add_custom_check("No trades during news").unwrap();
        store.rename_custom_check(&check.id, "No trades into news").unwrap();
        assert_eq!(store.custom_checks()[0].label, "No trades into news");

        let answers = BTreeMap::from([(check.id.clone(), true)]);
        store.update(key(), EntryPatch::custom_answers(answers));
        assert_eq!(store.score(&key()), 25);

        assert!(store.remove_custom_check(&check.id));
        assert!(!store.remove_custom_check(&check.id));
        // stale answer stays but no longer counts
        assert!(store.get(&key()).custom_answers.contains_key(&check.id));
        assert_eq!(store.score(&key()), 0);
    }

    #[test]
    fn test_load_reads_cache_once() {
        let (mut store, cache, clock) = store();
        store.update(key(), EntryPatch::context("persisted"));

        let reloaded = EntryStore::load(cache, Arc::new(clock));
        assert_eq!(reloaded.get(&key()).context, "persisted");
    }

    #[test]
    fn test_remove_tag_and_screenshot() {
        let (mut store, _, _) = store();
        store.add_tag(key(), "trend");
        store.add_tag(key(), "  ");
        store.remove_tag(key(), "trend");
        assert!(store.get(&key()).tags.is_empty());

        store.update(
            key(),
            EntryPatch::screenshots(vec![Screenshot {
                id: "s1".to_string(),
                name: "a.png".to_string(),
                image_data: String::new(),
            }]),
        );
        assert!(store.remove_screenshot(key(), "s1").screenshots.is_empty());
    }
}
