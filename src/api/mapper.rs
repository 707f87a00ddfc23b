use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use super::client::{SettingsRow, WeekRow};
use crate::models::{CustomCheck, JournalEntry};
use crate::week::WeekKey;

pub fn entry_to_week_row(
    user_id: &str,
    key: WeekKey,
    entry: &JournalEntry,
    now: DateTime<Utc>,
) -> WeekRow {
    WeekRow {
        user_id: user_id.to_string(),
        week_start: key.start(),
        week_end: key.end(),
        payload: entry.clone(),
        updated_at: now,
    }
}

pub fn checks_to_settings_row(user_id: &str, checks: &[CustomCheck], now: DateTime<Utc>) -> SettingsRow {
    SettingsRow {
        user_id: user_id.to_string(),
        custom_checks: checks.to_vec(),
        updated_at: now,
    }
}

/// Index week rows by week key. Rows are bucketed by the week containing
/// `week_start`, so a misaligned start still lands in a real week; when two
/// rows share a week the first one (newest, given the fetch order) wins.
pub fn week_rows_to_entries(rows: Vec<WeekRow>) -> BTreeMap<WeekKey, JournalEntry> {
    let mut entries = BTreeMap::new();
    for row in rows {
        let key = WeekKey::containing(row.week_start);
        if key.start() != row.week_start {
            log::warn!(
                "Week row for {} starts on {} instead of a Monday",
                key,
                row.week_start
            );
        }
        entries.entry(key).or_insert(row.payload);
    }
    entries
}
