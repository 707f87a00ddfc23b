use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::settings::{CustomCheck, FIXED_CHECKS};
use super::trade::{TradeRecord, WeekStats};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Screenshot {
    pub id: String,
    pub name: String,
    /// `data:<mime>;base64,<payload>` URL
    pub image_data: String,
}

/// A user's journal content for one week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JournalEntry {
    pub context: String,
    pub answers: BTreeMap<String, bool>,
    pub custom_answers: BTreeMap<String, bool>,
    pub stats: WeekStats,
    pub tags: BTreeSet<String>,
    pub screenshots: Vec<Screenshot>,
    pub trades: Vec<TradeRecord>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for JournalEntry {
    fn default() -> Self {
        Self {
            context: String::new(),
            answers: FIXED_CHECKS.iter().map(|c| (c.id.to_string(), false)).collect(),
            custom_answers: BTreeMap::new(),
            stats: WeekStats::default(),
            tags: BTreeSet::new(),
            screenshots: Vec::new(),
            trades: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }
}

impl JournalEntry {
    /// Shallow merge: every field present in `patch` replaces the whole
    /// field. Stamps `updated_at`, sets `created_at` only if missing.
    pub fn apply(&mut self, patch: EntryPatch, now: DateTime<Utc>) {
        if let Some(context) = patch.context {
            self.context = context;
        }
        if let Some(answers) = patch.answers {
            self.answers = answers;
        }
        if let Some(custom_answers) = patch.custom_answers {
            self.custom_answers = custom_answers;
        }
        if let Some(stats) = patch.stats {
            self.stats = stats;
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        if let Some(screenshots) = patch.screenshots {
            self.screenshots = screenshots;
        }
        if let Some(trades) = patch.trades {
            self.trades = trades;
        }

        self.created_at.get_or_insert(now);
        self.updated_at = Some(now);
    }

    /// Percentage of checklist items ticked, over the fixed list plus the
    /// currently configured custom checks. Answers for removed custom
    /// checks are ignored.
    pub fn score(&self, custom_checks: &[CustomCheck]) -> u32 {
        let fixed_true = FIXED_CHECKS
            .iter()
            .filter(|c| self.answers.get(c.id).copied().unwrap_or(false))
            .count();
        let custom_true = custom_checks
            .iter()
            .filter(|c| self.custom_answers.get(&c.id).copied().unwrap_or(false))
            .count();

        score_percent(fixed_true + custom_true, FIXED_CHECKS.len() + custom_checks.len())
    }
}

/// `round(100 * ticked / total)`, 0 for an empty checklist
pub fn score_percent(ticked: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (ticked as f64 * 100.0 / total as f64).round() as u32
}

/// Top-level fields to overwrite on an entry; `None` leaves a field alone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPatch {
    pub context: Option<String>,
    pub answers: Option<BTreeMap<String, bool>>,
    pub custom_answers: Option<BTreeMap<String, bool>>,
    pub stats: Option<WeekStats>,
    pub tags: Option<BTreeSet<String>>,
    pub screenshots: Option<Vec<Screenshot>>,
    pub trades: Option<Vec<TradeRecord>>,
}

impl EntryPatch {
    pub fn context(context: impl Into<String>) -> Self {
        Self {
            context: Some(context.into()),
            ..Self::default()
        }
    }

    pub fn answers(answers: BTreeMap<String, bool>) -> Self {
        Self {
            answers: Some(answers),
            ..Self::default()
        }
    }

    pub fn custom_answers(custom_answers: BTreeMap<String, bool>) -> Self {
        Self {
            custom_answers: Some(custom_answers),
            ..Self::default()
        }
    }

    pub fn tags(tags: BTreeSet<String>) -> Self {
        Self {
            tags: Some(tags),
            ..Self::default()
        }
    }

    pub fn screenshots(screenshots: Vec<Screenshot>) -> Self {
        Self {
            screenshots: Some(screenshots),
            ..Self::default()
        }
    }

    /// Imported trades together with the stats derived from them
    pub fn trades(trades: Vec<TradeRecord>, stats: WeekStats) -> Self {
        Self {
            trades: Some(trades),
            stats: Some(stats),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 14, 9, minute, 0).unwrap()
    }

    #[test]
    fn test_default_entry_is_structurally_complete() {
        let entry = JournalEntry::default();
        let json = serde_json::to_value(&entry).unwrap();

        for field in [
            "context",
            "answers",
            "customAnswers",
            "stats",
            "tags",
            "screenshots",
            "trades",
            "createdAt",
            "updatedAt",
        ] {
            assert!(json.get(field).is_some(), "missing {}", field);
        }
        assert_eq!(json["answers"]["stopLossPlaced"], false);
        assert_eq!(json["stats"]["numberOfTrades"], 0);
    }

    #[test]
    fn test_apply_keeps_created_at_and_stamps_updated_at() {
        let mut entry = JournalEntry::default();
        entry.apply(EntryPatch::context("first"), at(0));
        entry.apply(EntryPatch::context("second"), at(5));

        assert_eq!(entry.context, "second");
        assert_eq!(entry.created_at, Some(at(0)));
        assert_eq!(entry.updated_at, Some(at(5)));
    }

    #[test]
    fn test_apply_replaces_nested_maps_wholesale() {
        let mut entry = JournalEntry::default();
        let mut answers = entry.answers.clone();
        answers.insert("followedPlan".to_string(), true);
        entry.apply(EntryPatch::answers(answers), at(0));

        let only_one = BTreeMap::from([("stopLossPlaced".to_string(), true)]);
        entry.apply(EntryPatch::answers(only_one.clone()), at(1));

        assert_eq!(entry.answers, only_one);
    }

    #[test]
    fn test_score_two_of_three_fixed() {
        let mut entry = JournalEntry::default();
        entry.answers.insert("followedPlan".to_string(), true);
        entry.answers.insert("stopLossPlaced".to_string(), true);

        assert_eq!(entry.score(&[]), 67);
    }

    #[test]
    fn test_score_of_empty_checklist_is_zero() {
        assert_eq!(score_percent(0, 0), 0);
        assert_eq!(score_percent(3, 3), 100);
    }

    #[test]
    fn test_score_counts_configured_custom_checks_only() {
        let checks = vec![CustomCheck {
            id: "custom-a".to_string(),
            label: "Reviewed the news calendar".to_string(),
        }];
        let mut entry = JournalEntry::default();
        entry.custom_answers.insert("custom-a".to_string(), true);
        entry.custom_answers.insert("custom-stale".to_string(), true);

        assert_eq!(entry.score(&checks), 25);
    }

    #[test]
    fn test_older_payload_without_fields_loads() {
        let entry: JournalEntry = serde_json::from_str(r#"{"context":"quiet week"}"#).unwrap();
        assert_eq!(entry.context, "quiet week");
        assert!(entry.trades.is_empty());
        assert_eq!(entry.answers.len(), FIXED_CHECKS.len());
    }
}
