use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::entry::JournalEntry;
use super::settings::CustomCheck;
use crate::week::WeekKey;

pub const BACKUP_VERSION: u32 = 2;

/// Everything the local cache holds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalDocument {
    #[serde(default)]
    pub entries: BTreeMap<WeekKey, JournalEntry>,
    #[serde(default)]
    pub custom_checks: Vec<CustomCheck>,
}

/// Downloadable backup file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub entries: BTreeMap<WeekKey, JournalEntry>,
    pub custom_checks: Vec<CustomCheck>,
    #[serde(default)]
    pub exported_at: Option<DateTime<Utc>>,
    #[serde(default = "default_backup_version")]
    pub version: u32,
}

fn default_backup_version() -> u32 {
    BACKUP_VERSION
}

impl BackupDocument {
    pub fn new(document: JournalDocument, exported_at: DateTime<Utc>) -> Self {
        Self {
            entries: document.entries,
            custom_checks: document.custom_checks,
            exported_at: Some(exported_at),
            version: BACKUP_VERSION,
        }
    }

    pub fn into_document(self) -> JournalDocument {
        JournalDocument {
            entries: self.entries,
            custom_checks: self.custom_checks,
        }
    }
}
