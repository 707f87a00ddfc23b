use std::sync::{Arc, Mutex};

use super::connection::Database;
use crate::error::{JournalError, Result};
use crate::models::JournalDocument;

/// Single key holding the whole `{entries, customChecks}` document
pub const CACHE_KEY: &str = "weekly-journal:v2";

/// Local persisted copy of the journal, read once at startup and
/// rewritten after every change
pub trait LocalCache: Send + Sync {
    fn load(&self) -> Result<Option<JournalDocument>>;
    fn save(&self, document: &JournalDocument) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

pub struct SqliteCache {
    db: Arc<Database>,
}

impl SqliteCache {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> Arc<Database> {
        Arc::clone(&self.db)
    }
}

impl LocalCache for SqliteCache {
    fn load(&self) -> Result<Option<JournalDocument>> {
        let Some(raw) = self.db.get(CACHE_KEY)? else {
            return Ok(None);
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| JournalError::CacheError(format!("Failed to parse cached journal: {}", e)))
    }

    fn save(&self, document: &JournalDocument) -> Result<()> {
        let raw = serde_json::to_string(document)
            .map_err(|e| JournalError::CacheError(format!("Failed to serialize journal: {}", e)))?;
        self.db.set(CACHE_KEY, &raw)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.db.remove(CACHE_KEY)?;
        Ok(())
    }
}

/// Process-local cache, used when no cache file is configured
#[derive(Default)]
pub struct MemoryCache {
    document: Mutex<Option<JournalDocument>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalCache for MemoryCache {
    fn load(&self) -> Result<Option<JournalDocument>> {
        Ok(self.document.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save(&self, document: &JournalDocument) -> Result<()> {
        *self.document.lock().unwrap_or_else(|e| e.into_inner()) = Some(document.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.document.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CustomCheck, JournalEntry};
    use crate::week::WeekKey;

    fn sample_document() -> JournalDocument {
        let mut document = JournalDocument::default();
        let key = WeekKey::parse("2026-10-12_2026-10-18").unwrap();
        let mut entry = JournalEntry::default();
        entry.context = "Range-bound week, sat on hands".to_string();
        document.entries.insert(key, entry);
        document.custom_checks.push(CustomCheck {
            id: "custom-1".to_string(),
            label: "Checked the calendar".to_string(),
        });
        document
    }

    #[test]
    fn test_sqlite_cache_round_trips_document() {
        let cache = SqliteCache::new(Arc::new(Database::open_in_memory().unwrap()));
        assert!(cache.load().unwrap().is_none());

        let document = sample_document();
        cache.save(&document).unwrap();
        assert_eq!(cache.load().unwrap(), Some(document));

        cache.clear().unwrap();
        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_cache_is_a_cache_error() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.set(CACHE_KEY, "{not json").unwrap();

        let cache = SqliteCache::new(db);
        assert!(matches!(cache.load(), Err(JournalError::CacheError(_))));
    }

    #[test]
    fn test_memory_cache_clear() {
        let cache = MemoryCache::new();
        cache.save(&sample_document()).unwrap();
        cache.clear().unwrap();
        assert!(cache.load().unwrap().is_none());
    }
}
