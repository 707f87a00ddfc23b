use crate::error::{JournalError, Result};
use crate::models::BackupDocument;
use crate::store::EntryStore;

/// Export the whole journal as pretty JSON
pub fn export_backup(store: &EntryStore) -> Result<String> {
    let backup = BackupDocument::new(store.document(), store.clock().now());
    serde_json::to_string_pretty(&backup)
        .map_err(|e| JournalError::ValidationError(format!("Failed to serialize backup: {}", e)))
}

/// Replace the whole journal with a backup. The document must be an object
/// carrying both `entries` and `customChecks`; otherwise nothing changes.
pub fn restore_backup(store: &mut EntryStore, json_data: &str) -> Result<(usize, usize)> {
    let value: serde_json::Value = serde_json::from_str(json_data)
        .map_err(|e| JournalError::ValidationError(format!("Backup is not valid JSON: {}", e)))?;

    let has_keys = value
        .as_object()
        .is_some_and(|obj| obj.contains_key("entries") && obj.contains_key("customChecks"));
    if !has_keys {
        return Err(JournalError::ValidationError(
            "Backup must contain entries and customChecks".to_string(),
        ));
    }

    let backup: BackupDocument = serde_json::from_value(value)
        .map_err(|e| JournalError::ValidationError(format!("Backup has an invalid shape: {}", e)))?;
    if backup.version > crate::models::BACKUP_VERSION {
        log::warn!("Restoring backup from newer version {}", backup.version);
    }

    let document = backup.into_document();
    let counts = (document.entries.len(), document.custom_checks.len());
    store.replace_all(document);
    log::info!("Restored {} weeks and {} custom checks", counts.0, counts.1);

    Ok(counts)
}
