use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Serialize;
use std::path::Path;

use crate::error::{JournalError, Result};
use crate::models::{EntryPatch, Screenshot};
use crate::store::EntryStore;
use crate::week::WeekKey;

/// Per-file size cap; larger images are skipped rather than risking the
/// local cache quota
pub const MAX_SCREENSHOT_BYTES: usize = 2 * 1024 * 1024;

/// A file picked for upload
#[derive(Debug, Clone)]
pub struct ScreenshotFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ScreenshotFile {
    /// Read a file from disk, guessing the MIME type from its extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "screenshot".to_string());
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        Ok(Self {
            name,
            mime_type: mime_for_extension(&extension).to_string(),
            bytes,
        })
    }

    fn check(&self) -> Result<()> {
        if !self.mime_type.starts_with("image/") {
            return Err(JournalError::ValidationError(format!("{} is not an image", self.name)));
        }
        if self.bytes.len() > MAX_SCREENSHOT_BYTES {
            return Err(JournalError::StorageQuotaError(format!(
                "{} is larger than 2MB",
                self.name
            )));
        }
        Ok(())
    }

    fn into_screenshot(self) -> Screenshot {
        Screenshot {
            id: uuid::Uuid::new_v4().to_string(),
            image_data: format!("data:{};base64,{}", self.mime_type, BASE64.encode(&self.bytes)),
            name: self.name,
        }
    }
}

fn mime_for_extension(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScreenshotImport {
    pub added: usize,
    /// One notice per file left out
    pub skipped: Vec<String>,
}

/// Append every acceptable image to the week's screenshots
pub fn attach_screenshots(store: &mut EntryStore, week: WeekKey, files: Vec<ScreenshotFile>) -> ScreenshotImport {
    let mut result = ScreenshotImport::default();
    let mut screenshots = store.get(&week).screenshots;

    for file in files {
        match file.check() {
            Ok(()) => {
                screenshots.push(file.into_screenshot());
                result.added += 1;
            }
            Err(e) => {
                log::info!("Skipping screenshot: {}", e);
                result.skipped.push(e.to_string());
            }
        }
    }

    if result.added > 0 {
        store.update(week, EntryPatch::screenshots(screenshots));
    }
    result
}
