use std::fs;
use std::path::{Path, PathBuf};

use unicode_normalization::UnicodeNormalization;

use crate::config::RetentionPolicy;

const RESERVED_DEVICE_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Filename is empty after sanitization")]
    EmptyFilename,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An upload after it has been written to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredUpload {
    pub original_name: String,
    pub file_name: String,
    pub path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct UploadStore {
    upload_dir: PathBuf,
    retention: RetentionPolicy,
}

impl UploadStore {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            retention: RetentionPolicy::Keep,
        }
    }

    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    /// Creates the upload directory (and parents) if it does not exist yet.
    pub fn ensure_dir(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.upload_dir)?;
        Ok(())
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Compatibility-decomposes the name so accented letters keep their ASCII base,
    /// then keeps only `[A-Za-z0-9_.-]`. Device names are only special on Windows.
    pub fn sanitize_filename(file_name: &str) -> String {
        let ascii: String = file_name
            .nfkd()
            .filter(char::is_ascii)
            .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
            .collect();

        let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");
        let filtered: String = joined
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
            .collect();
        let trimmed = filtered.trim_matches(|c| c == '.' || c == '_');

        let stem = trimmed.split('.').next().unwrap_or_default();
        if cfg!(windows)
            && !trimmed.is_empty()
            && RESERVED_DEVICE_NAMES.contains(&stem.to_ascii_uppercase().as_str())
        {
            return format!("_{}", trimmed);
        }
        trimmed.to_string()
    }

    /// Writes `data` under the sanitized name, replacing whatever was there.
    pub fn save(&self, original_name: &str, data: &[u8]) -> Result<StoredUpload, StorageError> {
        let file_name = Self::sanitize_filename(original_name);
        if file_name.is_empty() {
            return Err(StorageError::EmptyFilename);
        }

        let path = self.upload_dir.join(&file_name);
        fs::write(&path, data)?;
        log::info!("File saved at: {}", path.display());

        Ok(StoredUpload {
            original_name: original_name.to_string(),
            file_name,
            path,
        })
    }

    pub fn remove(&self, upload: &StoredUpload) -> Result<(), StorageError> {
        fs::remove_file(&upload.path)?;
        log::info!("Removed upload {}", upload.path.display());
        Ok(())
    }

    /// Called once a prediction has finished with the file. Under `Keep` this is a no-op.
    pub fn release(&self, upload: &StoredUpload) {
        if self.retention == RetentionPolicy::Delete {
            if let Err(e) = self.remove(upload) {
                log::warn!("Failed to remove upload {}: {}", upload.path.display(), e);
            }
        }
    }

    /// Maps a request path segment to a file inside the upload directory.
    /// Names that could escape the directory resolve to `None`.
    pub fn resolve(&self, file_name: &str) -> Option<PathBuf> {
        if file_name.is_empty()
            || file_name == "."
            || file_name == ".."
            || file_name.contains(['/', '\\', '\0'])
        {
            return None;
        }
        Some(self.upload_dir.join(file_name))
    }
}
