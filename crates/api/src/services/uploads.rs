//! Image uploads stored on local disk under UUID names.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Extensions accepted for upload, lower-case.
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "avif"];

/// URL prefix under which stored files are served.
pub const PUBLIC_PREFIX: &str = "/uploads";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Only image files are allowed (jpg, jpeg, png, webp, gif, avif)")]
    UnsupportedType,

    #[error("File exceeds the {0} MB limit")]
    TooLarge(usize),

    #[error("File is empty")]
    Empty,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A file written to the upload directory.
#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub url: String,
    pub filename: String,
    pub original_name: String,
    pub size: usize,
}

/// Lower-cased extension of `name` when it is an accepted image type.
///
/// # Errors
///
/// Returns `UnsupportedType` for missing or unknown extensions.
pub fn image_extension(name: &str) -> Result<String, UploadError> {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or(UploadError::UnsupportedType)?;

    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(UploadError::UnsupportedType)
    }
}

/// Local image store.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    max_bytes: usize,
}

impl UploadStore {
    #[must_use]
    pub const fn new(dir: PathBuf, max_bytes: usize) -> Self {
        Self { dir, max_bytes }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Check one file without writing it, returning its extension.
    ///
    /// # Errors
    ///
    /// Returns error if the file is empty, too large or not an image.
    pub fn validate(&self, original_name: &str, bytes: &[u8]) -> Result<String, UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::Empty);
        }
        if bytes.len() > self.max_bytes {
            return Err(UploadError::TooLarge(self.max_bytes / (1024 * 1024)));
        }
        image_extension(original_name)
    }

    /// Validate and write one file.
    ///
    /// # Errors
    ///
    /// Returns error if the file is empty, too large, not an image, or cannot be written.
    pub async fn store(
        &self,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StoredFile, UploadError> {
        let ext = self.validate(original_name, bytes)?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let filename = format!("{}.{ext}", Uuid::new_v4());
        tokio::fs::write(self.dir.join(&filename), bytes).await?;

        tracing::info!(filename = %filename, size = bytes.len(), "Stored upload");

        Ok(StoredFile {
            url: format!("{PUBLIC_PREFIX}/{filename}"),
            filename,
            original_name: original_name.to_string(),
            size: bytes.len(),
        })
    }

    /// Store a batch of `(original_name, bytes)` files, all or nothing.
    ///
    /// Every file is validated before the first write, and files already
    /// written are removed if a later write fails.
    ///
    /// # Errors
    ///
    /// Returns the first validation or I/O error.
    pub async fn store_all<B: AsRef<[u8]>>(
        &self,
        files: &[(String, B)],
    ) -> Result<Vec<StoredFile>, UploadError> {
        for (name, bytes) in files {
            self.validate(name, bytes.as_ref())?;
        }

        let mut stored = Vec::with_capacity(files.len());
        for (name, bytes) in files {
            match self.store(name, bytes.as_ref()).await {
                Ok(file) => stored.push(file),
                Err(err) => {
                    self.remove(&stored).await;
                    return Err(err);
                }
            }
        }
        Ok(stored)
    }

    async fn remove(&self, files: &[StoredFile]) {
        for file in files {
            if let Err(e) = tokio::fs::remove_file(self.dir.join(&file.filename)).await {
                tracing::warn!(
                    error = %e,
                    filename = %file.filename,
                    "Failed to remove partial upload"
                );
            }
        }
    }
}
