//! Disk-backed image storage partitioned by folder
//!
//! Files land in `<root>/<folder>/<unix-millis>-<uuid>.<ext>` and are served
//! back under `/uploads/<folder>/<file>`.

use chrono::Utc;
use std::env;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use crate::error::MediaError;

/// Default upload size limit, 5 MiB
pub const DEFAULT_MAX_BYTES: usize = 5 * 1024 * 1024;

/// Upload storage configuration
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub dir: PathBuf,
    pub max_bytes: usize,
}

impl UploadConfig {
    /// Create a new UploadConfig from environment variables
    ///
    /// # Environment Variables
    /// - `UPLOAD_DIR`: storage root (default: "uploads")
    /// - `UPLOAD_MAX_BYTES`: per-file limit in bytes (default: 5 MiB)
    pub fn from_env() -> Self {
        let dir = env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string());
        let max_bytes = env::var("UPLOAD_MAX_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_BYTES);

        Self {
            dir: PathBuf::from(dir),
            max_bytes,
        }
    }
}

/// Accepted image formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Webp,
}

impl ImageKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "png" => Some(ImageKind::Png),
            "webp" => Some(ImageKind::Webp),
            _ => None,
        }
    }

    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(ImageKind::Jpeg),
            "image/png" => Some(ImageKind::Png),
            "image/webp" => Some(ImageKind::Webp),
            _ => None,
        }
    }
}

/// Check a folder name is a single safe path segment
pub fn validate_folder(folder: &str) -> Result<&str, MediaError> {
    let valid = (1..=64).contains(&folder.len())
        && folder
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid { Ok(folder) } else { Err(MediaError::InvalidFolder) }
}

/// Lower-cased extension of an accepted image, checked against its content type
pub fn checked_extension(file_name: &str, content_type: &str) -> Result<String, MediaError> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match (
        ImageKind::from_extension(&ext),
        ImageKind::from_content_type(content_type),
    ) {
        (Some(_), Some(_)) => Ok(ext),
        (None, _) => Err(MediaError::UnsupportedType(if ext.is_empty() {
            file_name.to_string()
        } else {
            format!(".{}", ext)
        })),
        (_, None) => Err(MediaError::UnsupportedType(content_type.to_string())),
    }
}

/// A file written to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub folder: String,
    pub file_name: String,
}

impl StoredFile {
    /// Public URL of the file
    pub fn url(&self) -> String {
        format!("/uploads/{}/{}", self.folder, self.file_name)
    }
}

/// Stores validated images below a root directory
#[derive(Debug, Clone)]
pub struct DiskStorage {
    root: PathBuf,
    max_bytes: usize,
}

impl DiskStorage {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            root: config.dir.clone(),
            max_bytes: config.max_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Validate and write one image, returning where it was stored
    pub async fn store(
        &self,
        folder: &str,
        original_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<StoredFile, MediaError> {
        let folder = validate_folder(folder)?;
        let ext = checked_extension(original_name, content_type)?;
        if bytes.len() > self.max_bytes {
            return Err(MediaError::TooLarge {
                limit: self.max_bytes,
            });
        }

        let dir = self.root.join(folder);
        tokio::fs::create_dir_all(&dir).await?;

        let file_name = format!(
            "{}-{}.{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4(),
            ext
        );
        tokio::fs::write(dir.join(&file_name), bytes).await?;

        info!("Stored {} bytes as {}/{}", bytes.len(), folder, file_name);

        Ok(StoredFile {
            folder: folder.to_string(),
            file_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn storage(dir: &Path, max_bytes: usize) -> DiskStorage {
        DiskStorage::new(&UploadConfig {
            dir: dir.to_path_buf(),
            max_bytes,
        })
    }

    #[test]
    fn test_folder_names() {
        assert!(validate_folder("cars").is_ok());
        assert!(validate_folder("avatars_2024-01").is_ok());
        assert!(validate_folder("").is_err());
        assert!(validate_folder("../etc").is_err());
        assert!(validate_folder("a/b").is_err());
        assert!(validate_folder(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_extension_and_content_type_must_both_be_images() {
        assert_eq!(checked_extension("Photo.JPG", "image/jpeg").unwrap(), "jpg");
        assert_eq!(checked_extension("a.webp", "image/webp").unwrap(), "webp");
        assert!(matches!(
            checked_extension("a.gif", "image/gif"),
            Err(MediaError::UnsupportedType(_))
        ));
        assert!(matches!(
            checked_extension("a.png", "text/plain"),
            Err(MediaError::UnsupportedType(_))
        ));
        assert!(checked_extension("noext", "image/png").is_err());
    }

    #[tokio::test]
    async fn test_store_writes_file_with_generated_name() {
        let dir = tempfile::tempdir().unwrap();
        let stored = storage(dir.path(), 1024)
            .store("cars", "car.png", "image/png", b"png-bytes")
            .await
            .unwrap();

        assert!(stored.file_name.ends_with(".png"));
        let (millis, rest) = stored.file_name.split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(rest.len(), 36 + ".png".len());
        assert_eq!(stored.url(), format!("/uploads/cars/{}", stored.file_name));

        let written = std::fs::read(dir.path().join("cars").join(&stored.file_name)).unwrap();
        assert_eq!(written, b"png-bytes");
    }

    #[tokio::test]
    async fn test_store_rejects_oversized_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = storage(dir.path(), 4)
            .store("cars", "car.jpg", "image/jpeg", b"12345")
            .await;

        assert!(matches!(result, Err(MediaError::TooLarge { limit: 4 })));
        assert!(!dir.path().join("cars").exists());
    }

    #[test]
    #[serial]
    fn test_upload_config_from_env() {
        unsafe {
            std::env::remove_var("UPLOAD_DIR");
            std::env::remove_var("UPLOAD_MAX_BYTES");
        }
        let config = UploadConfig::from_env();
        assert_eq!(config.dir, PathBuf::from("uploads"));
        assert_eq!(config.max_bytes, DEFAULT_MAX_BYTES);

        unsafe {
            std::env::set_var("UPLOAD_DIR", "/var/dragonauto/uploads");
            std::env::set_var("UPLOAD_MAX_BYTES", "1024");
        }
        let config = UploadConfig::from_env();
        assert_eq!(config.dir, PathBuf::from("/var/dragonauto/uploads"));
        assert_eq!(config.max_bytes, 1024);

        unsafe {
            std::env::remove_var("UPLOAD_DIR");
            std::env::remove_var("UPLOAD_MAX_BYTES");
        }
    }
}
