//! Filesystem object store
//!
//! Stores bill photos as plain files in one directory per bucket:
//! `<root>/<bucket>/<key>`. Public URIs are `file://` URLs of those paths.
//! Names starting with `.` (in-flight uploads, the bucket placeholder) are
//! never object keys.

use super::{key_from_uri, ObjectStore};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local object store for one bucket
#[derive(Clone)]
pub struct BlobStore {
    root: PathBuf,
    bucket: String,
}

impl BlobStore {
    /// Create a new store for `bucket` under the given root directory
    pub fn new(root: PathBuf, bucket: impl Into<String>) -> Self {
        Self {
            root,
            bucket: bucket.into(),
        }
    }

    /// Initialize the store (create the bucket directory if needed)
    pub async fn initialize(&self) -> Result<()> {
        fs::create_dir_all(self.bucket_dir()).await?;
        tracing::info!("Object store initialized at: {:?}", self.bucket_dir());
        Ok(())
    }

    /// Read an object back
    pub async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.get_path(key)?;

        if !path.exists() {
            return Err(AppError::Storage(format!("Object not found: {}", key)));
        }

        Ok(fs::read(&path).await?)
    }

    pub fn bucket_dir(&self) -> PathBuf {
        self.root.join(&self.bucket)
    }

    fn get_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.starts_with('.') || key.contains('/') || key.contains('\\') {
            return Err(AppError::Storage(format!("Invalid object key: {:?}", key)));
        }
        Ok(self.bucket_dir().join(key))
    }

    fn public_uri(&self, key: &str) -> String {
        format!(
            "file://{}/{}",
            self.bucket_dir().display(),
            urlencoding::encode(key)
        )
    }
}

#[async_trait]
impl ObjectStore for BlobStore {
    async fn upload_object(&self, key: &str, bytes: &[u8]) -> Result<String> {
        let path = self.get_path(key)?;

        if path.exists() {
            return Err(AppError::Storage(format!("Object already exists: {}", key)));
        }

        fs::create_dir_all(self.bucket_dir()).await?;

        // Write to a hidden temp file first, then rename into place
        let temp_path = self.bucket_dir().join(format!(".{}.tmp", key));
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, &path).await?;

        tracing::debug!("Wrote object: {} ({} bytes)", key, bytes.len());

        Ok(self.public_uri(key))
    }

    async fn list_objects(&self) -> Result<Vec<String>> {
        let dir = self.bucket_dir();
        let mut keys = Vec::new();

        if !dir.exists() {
            return Ok(keys);
        }

        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if !name.starts_with('.') {
                    keys.push(name.to_string());
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn delete_objects(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            let path = self.get_path(key)?;

            if !path.exists() {
                continue;
            }

            fs::remove_file(&path).await?;
            tracing::debug!("Deleted object: {}", key);
        }

        Ok(())
    }

    fn key_for_uri(&self, uri: &str) -> Option<String> {
        key_from_uri(uri, &self.bucket)
    }
}
