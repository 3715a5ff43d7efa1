//! Storage module
//!
//! Object storage for bill photos: the [`ObjectStore`] trait, a filesystem
//! implementation, and the key/URI conventions shared by every backend.

pub mod blob_store;

pub use blob_store::BlobStore;

use crate::config::MAX_PHOTO_FILENAME_LENGTH;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A single bucket of named objects
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key` and return its public URI.
    /// Never overwrites: an existing key is an error.
    async fn upload_object(&self, key: &str, bytes: &[u8]) -> Result<String>;

    /// Keys of every object in the bucket
    async fn list_objects(&self) -> Result<Vec<String>>;

    /// Delete the given keys; keys that are already gone are not an error
    async fn delete_objects(&self, keys: &[String]) -> Result<()>;

    /// Recover the object key from a public URI produced by this store
    fn key_for_uri(&self, uri: &str) -> Option<String>;
}

/// Build a non-overwriting object key: `<unix millis>_<sanitized name>`
pub fn object_key(file_name: &str, now: DateTime<Utc>) -> String {
    format!("{}_{}", now.timestamp_millis(), sanitize_filename(file_name))
}

/// Strip path separators and null bytes, limit length
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .filter(|c| *c != '/' && *c != '\\' && *c != '\0')
        .take(MAX_PHOTO_FILENAME_LENGTH)
        .collect();

    if cleaned.trim().is_empty() {
        "photo".to_string()
    } else {
        cleaned
    }
}

/// Extract the object key from a public URI.
///
/// URIs look like `<base>/<bucket>/<key>`; keys never contain `/`, so the
/// last bucket segment wins. Without one, the last path segment is taken.
/// The key segment is percent-decoded so it compares equal to listed names.
pub fn key_from_uri(uri: &str, bucket: &str) -> Option<String> {
    let marker = format!("/{}/", bucket);
    let key = match uri.rfind(&marker) {
        Some(pos) => &uri[pos + marker.len()..],
        None => uri.rsplit('/').next().unwrap_or_default(),
    };

    if key.is_empty() {
        return None;
    }

    match urlencoding::decode(key) {
        Ok(decoded) => Some(decoded.into_owned()),
        Err(_) => Some(key.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_object_key() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(object_key("kurta.jpg", now), "1700000000123_kurta.jpg");
        assert_eq!(object_key("../../etc/passwd", now), "1700000000123_....etcpasswd");
        assert_eq!(object_key("", now), "1700000000123_photo");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("normal.png"), "normal.png");
        assert_eq!(sanitize_filename("file\\name.png"), "filename.png");
        assert_eq!(sanitize_filename(&"a".repeat(300)).len(), MAX_PHOTO_FILENAME_LENGTH);
    }

    #[test]
    fn test_key_from_uri() {
        assert_eq!(
            key_from_uri(
                "https://x.supabase.co/storage/v1/object/public/bills/171_a.jpg",
                "bills"
            ),
            Some("171_a.jpg".to_string())
        );
        assert_eq!(
            key_from_uri("https://cdn.example.com/img/171_b.jpg", "bills"),
            Some("171_b.jpg".to_string())
        );
        assert_eq!(key_from_uri("https://cdn.example.com/", "bills"), None);
    }

    #[test]
    fn test_key_from_uri_decodes_key() {
        assert_eq!(
            key_from_uri(
                "https://x.supabase.co/storage/v1/object/public/bills/1700000000123_WhatsApp%20Image%202024.jpeg",
                "bills"
            ),
            Some("1700000000123_WhatsApp Image 2024.jpeg".to_string())
        );
        // Not valid UTF-8 once decoded; kept as written
        assert_eq!(
            key_from_uri("https://cdn.example.com/bills/171_%FF.jpg", "bills"),
            Some("171_%FF.jpg".to_string())
        );
    }
}
