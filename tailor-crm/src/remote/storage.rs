//! Photo bucket on the hosted storage API

use super::{check_response, RemoteContext};
use crate::error::{AppError, Result};
use crate::storage::{key_from_uri, ObjectStore};
use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::Deserialize;
use serde_json::json;

/// Page size for bucket listings
const LIST_PAGE_SIZE: usize = 1000;

#[derive(Deserialize)]
struct ListedObject {
    name: String,
}

/// [`ObjectStore`] backed by one hosted storage bucket
#[derive(Clone)]
pub struct RemoteStorage {
    ctx: RemoteContext,
    bucket: String,
}

impl RemoteStorage {
    pub fn new(ctx: RemoteContext, bucket: impl Into<String>) -> Self {
        Self {
            ctx,
            bucket: bucket.into(),
        }
    }

    /// `/storage/v1/object/<bucket>/<key>` with the key percent-encoded
    fn object_url(&self, key: &str) -> Result<Url> {
        let mut url = Url::parse(self.ctx.base_url())
            .map_err(|e| AppError::Config(format!("Invalid remote URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| AppError::Config("Remote URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["storage", "v1", "object", self.bucket.as_str(), key]);
        Ok(url)
    }

    pub fn public_url(&self, key: &str) -> String {
        public_url(self.ctx.base_url(), &self.bucket, key)
    }
}

/// Public URL of an object; the key is percent-encoded the same way
/// uploads address it
pub fn public_url(base_url: &str, bucket: &str, key: &str) -> String {
    format!(
        "{}/storage/v1/object/public/{}/{}",
        base_url,
        bucket,
        urlencoding::encode(key)
    )
}

/// Content type from the file extension of an object key
pub fn content_type_for(key: &str) -> &'static str {
    let extension = key.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("heic") => "image/heic",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl ObjectStore for RemoteStorage {
    async fn upload_object(&self, key: &str, bytes: &[u8]) -> Result<String> {
        let url = self.object_url(key)?;
        tracing::debug!("Uploading {} bytes to {}", bytes.len(), url);

        let response = self
            .ctx
            .request(Method::POST, url.as_str())
            .header("x-upsert", "false")
            .header("Content-Type", content_type_for(key))
            .body(bytes.to_vec())
            .send()
            .await?;
        check_response(response).await?;

        Ok(self.public_url(key))
    }

    async fn list_objects(&self) -> Result<Vec<String>> {
        let url = self
            .ctx
            .endpoint(&format!("/storage/v1/object/list/{}", self.bucket));
        let mut keys = Vec::new();
        let mut offset = 0;

        loop {
            let body = json!({
                "prefix": "",
                "limit": LIST_PAGE_SIZE,
                "offset": offset,
                "sortBy": { "column": "name", "order": "asc" },
            });
            let response = self
                .ctx
                .request(Method::POST, &url)
                .json(&body)
                .send()
                .await?;
            let page: Vec<ListedObject> = check_response(response).await?.json().await?;

            let count = page.len();
            keys.extend(page.into_iter().map(|o| o.name));
            if count < LIST_PAGE_SIZE {
                break;
            }
            offset += count;
        }

        tracing::debug!("Listed {} objects in bucket {}", keys.len(), self.bucket);
        Ok(keys)
    }

    async fn delete_objects(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let url = self
            .ctx
            .endpoint(&format!("/storage/v1/object/{}", self.bucket));
        let response = self
            .ctx
            .request(Method::DELETE, &url)
            .json(&json!({ "prefixes": keys }))
            .send()
            .await?;
        check_response(response).await?;

        tracing::debug!("Deleted {} objects from bucket {}", keys.len(), self.bucket);
        Ok(())
    }

    fn key_for_uri(&self, uri: &str) -> Option<String> {
        key_from_uri(uri, &self.bucket)
    }
}
