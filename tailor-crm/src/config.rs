//! Application configuration
//!
//! Central location for configuration constants and validation boundaries,
//! plus the persisted [`AppConfig`] that selects and parameterises a backend.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

// ===== Object Storage =====

/// Bucket holding bill photos
pub const PHOTO_BUCKET: &str = "bills";

/// Marker object some stores create in empty folders; never a bill photo
pub const STORAGE_PLACEHOLDER_OBJECT: &str = ".emptyFolderPlaceholder";

/// Maximum length of the user-supplied part of an object key
pub const MAX_PHOTO_FILENAME_LENGTH: usize = 255;

// ===== Bills =====

/// How the hosted `bills` table spells a paid bill; shared with the web
/// front end working on the same project
pub const REMOTE_PAID_STATUS: &str = "paid_sf";

// ===== Bill Filters =====

/// Reason keywords that have a dedicated filter
pub const REASON_KEYWORDS: &[&str] = &["complete", "ordered", "working"];

// ===== Analytics =====

/// The deduction figure is always half of the stitching total
pub const DEDUCTION_DIVISOR: f64 = 2.0;

// ===== Export =====

pub const SHOP_COLUMNS: &[&str] = &["id", "name", "created_at"];

pub const CUSTOMER_COLUMNS: &[&str] = &["id", "shop_id", "name", "address", "phone", "created_at"];

pub const BILL_COLUMNS: &[&str] = &[
    "id",
    "shop_id",
    "customer_id",
    "stitching_amount",
    "balance_amount",
    "status",
    "image_url",
    "is_completed",
    "completion_reason",
    "created_at",
];

// ===== Files =====

pub const CONFIG_FILE_NAME: &str = "config.json";
pub const DATABASE_FILE_NAME: &str = "db.sqlite";
pub const SESSION_FILE_NAME: &str = "session.json";
pub const OBJECTS_DIR_NAME: &str = "objects";
pub const EXPORTS_DIR_NAME: &str = "exports";

/// Which backend the application talks to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// SQLite database and filesystem object store in the data directory
    #[default]
    Local,
    /// Hosted REST backend (tables, storage, auth)
    Remote,
}

/// Hosted backend coordinates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSettings {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub anon_key: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Spelling of the paid status in the hosted `bills.status` column
    #[serde(default = "default_paid_status")]
    pub paid_status: String,
}

fn default_bucket() -> String {
    PHOTO_BUCKET.to_string()
}

fn default_paid_status() -> String {
    REMOTE_PAID_STATUS.to_string()
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            bucket: default_bucket(),
            paid_status: default_paid_status(),
        }
    }
}

/// Persisted application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Not persisted: the directory the config was loaded from
    #[serde(skip)]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default)]
    pub remote: RemoteSettings,
}

impl AppConfig {
    /// Configuration for a local backend rooted at `data_dir`
    pub fn local(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            backend: BackendKind::Local,
            remote: RemoteSettings::default(),
        }
    }

    /// Load configuration from the data directory and the environment.
    ///
    /// Resolution order: `TAILOR_CRM_DATA_DIR` (or the platform data dir),
    /// then `config.json` inside it, then `SUPABASE_URL` / `SUPABASE_ANON_KEY`
    /// which override the file and switch the backend to remote.
    pub async fn load() -> Result<Self> {
        // A missing .env is normal
        let _ = dotenvy::dotenv();

        let data_dir = std::env::var("TAILOR_CRM_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir());

        let mut config = Self::load_from_dir(&data_dir).await?;

        if let Ok(url) = std::env::var("SUPABASE_URL") {
            config.remote.url = url;
            config.backend = BackendKind::Remote;
        }
        if let Ok(key) = std::env::var("SUPABASE_ANON_KEY") {
            config.remote.anon_key = key;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load `config.json` from a directory, falling back to defaults
    pub async fn load_from_dir(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE_NAME);

        let mut config = if path.exists() {
            let content = fs::read_to_string(&path).await?;
            match serde_json::from_str::<AppConfig>(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to parse {:?}, using defaults: {}", path, e);
                    Self::local(PathBuf::new())
                }
            }
        } else {
            tracing::debug!("No config file at {:?}, using defaults", path);
            Self::local(PathBuf::new())
        };

        config.data_dir = data_dir.to_path_buf();
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.backend == BackendKind::Remote {
            if self.remote.url.trim().is_empty() {
                return Err(AppError::Config("remote backend requires a URL".into()));
            }
            if self.remote.anon_key.trim().is_empty() {
                return Err(AppError::Config("remote backend requires an anon key".into()));
            }
        }
        if self.remote.bucket.trim().is_empty() {
            return Err(AppError::Config("photo bucket name is empty".into()));
        }
        if !matches!(self.remote.paid_status.as_str(), "paid" | "paid_sf") {
            return Err(AppError::Config(format!(
                "paid status must be \"paid\" or \"paid_sf\", got {:?}",
                self.remote.paid_status
            )));
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE_NAME)
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.data_dir.join(OBJECTS_DIR_NAME)
    }

    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join(SESSION_FILE_NAME)
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.data_dir.join(EXPORTS_DIR_NAME)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("tailor-crm"))
        .unwrap_or_else(|| PathBuf::from(".tailor-crm"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_gives_local_defaults() {
        let temp = TempDir::new().unwrap();
        let config = AppConfig::load_from_dir(temp.path()).await.unwrap();

        assert_eq!(config.backend, BackendKind::Local);
        assert_eq!(config.remote.bucket, PHOTO_BUCKET);
        assert_eq!(config.database_path(), temp.path().join(DATABASE_FILE_NAME));
    }

    #[tokio::test]
    async fn test_remote_config_file() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            r#"{"backend":"remote","remote":{"url":"https://example.supabase.co","anon_key":"anon"}}"#,
        )
        .await
        .unwrap();

        let loaded = AppConfig::load_from_dir(temp.path()).await.unwrap();
        assert_eq!(loaded.backend, BackendKind::Remote);
        assert_eq!(loaded.remote.url, "https://example.supabase.co");
        assert_eq!(loaded.remote.paid_status, "paid_sf");
        assert!(loaded.validate().is_ok());
    }

    #[test]
    fn test_paid_status_is_checked() {
        let mut config = AppConfig::local(PathBuf::from("/tmp/x"));
        config.remote.paid_status = "settled".into();
        assert!(config.validate().is_err());

        config.remote.paid_status = "paid".into();
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_partial_file_uses_field_defaults() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CONFIG_FILE_NAME), r#"{"remote":{"url":"x"}}"#)
            .await
            .unwrap();

        let loaded = AppConfig::load_from_dir(temp.path()).await.unwrap();
        assert_eq!(loaded.backend, BackendKind::Local);
        assert_eq!(loaded.remote.bucket, PHOTO_BUCKET);
    }

    #[test]
    fn test_remote_requires_credentials() {
        let mut config = AppConfig::local(PathBuf::from("/tmp/x"));
        config.backend = BackendKind::Remote;
        assert!(config.validate().is_err());
    }
}
