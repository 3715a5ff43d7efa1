//! Services module
//!
//! Business logic that coordinates between the CLI and the data-access seams.

pub mod analytics;
pub mod bills;
pub mod customers;
pub mod export;
pub mod filters;
pub mod reconcile;
pub mod shops;

pub use analytics::{AnalyticsService, AnalyticsSummary, ShopReport, Totals};
pub use bills::{BillLedger, FilterSummary};
pub use customers::CustomerDirectory;
pub use export::{ExportDocument, ExportService};
pub use filters::{apply_filter, BillFilter};
pub use reconcile::{ReconcilePlan, StorageReconciler};
pub use shops::ShopDirectory;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::database::{schema::initialize_database, DataStore, Repository};
    use crate::error::{AppError, Result};
    use crate::storage::{key_from_uri, ObjectStore};
    use async_trait::async_trait;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    /// Fresh in-memory SQLite store with the schema applied
    pub async fn memory_store() -> Arc<dyn DataStore> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        initialize_database(&pool).await.unwrap();

        Arc::new(Repository::new(pool))
    }

    /// Object store double that can be told to fail uploads or deletes
    #[derive(Default)]
    pub struct MemoryObjectStore {
        objects: Mutex<BTreeMap<String, Vec<u8>>>,
        fail_uploads: AtomicBool,
        fail_deletes: AtomicBool,
    }

    impl MemoryObjectStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_keys(keys: &[&str]) -> Self {
            let store = Self::new();
            {
                let mut objects = store.objects.lock().unwrap();
                for key in keys {
                    objects.insert(key.to_string(), Vec::new());
                }
            }
            store
        }

        pub fn fail_uploads(&self, fail: bool) {
            self.fail_uploads.store(fail, Ordering::SeqCst);
        }

        pub fn fail_deletes(&self, fail: bool) {
            self.fail_deletes.store(fail, Ordering::SeqCst);
        }

        pub fn keys(&self) -> Vec<String> {
            self.objects.lock().unwrap().keys().cloned().collect()
        }

        pub fn uri_for(&self, key: &str) -> String {
            format!("memory://bills/{}", urlencoding::encode(key))
        }
    }

    #[async_trait]
    impl ObjectStore for MemoryObjectStore {
        async fn upload_object(&self, key: &str, bytes: &[u8]) -> Result<String> {
            if self.fail_uploads.load(Ordering::SeqCst) {
                return Err(AppError::Storage("upload rejected".to_string()));
            }
            let mut objects = self.objects.lock().unwrap();
            if objects.contains_key(key) {
                return Err(AppError::Storage(format!("Object already exists: {}", key)));
            }
            objects.insert(key.to_string(), bytes.to_vec());
            Ok(self.uri_for(key))
        }

        async fn list_objects(&self) -> Result<Vec<String>> {
            Ok(self.keys())
        }

        async fn delete_objects(&self, keys: &[String]) -> Result<()> {
            if self.fail_deletes.load(Ordering::SeqCst) {
                return Err(AppError::Storage("delete rejected".to_string()));
            }
            let mut objects = self.objects.lock().unwrap();
            for key in keys {
                objects.remove(key);
            }
            Ok(())
        }

        fn key_for_uri(&self, uri: &str) -> Option<String> {
            key_from_uri(uri, "bills")
        }
    }
}
