//! Application state and initialization
//!
//! Builds the configured backend once and hands out the services that sit
//! on top of it. All services share one store, one object store and one
//! event bus.

use crate::config::{AppConfig, BackendKind};
use crate::database::{create_pool, DataStore, Repository};
use crate::error::Result;
use crate::events::EventBus;
use crate::remote::{AuthClient, RemoteContext, RemoteStorage, RestClient, Session};
use crate::services::{
    AnalyticsService, BillLedger, CustomerDirectory, ExportService, ShopDirectory,
    StorageReconciler,
};
use crate::storage::{BlobStore, ObjectStore};
use std::sync::Arc;

/// Central application state holding the backend seams
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn DataStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub events: EventBus,
    /// Present only for the remote backend
    pub auth: Option<Arc<AuthClient>>,
}

impl AppState {
    /// Application setup - called once on startup
    pub async fn initialize(config: AppConfig) -> Result<Self> {
        tracing::info!("Initializing application");
        tracing::info!("App data directory: {:?}", config.data_dir);

        tokio::fs::create_dir_all(&config.data_dir).await?;

        let state = match config.backend {
            BackendKind::Local => {
                let pool = create_pool(&config.database_path()).await?;
                let blobs = BlobStore::new(config.objects_dir(), config.remote.bucket.clone());
                blobs.initialize().await?;

                Self {
                    store: Arc::new(Repository::new(pool)),
                    objects: Arc::new(blobs),
                    events: EventBus::new(),
                    auth: None,
                    config,
                }
            }
            BackendKind::Remote => {
                tracing::info!("Using remote backend at {}", config.remote.url);
                let auth = Arc::new(AuthClient::new(&config.remote, config.session_path()));
                auth.load().await?;

                let ctx = RemoteContext::new(&config.remote, auth.subscribe());

                Self {
                    store: Arc::new(RestClient::new(
                        ctx.clone(),
                        config.remote.paid_status.clone(),
                    )),
                    objects: Arc::new(RemoteStorage::new(ctx, config.remote.bucket.clone())),
                    events: EventBus::new(),
                    auth: Some(auth),
                    config,
                }
            }
        };

        tracing::info!("Application initialized successfully");
        Ok(state)
    }

    /// Data access is only allowed with a session on the remote backend
    pub fn require_session(&self) -> Result<Option<Session>> {
        match &self.auth {
            Some(auth) => auth.require_session().map(Some),
            None => Ok(None),
        }
    }

    pub fn shops(&self) -> ShopDirectory {
        ShopDirectory::new(self.store.clone(), self.events.clone())
    }

    pub fn customers(&self) -> CustomerDirectory {
        CustomerDirectory::new(self.store.clone(), self.events.clone())
    }

    pub fn ledger(&self) -> BillLedger {
        BillLedger::new(self.store.clone(), self.objects.clone(), self.events.clone())
    }

    pub fn analytics(&self) -> AnalyticsService {
        AnalyticsService::new(self.store.clone())
    }

    pub fn reconciler(&self) -> StorageReconciler {
        StorageReconciler::new(self.store.clone(), self.objects.clone())
    }

    pub fn exporter(&self) -> ExportService {
        ExportService::new(self.store.clone())
    }
}
