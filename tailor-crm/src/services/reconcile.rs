//! Storage reconciliation
//!
//! Finds photo objects no bill points at any more and removes them.

use crate::config::STORAGE_PLACEHOLDER_OBJECT;
use crate::database::DataStore;
use crate::error::Result;
use crate::storage::ObjectStore;
use std::collections::BTreeSet;
use std::sync::Arc;

/// What a reconciliation run would delete
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub stored: usize,
    pub referenced: usize,
    /// Orphaned keys, sorted
    pub orphans: Vec<String>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.orphans.is_empty()
    }
}

/// Stored keys minus referenced keys, skipping the bucket placeholder
pub fn unreferenced_objects(stored: &[String], referenced: &BTreeSet<String>) -> Vec<String> {
    let orphans: BTreeSet<&String> = stored
        .iter()
        .filter(|key| key.as_str() != STORAGE_PLACEHOLDER_OBJECT)
        .filter(|key| !referenced.contains(*key))
        .collect();
    orphans.into_iter().cloned().collect()
}

pub struct StorageReconciler {
    store: Arc<dyn DataStore>,
    objects: Arc<dyn ObjectStore>,
}

impl StorageReconciler {
    pub fn new(store: Arc<dyn DataStore>, objects: Arc<dyn ObjectStore>) -> Self {
        Self { store, objects }
    }

    /// Compare the bucket against bill photo references. Deletes nothing.
    pub async fn plan(&self) -> Result<ReconcilePlan> {
        let (stored, refs) =
            tokio::try_join!(self.objects.list_objects(), self.store.list_photo_refs())?;

        let referenced: BTreeSet<String> = refs
            .iter()
            .filter_map(|uri| self.objects.key_for_uri(uri))
            .collect();

        let orphans = unreferenced_objects(&stored, &referenced);
        tracing::info!(
            "Reconciliation: {} stored, {} referenced, {} orphaned",
            stored.len(),
            referenced.len(),
            orphans.len()
        );

        Ok(ReconcilePlan {
            stored: stored.len(),
            referenced: referenced.len(),
            orphans,
        })
    }

    /// Delete the planned orphans. Returns how many were removed; a failed
    /// deletion is logged and counts as zero.
    pub async fn execute(&self, plan: &ReconcilePlan) -> usize {
        if plan.is_empty() {
            tracing::info!("No orphaned objects to delete");
            return 0;
        }

        match self.objects.delete_objects(&plan.orphans).await {
            Ok(()) => {
                tracing::info!("Deleted {} orphaned objects", plan.orphans.len());
                plan.orphans.len()
            }
            Err(e) => {
                tracing::warn!("Failed to delete orphaned objects: {}", e);
                0
            }
        }
    }
}
