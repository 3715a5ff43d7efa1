//! Shop directory
//!
//! CRUD over shops. Every mutation announces `ShopsChanged` so customer and
//! bill views can refresh their shop selectors.

use crate::database::{DataStore, Shop};
use crate::error::{AppError, Result};
use crate::events::{AppEvent, EventBus};
use std::sync::Arc;

/// Service for managing shops
#[derive(Clone)]
pub struct ShopDirectory {
    store: Arc<dyn DataStore>,
    events: EventBus,
}

impl ShopDirectory {
    pub fn new(store: Arc<dyn DataStore>, events: EventBus) -> Self {
        Self { store, events }
    }

    /// All shops, ordered by name
    pub async fn list_shops(&self) -> Result<Vec<Shop>> {
        self.store.list_shops().await
    }

    pub async fn create_shop(&self, name: &str) -> Result<Shop> {
        let name = required_name(name)?;
        tracing::info!("Creating shop: {}", name);

        let shop = self.store.insert_shop(name).await?;
        self.events.publish(AppEvent::ShopsChanged);

        tracing::info!("Shop created: {}", shop.id);
        Ok(shop)
    }

    pub async fn rename_shop(&self, id: &str, name: &str) -> Result<Shop> {
        let name = required_name(name)?;
        tracing::info!("Renaming shop {} to {}", id, name);

        let shop = self.store.update_shop(id, name).await?;
        self.events.publish(AppEvent::ShopsChanged);

        Ok(shop)
    }

    /// Delete a shop. The store removes its customers and bills with it.
    pub async fn delete_shop(&self, id: &str) -> Result<()> {
        tracing::info!("Deleting shop: {}", id);

        self.store.delete_shop(id).await?;
        self.events.publish(AppEvent::ShopsChanged);

        tracing::info!("Shop deleted: {}", id);
        Ok(())
    }
}

fn required_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Shop name is required".to_string()));
    }
    Ok(name)
}
