//! Customer directory
//!
//! CRUD over customers scoped to a shop, plus the directory view state: the
//! shop selector, the selected shop and its customers. Nothing is cached
//! between selections; every selection change re-fetches.

use crate::database::{CreateCustomerRequest, Customer, DataStore, Shop, UpdateCustomerRequest};
use crate::error::{AppError, Result};
use crate::events::{AppEvent, EventBus};
use std::sync::Arc;

/// Service and view state for customers
pub struct CustomerDirectory {
    store: Arc<dyn DataStore>,
    events: EventBus,
    shops: Vec<Shop>,
    selected_shop: Option<String>,
    customers: Vec<Customer>,
}

impl CustomerDirectory {
    pub fn new(store: Arc<dyn DataStore>, events: EventBus) -> Self {
        Self {
            store,
            events,
            shops: Vec::new(),
            selected_shop: None,
            customers: Vec::new(),
        }
    }

    pub async fn list_customers_for_shop(&self, shop_id: &str) -> Result<Vec<Customer>> {
        self.store.list_customers(Some(shop_id)).await
    }

    pub async fn create_customer(
        &mut self,
        shop_id: &str,
        name: &str,
        address: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Customer> {
        if shop_id.trim().is_empty() {
            return Err(AppError::Validation("A shop must be selected".to_string()));
        }
        let name = required_name(name)?;

        tracing::info!("Creating customer {} for shop {}", name, shop_id);

        let req = CreateCustomerRequest {
            shop_id: shop_id.trim().to_string(),
            name: name.to_string(),
            address: optional_field(address),
            phone: optional_field(phone),
        };

        let customer = self.store.insert_customer(&req).await?;
        self.after_mutation().await?;

        tracing::info!("Customer created: {}", customer.id);
        Ok(customer)
    }

    /// Full-field edit: every field is replaced, blank optionals are cleared
    pub async fn update_customer(
        &mut self,
        id: &str,
        name: &str,
        address: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Customer> {
        let name = required_name(name)?;
        tracing::info!("Updating customer: {}", id);

        let req = UpdateCustomerRequest {
            name: name.to_string(),
            address: optional_field(address),
            phone: optional_field(phone),
        };

        let customer = self.store.update_customer(id, &req).await?;
        self.after_mutation().await?;

        Ok(customer)
    }

    /// Delete a customer. The store removes their bills with them.
    pub async fn delete_customer(&mut self, id: &str) -> Result<()> {
        tracing::info!("Deleting customer: {}", id);

        self.store.delete_customer(id).await?;
        self.after_mutation().await?;

        tracing::info!("Customer deleted: {}", id);
        Ok(())
    }

    /// Re-fetch the shop selector. Keeps the current selection when the shop
    /// still exists, otherwise falls back to the first shop.
    pub async fn refresh_shops(&mut self) -> Result<()> {
        self.shops = self.store.list_shops().await?;

        let still_there = self
            .selected_shop
            .as_ref()
            .is_some_and(|id| self.shops.iter().any(|s| &s.id == id));

        if !still_there {
            self.selected_shop = self.shops.first().map(|s| s.id.clone());
        }

        self.reload().await
    }

    pub async fn select_shop(&mut self, shop_id: &str) -> Result<()> {
        self.selected_shop = Some(shop_id.to_string());
        self.reload().await
    }

    /// React to a change published by another component
    pub async fn handle_event(&mut self, event: AppEvent) -> Result<()> {
        match event {
            AppEvent::ShopsChanged => self.refresh_shops().await,
            AppEvent::CustomersChanged | AppEvent::BillsChanged => Ok(()),
        }
    }

    pub fn shops(&self) -> &[Shop] {
        &self.shops
    }

    pub fn selected_shop(&self) -> Option<&str> {
        self.selected_shop.as_deref()
    }

    pub fn customers(&self) -> &[Customer] {
        &self.customers
    }

    async fn reload(&mut self) -> Result<()> {
        self.customers = match &self.selected_shop {
            Some(shop_id) => self.store.list_customers(Some(shop_id)).await?,
            None => Vec::new(),
        };
        Ok(())
    }

    async fn after_mutation(&mut self) -> Result<()> {
        self.reload().await?;
        self.events.publish(AppEvent::CustomersChanged);
        Ok(())
    }
}

fn required_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Customer name is required".to_string()));
    }
    Ok(name)
}

fn optional_field(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
