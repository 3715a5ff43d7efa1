//! Bill ledger
//!
//! Owns the bills of the selected shop, the active filter, and the photo
//! lifecycle that goes with bill records. Every successful mutation
//! re-fetches the selected shop's bills from the store (no local patching)
//! and publishes `BillsChanged`.

use super::filters::{apply_filter, BillFilter};
use crate::database::{
    Bill, BillAmounts, BillPatch, BillQuery, CreateBillRequest, Customer, DataStore, PhotoUpload,
    Shop,
};
use crate::error::{AppError, Result};
use crate::events::{AppEvent, EventBus};
use crate::storage::{object_key, ObjectStore};
use chrono::Utc;
use std::fmt;
use std::sync::Arc;

/// Bill ledger state and operations
pub struct BillLedger {
    store: Arc<dyn DataStore>,
    objects: Arc<dyn ObjectStore>,
    events: EventBus,
    shops: Vec<Shop>,
    customers: Vec<Customer>,
    selected_shop: Option<String>,
    bills: Vec<Bill>,
    filter: BillFilter,
}

/// Counts for the "showing N of M" line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterSummary {
    pub filter: BillFilter,
    pub shown: usize,
    pub total: usize,
}

impl fmt::Display for FilterSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.filter == BillFilter::All {
            write!(f, "Showing all {} bills", self.total)
        } else {
            write!(
                f,
                "Showing {} of {} bills ({} filter)",
                self.shown, self.total, self.filter
            )
        }
    }
}

impl BillLedger {
    pub fn new(store: Arc<dyn DataStore>, objects: Arc<dyn ObjectStore>, events: EventBus) -> Self {
        Self {
            store,
            objects,
            events,
            shops: Vec::new(),
            customers: Vec::new(),
            selected_shop: None,
            bills: Vec::new(),
            filter: BillFilter::All,
        }
    }

    /// Bills of a shop: incomplete first, newest first within each group
    pub async fn list_bills(&self, shop_id: &str) -> Result<Vec<Bill>> {
        self.store.list_bills(&BillQuery::for_shop(shop_id)).await
    }

    /// Create a bill, uploading its photo first when one is given.
    ///
    /// A failed upload aborts before anything is written to the ledger.
    pub async fn create_bill(
        &mut self,
        shop_id: &str,
        customer_id: &str,
        amounts: BillAmounts,
        photo: Option<PhotoUpload>,
    ) -> Result<Bill> {
        let shop_id = shop_id.trim();
        let customer_id = customer_id.trim();
        if shop_id.is_empty() || customer_id.is_empty() {
            return Err(AppError::Validation(
                "A shop and a customer must be selected".to_string(),
            ));
        }
        validate_amounts(&amounts)?;

        let customer = self.store.get_customer(customer_id).await?;
        if customer.shop_id != shop_id {
            return Err(AppError::Validation(format!(
                "Customer {} does not belong to shop {}",
                customer_id, shop_id
            )));
        }

        tracing::info!(
            "Creating bill for customer {} (stitching: {}, balance: {}, {})",
            customer_id,
            amounts.stitching_amount,
            amounts.balance_amount,
            amounts.status
        );

        let image_url = match photo {
            Some(photo) => Some(self.upload_photo(&photo).await?),
            None => None,
        };

        let req = CreateBillRequest {
            shop_id: shop_id.to_string(),
            customer_id: customer_id.to_string(),
            stitching_amount: amounts.stitching_amount,
            balance_amount: amounts.balance_amount,
            status: amounts.status,
            image_url,
        };

        let bill = self.store.insert_bill(&req).await?;
        self.after_mutation().await?;

        tracing::info!("Bill created: {}", bill.id);
        Ok(bill)
    }

    pub async fn update_bill_amounts(&mut self, id: &str, amounts: BillAmounts) -> Result<Bill> {
        validate_amounts(&amounts)?;
        tracing::info!("Updating amounts of bill: {}", id);

        let bill = self.store.update_bill(id, &BillPatch::amounts(amounts)).await?;
        self.after_mutation().await?;

        Ok(bill)
    }

    /// Upload a new photo and point the bill at it. The previous object is
    /// left in place for storage reconciliation.
    pub async fn replace_photo(&mut self, id: &str, photo: PhotoUpload) -> Result<Bill> {
        // Fail on a missing bill before uploading anything
        let current = self.store.get_bill(id).await?;
        tracing::info!("Replacing photo of bill: {}", current.id);

        let image_url = self.upload_photo(&photo).await?;
        let bill = self.store.update_bill(id, &BillPatch::photo(image_url)).await?;
        self.after_mutation().await?;

        Ok(bill)
    }

    /// Set the completion flag and replace the reason. The reason is taken
    /// on every toggle, in either direction; a blank reason clears it.
    pub async fn set_completion(
        &mut self,
        id: &str,
        completed: bool,
        reason: Option<&str>,
    ) -> Result<Bill> {
        tracing::info!("Marking bill {} as {}", id, completion_label(completed));

        let patch = BillPatch::completion(completed, normalize_reason(reason));
        let bill = self.store.update_bill(id, &patch).await?;
        self.after_mutation().await?;

        Ok(bill)
    }

    /// Flip the completion flag of a bill
    pub async fn toggle_completion(&mut self, id: &str, reason: Option<&str>) -> Result<Bill> {
        let current = self.store.get_bill(id).await?;
        self.set_completion(id, !current.is_completed, reason).await
    }

    /// Set or clear the reason without touching the completion flag
    pub async fn set_reason(&mut self, id: &str, reason: Option<&str>) -> Result<Bill> {
        tracing::info!("Updating reason of bill: {}", id);

        let bill = self
            .store
            .update_bill(id, &BillPatch::reason(normalize_reason(reason)))
            .await?;
        self.after_mutation().await?;

        Ok(bill)
    }

    /// Delete a bill, then its photo. A failed photo deletion is logged and
    /// does not undo the record deletion.
    pub async fn delete_bill(&mut self, id: &str) -> Result<()> {
        let bill = self.store.get_bill(id).await?;
        tracing::info!("Deleting bill: {}", id);

        self.store.delete_bill(id).await?;

        if let Some(image_url) = &bill.image_url {
            self.delete_photo(image_url).await;
        }

        self.after_mutation().await?;

        tracing::info!("Bill deleted: {}", id);
        Ok(())
    }

    /// Switch to another shop. Resets the filter and replaces the bill set.
    pub async fn select_shop(&mut self, shop_id: &str) -> Result<()> {
        tracing::debug!("Ledger selecting shop: {}", shop_id);
        self.selected_shop = Some(shop_id.to_string());
        self.filter = BillFilter::All;
        self.reload().await
    }

    /// Re-fetch the shop selector, keeping the selection if it still exists
    pub async fn refresh_shops(&mut self) -> Result<()> {
        self.shops = self.store.list_shops().await?;

        let still_there = self
            .selected_shop
            .as_ref()
            .is_some_and(|id| self.shops.iter().any(|s| &s.id == id));

        if !still_there {
            match self.shops.first().map(|s| s.id.clone()) {
                Some(first) => return self.select_shop(&first).await,
                None => {
                    self.selected_shop = None;
                    self.filter = BillFilter::All;
                }
            }
        }

        self.reload().await
    }

    /// React to a change published by another component
    pub async fn handle_event(&mut self, event: AppEvent) -> Result<()> {
        match event {
            AppEvent::ShopsChanged => self.refresh_shops().await,
            // Deleting a customer cascades to bills
            AppEvent::CustomersChanged => self.reload().await,
            AppEvent::BillsChanged => Ok(()),
        }
    }

    /// Change the active filter; purely local
    pub fn set_filter(&mut self, filter: BillFilter) {
        self.filter = filter;
    }

    pub fn filter(&self) -> BillFilter {
        self.filter
    }

    /// Every bill of the selected shop, as last fetched
    pub fn bills(&self) -> &[Bill] {
        &self.bills
    }

    /// Bills of the selected shop that pass the active filter
    pub fn visible_bills(&self) -> Vec<Bill> {
        apply_filter(&self.bills, self.filter)
    }

    pub fn filter_summary(&self) -> FilterSummary {
        FilterSummary {
            filter: self.filter,
            shown: self.bills.iter().filter(|b| self.filter.matches(b)).count(),
            total: self.bills.len(),
        }
    }

    pub fn shops(&self) -> &[Shop] {
        &self.shops
    }

    pub fn customers(&self) -> &[Customer] {
        &self.customers
    }

    pub fn selected_shop(&self) -> Option<&str> {
        self.selected_shop.as_deref()
    }

    async fn upload_photo(&self, photo: &PhotoUpload) -> Result<String> {
        let key = object_key(&photo.file_name, Utc::now());
        tracing::debug!("Uploading photo {} ({} bytes)", key, photo.bytes.len());
        self.objects.upload_object(&key, &photo.bytes).await
    }

    async fn delete_photo(&self, image_url: &str) {
        let Some(key) = self.objects.key_for_uri(image_url) else {
            tracing::warn!("Could not derive object key from photo URI: {}", image_url);
            return;
        };

        match self.objects.delete_objects(std::slice::from_ref(&key)).await {
            Ok(()) => tracing::debug!("Deleted photo object: {}", key),
            Err(e) => tracing::warn!("Failed to delete photo object {}: {}", key, e),
        }
    }

    async fn reload(&mut self) -> Result<()> {
        match self.selected_shop.clone() {
            Some(shop_id) => {
                self.customers = self.store.list_customers(Some(&shop_id)).await?;
                self.bills = self.list_bills(&shop_id).await?;
            }
            None => {
                self.customers.clear();
                self.bills.clear();
            }
        }
        Ok(())
    }

    async fn after_mutation(&mut self) -> Result<()> {
        self.reload().await?;
        self.events.publish(AppEvent::BillsChanged);
        Ok(())
    }
}

fn validate_amounts(amounts: &BillAmounts) -> Result<()> {
    for (field, value) in [
        ("stitching amount", amounts.stitching_amount),
        ("balance amount", amounts.balance_amount),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(AppError::Validation(format!(
                "The {} must be a non-negative number, got {}",
                field, value
            )));
        }
    }
    Ok(())
}

fn normalize_reason(reason: Option<&str>) -> Option<String> {
    reason
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
}

fn completion_label(completed: bool) -> &'static str {
    if completed {
        "complete"
    } else {
        "incomplete"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::BillStatus;
    use crate::error::ErrorKind;
    use crate::services::test_support::{memory_store, MemoryObjectStore};
    use crate::services::{CustomerDirectory, ShopDirectory};
    use std::time::Duration;

    struct Fixture {
        ledger: BillLedger,
        objects: Arc<MemoryObjectStore>,
        store: Arc<dyn DataStore>,
        events: EventBus,
        shop: Shop,
        customer: Customer,
    }

    async fn create_fixture() -> Fixture {
        let store = memory_store().await;
        let objects = Arc::new(MemoryObjectStore::new());
        let events = EventBus::new();

        let shop = ShopDirectory::new(store.clone(), events.clone())
            .create_shop("A")
            .await
            .unwrap();
        let customer = CustomerDirectory::new(store.clone(), events.clone())
            .create_customer(&shop.id, "Farah", None, None)
            .await
            .unwrap();

        let mut ledger = BillLedger::new(store.clone(), objects.clone(), events.clone());
        ledger.select_shop(&shop.id).await.unwrap();

        Fixture {
            ledger,
            objects,
            store,
            events,
            shop,
            customer,
        }
    }

    fn amounts(stitching: f64, balance: f64, status: BillStatus) -> BillAmounts {
        BillAmounts {
            stitching_amount: stitching,
            balance_amount: balance,
            status,
        }
    }

    #[tokio::test]
    async fn test_create_bill_refreshes_and_notifies() {
        let mut fx = create_fixture().await;
        let mut rx = fx.events.subscribe();

        let bill = fx
            .ledger
            .create_bill(
                &fx.shop.id,
                &fx.customer.id,
                amounts(40.0, 100.0, BillStatus::Paid),
                None,
            )
            .await
            .unwrap();

        assert!(!bill.is_completed);
        assert_eq!(bill.completion_reason, None);
        assert_eq!(fx.ledger.bills().len(), 1);
        assert_eq!(rx.recv().await.unwrap(), AppEvent::BillsChanged);
    }

    #[tokio::test]
    async fn test_create_bill_validation() {
        let mut fx = create_fixture().await;
        let valid = amounts(1.0, 1.0, BillStatus::Unpaid);

        let err = fx
            .ledger
            .create_bill("", &fx.customer.id, valid, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = fx
            .ledger
            .create_bill(&fx.shop.id, " ", valid, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = fx
            .ledger
            .create_bill(
                &fx.shop.id,
                &fx.customer.id,
                amounts(-5.0, 1.0, BillStatus::Unpaid),
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert!(fx.ledger.bills().is_empty());
    }

    #[tokio::test]
    async fn test_customer_must_belong_to_shop() {
        let mut fx = create_fixture().await;
        let other = ShopDirectory::new(fx.store.clone(), fx.events.clone())
            .create_shop("B")
            .await
            .unwrap();

        let err = fx
            .ledger
            .create_bill(
                &other.id,
                &fx.customer.id,
                amounts(1.0, 1.0, BillStatus::Unpaid),
                None,
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(fx.store.list_bills(&BillQuery::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_with_photo_uploads_first() {
        let mut fx = create_fixture().await;

        let bill = fx
            .ledger
            .create_bill(
                &fx.shop.id,
                &fx.customer.id,
                amounts(10.0, 0.0, BillStatus::Paid),
                Some(PhotoUpload::new("measure.jpg", b"jpeg".to_vec())),
            )
            .await
            .unwrap();

        let keys = fx.objects.keys();
        assert_eq!(keys.len(), 1);
        assert!(keys[0].ends_with("_measure.jpg"));
        assert_eq!(
            bill.image_url.as_deref(),
            Some(fx.objects.uri_for(&keys[0]).as_str())
        );
    }

    #[tokio::test]
    async fn test_failed_upload_creates_no_bill() {
        let mut fx = create_fixture().await;
        fx.objects.fail_uploads(true);

        let result = fx
            .ledger
            .create_bill(
                &fx.shop.id,
                &fx.customer.id,
                amounts(10.0, 0.0, BillStatus::Paid),
                Some(PhotoUpload::new("measure.jpg", b"jpeg".to_vec())),
            )
            .await;

        assert!(result.is_err());
        assert!(fx.store.list_bills(&BillQuery::all()).await.unwrap().is_empty());
        assert!(fx.objects.keys().is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_record_and_photo() {
        let mut fx = create_fixture().await;
        let bill = fx
            .ledger
            .create_bill(
                &fx.shop.id,
                &fx.customer.id,
                amounts(10.0, 0.0, BillStatus::Paid),
                Some(PhotoUpload::new("WhatsApp Image 2024.jpeg", b"x".to_vec())),
            )
            .await
            .unwrap();
        assert!(bill.image_url.as_deref().is_some_and(|u| u.contains("%20")));

        fx.ledger.delete_bill(&bill.id).await.unwrap();

        assert!(fx.ledger.bills().is_empty());
        assert!(fx.objects.keys().is_empty());
    }

    #[tokio::test]
    async fn test_delete_survives_photo_deletion_failure() {
        let mut fx = create_fixture().await;
        let bill = fx
            .ledger
            .create_bill(
                &fx.shop.id,
                &fx.customer.id,
                amounts(10.0, 0.0, BillStatus::Paid),
                Some(PhotoUpload::new("a.jpg", b"x".to_vec())),
            )
            .await
            .unwrap();
        fx.objects.fail_deletes(true);

        fx.ledger.delete_bill(&bill.id).await.unwrap();

        let err = fx.store.get_bill(&bill.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(fx.objects.keys().len(), 1);
    }

    #[tokio::test]
    async fn test_replace_photo_keeps_old_object() {
        let mut fx = create_fixture().await;
        let bill = fx
            .ledger
            .create_bill(
                &fx.shop.id,
                &fx.customer.id,
                amounts(10.0, 0.0, BillStatus::Paid),
                Some(PhotoUpload::new("old.jpg", b"old".to_vec())),
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(2)).await;
        let updated = fx
            .ledger
            .replace_photo(&bill.id, PhotoUpload::new("new.jpg", b"new".to_vec()))
            .await
            .unwrap();

        assert_ne!(updated.image_url, bill.image_url);
        assert!(updated.image_url.unwrap().ends_with("_new.jpg"));
        assert_eq!(fx.objects.keys().len(), 2);
    }

    #[tokio::test]
    async fn test_replace_photo_on_missing_bill_uploads_nothing() {
        let mut fx = create_fixture().await;

        let err = fx
            .ledger
            .replace_photo("missing", PhotoUpload::new("x.jpg", b"x".to_vec()))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(fx.objects.keys().is_empty());
    }

    #[tokio::test]
    async fn test_completion_reason_is_symmetric() {
        let mut fx = create_fixture().await;
        let bill = fx
            .ledger
            .create_bill(
                &fx.shop.id,
                &fx.customer.id,
                amounts(10.0, 0.0, BillStatus::Unpaid),
                None,
            )
            .await
            .unwrap();

        let done = fx
            .ledger
            .toggle_completion(&bill.id, Some("Delivered, complete"))
            .await
            .unwrap();
        assert!(done.is_completed);
        assert_eq!(done.completion_reason.as_deref(), Some("Delivered, complete"));

        let reopened = fx
            .ledger
            .toggle_completion(&bill.id, Some("Working on alteration"))
            .await
            .unwrap();
        assert!(!reopened.is_completed);
        assert_eq!(
            reopened.completion_reason.as_deref(),
            Some("Working on alteration")
        );

        let cleared = fx.ledger.set_completion(&bill.id, true, Some("  ")).await.unwrap();
        assert!(cleared.is_completed);
        assert_eq!(cleared.completion_reason, None);
    }

    #[tokio::test]
    async fn test_set_reason_leaves_flag() {
        let mut fx = create_fixture().await;
        let bill = fx
            .ledger
            .create_bill(
                &fx.shop.id,
                &fx.customer.id,
                amounts(10.0, 0.0, BillStatus::Unpaid),
                None,
            )
            .await
            .unwrap();

        let updated = fx.ledger.set_reason(&bill.id, Some("Ordered lining")).await.unwrap();

        assert!(!updated.is_completed);
        assert_eq!(updated.completion_reason.as_deref(), Some("Ordered lining"));
    }

    #[tokio::test]
    async fn test_update_amounts() {
        let mut fx = create_fixture().await;
        let bill = fx
            .ledger
            .create_bill(
                &fx.shop.id,
                &fx.customer.id,
                amounts(10.0, 5.0, BillStatus::Unpaid),
                None,
            )
            .await
            .unwrap();

        let updated = fx
            .ledger
            .update_bill_amounts(&bill.id, amounts(12.5, 0.0, BillStatus::Paid))
            .await
            .unwrap();

        assert_eq!(updated.stitching_amount, 12.5);
        assert_eq!(updated.balance_amount, 0.0);
        assert_eq!(updated.status, BillStatus::Paid);
        assert_eq!(fx.ledger.bills()[0], updated);
    }

    #[tokio::test]
    async fn test_filter_view_and_summary() {
        let mut fx = create_fixture().await;
        for reason in ["ordered cloth", "working", "complete"] {
            let bill = fx
                .ledger
                .create_bill(
                    &fx.shop.id,
                    &fx.customer.id,
                    amounts(1.0, 1.0, BillStatus::Unpaid),
                    None,
                )
                .await
                .unwrap();
            fx.ledger.set_reason(&bill.id, Some(reason)).await.unwrap();
        }

        fx.ledger.set_filter("ordered".parse().unwrap());
        assert_eq!(fx.ledger.visible_bills().len(), 1);
        assert_eq!(
            fx.ledger.filter_summary().to_string(),
            "Showing 1 of 3 bills (ordered filter)"
        );

        fx.ledger.set_filter(BillFilter::All);
        assert_eq!(fx.ledger.filter_summary().to_string(), "Showing all 3 bills");
    }

    #[tokio::test]
    async fn test_shop_selection_resets_filter() {
        let mut fx = create_fixture().await;
        fx.ledger.set_filter(BillFilter::Completed);

        fx.ledger.select_shop(&fx.shop.id).await.unwrap();

        assert_eq!(fx.ledger.filter(), BillFilter::All);
    }

    #[tokio::test]
    async fn test_reacts_to_shop_deletion() {
        let mut fx = create_fixture().await;
        fx.ledger
            .create_bill(
                &fx.shop.id,
                &fx.customer.id,
                amounts(1.0, 1.0, BillStatus::Unpaid),
                None,
            )
            .await
            .unwrap();
        let mut rx = fx.events.subscribe();

        ShopDirectory::new(fx.store.clone(), fx.events.clone())
            .delete_shop(&fx.shop.id)
            .await
            .unwrap();
        fx.ledger.handle_event(rx.recv().await.unwrap()).await.unwrap();

        assert!(fx.ledger.shops().is_empty());
        assert_eq!(fx.ledger.selected_shop(), None);
        assert!(fx.ledger.bills().is_empty());
    }
}
