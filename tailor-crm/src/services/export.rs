//! Export service
//!
//! Dumps all shops, customers and bills into a single JSON backup document.
//! Exports are write-only; there is no import.

use crate::config::{BILL_COLUMNS, CUSTOMER_COLUMNS, SHOP_COLUMNS};
use crate::database::{Bill, BillQuery, Customer, DataStore, Shop};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct ExportData {
    pub shops: Vec<Shop>,
    pub customers: Vec<Customer>,
    pub bills: Vec<Bill>,
}

/// Column lists of the exported tables
#[derive(Debug, Clone, Serialize)]
pub struct ExportSchema {
    pub shops: &'static [&'static str],
    pub customers: &'static [&'static str],
    pub bills: &'static [&'static str],
}

impl Default for ExportSchema {
    fn default() -> Self {
        Self {
            shops: SHOP_COLUMNS,
            customers: CUSTOMER_COLUMNS,
            bills: BILL_COLUMNS,
        }
    }
}

/// Backup document
#[derive(Debug, Clone, Serialize)]
pub struct ExportDocument {
    pub timestamp: String,
    pub version: String,
    pub data: ExportData,
    pub schema: ExportSchema,
}

pub struct ExportService {
    store: Arc<dyn DataStore>,
}

impl ExportService {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    pub async fn export(&self) -> Result<ExportDocument> {
        let query = BillQuery::all();
        let (shops, customers, bills) = tokio::try_join!(
            self.store.list_shops(),
            self.store.list_customers(None),
            self.store.list_bills(&query)
        )?;

        Ok(ExportDocument {
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            data: ExportData {
                shops,
                customers,
                bills,
            },
            schema: ExportSchema::default(),
        })
    }

    /// Write a pretty-printed export into `dir` and return its path
    pub async fn write_export(&self, dir: &Path) -> Result<PathBuf> {
        let document = self.export().await?;

        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(export_file_name(Utc::now()));

        let json = serde_json::to_string_pretty(&document)?;
        tokio::fs::write(&path, json).await?;

        tracing::info!(
            "Exported {} shops, {} customers, {} bills to {:?}",
            document.data.shops.len(),
            document.data.customers.len(),
            document.data.bills.len(),
            path
        );

        Ok(path)
    }
}

pub fn export_file_name(now: DateTime<Utc>) -> String {
    format!("tailor-crm-backup-{}.json", now.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::CreateCustomerRequest;
    use crate::services::test_support::memory_store;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_export_file_name() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 18, 30, 0).unwrap();
        assert_eq!(export_file_name(now), "tailor-crm-backup-2024-03-09.json");
    }

    #[tokio::test]
    async fn test_write_export() {
        let store = memory_store().await;
        let shop = store.insert_shop("Silk Route").await.unwrap();
        store
            .insert_customer(&CreateCustomerRequest {
                shop_id: shop.id.clone(),
                name: "Divya".to_string(),
                address: Some("12 Lake Rd".to_string()),
                phone: None,
            })
            .await
            .unwrap();

        let temp_dir = TempDir::new().unwrap();
        let path = ExportService::new(store)
            .write_export(&temp_dir.path().join("exports"))
            .await
            .unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(json["data"]["shops"][0]["name"], "Silk Route");
        assert_eq!(json["data"]["customers"][0]["address"], "12 Lake Rd");
        assert_eq!(json["data"]["bills"].as_array().unwrap().len(), 0);
        assert_eq!(json["schema"]["customers"][3], "address");
    }
}
