//! Database models
//!
//! Rust structs representing the three persisted tables plus the request
//! values used to create and edit them. The same structs travel over the
//! remote REST API, so serde shapes match the column names exactly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// A tailoring shop, root of the ownership hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Shop {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A customer belonging to one shop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Customer {
    pub id: String,
    pub shop_id: String,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Payment state of a bill's balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum BillStatus {
    /// Older rows spell this `paid_sf`
    #[serde(alias = "paid_sf")]
    Paid,
    Unpaid,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Paid => "paid",
            BillStatus::Unpaid => "unpaid",
        }
    }
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "paid" | "paid_sf" => Ok(BillStatus::Paid),
            "unpaid" => Ok(BillStatus::Unpaid),
            other => Err(format!("Unknown bill status: {} (expected paid or unpaid)", other)),
        }
    }
}

/// A bill raised for a customer of a shop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Bill {
    pub id: String,
    pub shop_id: String,
    pub customer_id: String,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub stitching_amount: f64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub balance_amount: f64,
    pub status: BillStatus,
    /// Public URI of the photo object, if one was attached
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub is_completed: bool,
    pub completion_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn null_as_zero<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

fn null_as_false<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

/// Create customer request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCustomerRequest {
    pub shop_id: String,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
}

/// Full-field customer edit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCustomerRequest {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
}

/// Insert payload for a bill; the photo (if any) is already uploaded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBillRequest {
    pub shop_id: String,
    pub customer_id: String,
    pub stitching_amount: f64,
    pub balance_amount: f64,
    pub status: BillStatus,
    pub image_url: Option<String>,
}

/// The money fields of a bill, edited together
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BillAmounts {
    pub stitching_amount: f64,
    pub balance_amount: f64,
    pub status: BillStatus,
}

/// Partial update of a bill. `None` leaves a column untouched; for the
/// reason, `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BillPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stitching_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<BillStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_reason: Option<Option<String>>,
}

impl BillPatch {
    pub fn amounts(amounts: BillAmounts) -> Self {
        Self {
            stitching_amount: Some(amounts.stitching_amount),
            balance_amount: Some(amounts.balance_amount),
            status: Some(amounts.status),
            ..Default::default()
        }
    }

    pub fn photo(image_url: String) -> Self {
        Self {
            image_url: Some(image_url),
            ..Default::default()
        }
    }

    pub fn completion(completed: bool, reason: Option<String>) -> Self {
        Self {
            is_completed: Some(completed),
            completion_reason: Some(reason),
            ..Default::default()
        }
    }

    pub fn reason(reason: Option<String>) -> Self {
        Self {
            completion_reason: Some(reason),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Row selection for bill listings. Results are always ordered with
/// incomplete bills first, newest first within each group.
#[derive(Debug, Clone, Default)]
pub struct BillQuery {
    pub shop_id: Option<String>,
}

impl BillQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_shop(shop_id: impl Into<String>) -> Self {
        Self {
            shop_id: Some(shop_id.into()),
        }
    }
}

/// A photo chosen by the user, not yet uploaded
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl PhotoUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_accepts_legacy_spelling() {
        let status: BillStatus = serde_json::from_str(r#""paid_sf""#).unwrap();
        assert_eq!(status, BillStatus::Paid);
        assert_eq!(serde_json::to_string(&status).unwrap(), r#""paid""#);
        assert_eq!("PAID_SF".parse::<BillStatus>().unwrap(), BillStatus::Paid);
        assert!("settled".parse::<BillStatus>().is_err());
    }

    #[test]
    fn test_bill_nulls_default() {
        let bill: Bill = serde_json::from_str(
            r#"{
                "id": "b1",
                "shop_id": "s1",
                "customer_id": "c1",
                "stitching_amount": null,
                "balance_amount": 12.5,
                "status": "unpaid",
                "image_url": null,
                "is_completed": null,
                "completion_reason": null,
                "created_at": "2024-05-01T10:00:00Z"
            }"#,
        )
        .unwrap();

        assert_eq!(bill.stitching_amount, 0.0);
        assert_eq!(bill.balance_amount, 12.5);
        assert!(!bill.is_completed);
    }

    #[test]
    fn test_patch_serializes_only_set_fields() {
        let patch = BillPatch::reason(None);
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "completion_reason": null }));

        let patch = BillPatch::completion(true, Some("ordered".into()));
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "is_completed": true, "completion_reason": "ordered" })
        );

        assert!(BillPatch::default().is_empty());
    }
}
