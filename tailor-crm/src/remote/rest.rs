//! Table access over the hosted REST API
//!
//! Each collection lives at `/rest/v1/<table>`. Rows are filtered with
//! `column=eq.value`, ordered with `order=`, and writes ask for the changed
//! rows back with `Prefer: return=representation`. An empty representation
//! from an update or delete means the id matched nothing.

use super::{check_response, RemoteContext};
use crate::database::{
    Bill, BillPatch, BillQuery, CreateBillRequest, CreateCustomerRequest, Customer, DataStore,
    Shop, UpdateCustomerRequest,
};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

const SHOPS: &str = "shops";
const CUSTOMERS: &str = "customers";
const BILLS: &str = "bills";

const BILL_ORDER: &str = "is_completed.asc,created_at.desc";

type Params = Vec<(&'static str, String)>;

/// [`DataStore`] backed by the hosted table API
#[derive(Clone)]
pub struct RestClient {
    ctx: RemoteContext,
    /// How the `bills.status` column spells a paid bill
    paid_status: String,
}

/// A new bill row; fresh bills always start incomplete
#[derive(Serialize)]
struct NewBillRow<'a> {
    #[serde(flatten)]
    req: &'a CreateBillRequest,
    is_completed: bool,
}

#[derive(Deserialize)]
struct PhotoRef {
    image_url: Option<String>,
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

fn by_id(id: &str) -> Params {
    vec![("id", eq(id))]
}

pub fn shop_params() -> Params {
    vec![("select", "*".to_string()), ("order", "name.asc".to_string())]
}

pub fn customer_params(shop_id: Option<&str>) -> Params {
    let mut params = vec![("select", "*".to_string())];
    if let Some(shop_id) = shop_id {
        params.push(("shop_id", eq(shop_id)));
    }
    params.push(("order", "name.asc".to_string()));
    params
}

pub fn bill_params(query: &BillQuery) -> Params {
    let mut params = vec![("select", "*".to_string())];
    if let Some(shop_id) = &query.shop_id {
        params.push(("shop_id", eq(shop_id)));
    }
    params.push(("order", BILL_ORDER.to_string()));
    params
}

impl RestClient {
    pub fn new(ctx: RemoteContext, paid_status: impl Into<String>) -> Self {
        Self {
            ctx,
            paid_status: paid_status.into(),
        }
    }

    /// JSON body for a bill write with the paid status in the column's spelling
    fn bill_body<B: Serialize>(&self, body: &B) -> Result<serde_json::Value> {
        let mut value = serde_json::to_value(body)?;
        if let Some(status) = value.get_mut("status") {
            if *status == "paid" {
                *status = json!(self.paid_status);
            }
        }
        Ok(value)
    }

    fn table_url(&self, table: &str) -> String {
        self.ctx.endpoint(&format!("/rest/v1/{}", table))
    }

    async fn select<T: DeserializeOwned>(&self, table: &str, params: &Params) -> Result<Vec<T>> {
        tracing::debug!("GET {} {:?}", table, params);
        let response = self
            .ctx
            .request(Method::GET, &self.table_url(table))
            .query(params)
            .send()
            .await?;
        Ok(check_response(response).await?.json().await?)
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        entity: &'static str,
        id: &str,
    ) -> Result<T> {
        let mut params = by_id(id);
        params.push(("select", "*".to_string()));
        self.select(table, &params)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::not_found(entity, id))
    }

    /// Send a write and return the affected rows
    async fn write<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        table: &str,
        params: &Params,
        body: Option<&B>,
    ) -> Result<Vec<T>> {
        tracing::debug!("{} {} {:?}", method, table, params);
        let mut request = self
            .ctx
            .request(method, &self.table_url(table))
            .query(params)
            .header("Prefer", "return=representation");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        Ok(check_response(response).await?.json().await?)
    }

    async fn insert<T: DeserializeOwned, B: Serialize + ?Sized>(&self, table: &str, body: &B) -> Result<T> {
        self.write(Method::POST, table, &Vec::new(), Some(body))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Remote {
                status: 200,
                message: format!("insert into {} returned no row", table),
            })
    }

    async fn update<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        table: &str,
        entity: &'static str,
        id: &str,
        body: &B,
    ) -> Result<T> {
        self.write(Method::PATCH, table, &by_id(id), Some(body))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::not_found(entity, id))
    }

    async fn delete(&self, table: &str, entity: &'static str, id: &str) -> Result<()> {
        let deleted: Vec<serde_json::Value> = self
            .write::<_, ()>(Method::DELETE, table, &by_id(id), None)
            .await?;
        if deleted.is_empty() {
            return Err(AppError::not_found(entity, id));
        }
        Ok(())
    }
}

#[async_trait]
impl DataStore for RestClient {
    async fn list_shops(&self) -> Result<Vec<Shop>> {
        self.select(SHOPS, &shop_params()).await
    }

    async fn get_shop(&self, id: &str) -> Result<Shop> {
        self.select_one(SHOPS, "Shop", id).await
    }

    async fn insert_shop(&self, name: &str) -> Result<Shop> {
        self.insert(SHOPS, &json!({ "name": name })).await
    }

    async fn update_shop(&self, id: &str, name: &str) -> Result<Shop> {
        self.update(SHOPS, "Shop", id, &json!({ "name": name })).await
    }

    async fn delete_shop(&self, id: &str) -> Result<()> {
        self.delete(SHOPS, "Shop", id).await
    }

    async fn list_customers(&self, shop_id: Option<&str>) -> Result<Vec<Customer>> {
        self.select(CUSTOMERS, &customer_params(shop_id)).await
    }

    async fn get_customer(&self, id: &str) -> Result<Customer> {
        self.select_one(CUSTOMERS, "Customer", id).await
    }

    async fn insert_customer(&self, req: &CreateCustomerRequest) -> Result<Customer> {
        self.insert(CUSTOMERS, req).await
    }

    async fn update_customer(&self, id: &str, req: &UpdateCustomerRequest) -> Result<Customer> {
        self.update(CUSTOMERS, "Customer", id, req).await
    }

    async fn delete_customer(&self, id: &str) -> Result<()> {
        self.delete(CUSTOMERS, "Customer", id).await
    }

    async fn list_bills(&self, query: &BillQuery) -> Result<Vec<Bill>> {
        self.select(BILLS, &bill_params(query)).await
    }

    async fn get_bill(&self, id: &str) -> Result<Bill> {
        self.select_one(BILLS, "Bill", id).await
    }

    async fn insert_bill(&self, req: &CreateBillRequest) -> Result<Bill> {
        let row = self.bill_body(&NewBillRow {
            req,
            is_completed: false,
        })?;
        self.insert(BILLS, &row).await
    }

    async fn update_bill(&self, id: &str, patch: &BillPatch) -> Result<Bill> {
        if patch.is_empty() {
            return self.get_bill(id).await;
        }
        let body = self.bill_body(patch)?;
        self.update(BILLS, "Bill", id, &body).await
    }

    async fn delete_bill(&self, id: &str) -> Result<()> {
        self.delete(BILLS, "Bill", id).await
    }

    async fn list_photo_refs(&self) -> Result<Vec<String>> {
        let params: Params = vec![
            ("select", "image_url".to_string()),
            ("image_url", "not.is.null".to_string()),
        ];
        let rows: Vec<PhotoRef> = self.select(BILLS, &params).await?;
        Ok(rows.into_iter().filter_map(|r| r.image_url).collect())
    }
}
