//! Analytics service
//!
//! Paid, unpaid and stitching totals with the fixed half deduction, globally
//! and per shop. Always recomputed from the store; nothing is cached.

use crate::config::DEDUCTION_DIVISOR;
use crate::database::{Bill, BillQuery, BillStatus, DataStore, Shop};
use crate::error::Result;
use crate::events::{AppEvent, EventBus};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

/// The four figures shown for any set of bills
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
    /// Sum of balance amounts of paid bills
    pub paid: f64,
    /// Sum of balance amounts of unpaid bills
    pub unpaid: f64,
    pub stitching: f64,
    /// Stitching total divided by two
    pub half_deduction: f64,
}

impl Totals {
    fn add(&mut self, bill: &Bill) {
        match bill.status {
            BillStatus::Paid => self.paid += bill.balance_amount,
            BillStatus::Unpaid => self.unpaid += bill.balance_amount,
        }
        self.stitching += bill.stitching_amount;
        self.half_deduction = self.stitching / DEDUCTION_DIVISOR;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShopReport {
    pub shop_id: String,
    pub shop_name: String,
    pub totals: Totals,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalyticsSummary {
    pub totals: Totals,
    /// One row per shop in name order, including shops without bills
    pub shops: Vec<ShopReport>,
}

pub fn compute_totals<'a>(bills: impl IntoIterator<Item = &'a Bill>) -> Totals {
    let mut totals = Totals::default();
    for bill in bills {
        totals.add(bill);
    }
    totals
}

/// Build the summary from already-fetched shops and bills
pub fn summarize(shops: &[Shop], bills: &[Bill]) -> AnalyticsSummary {
    let mut per_shop: HashMap<&str, Totals> = HashMap::new();
    for bill in bills {
        per_shop.entry(bill.shop_id.as_str()).or_default().add(bill);
    }

    let mut rows: Vec<ShopReport> = shops
        .iter()
        .map(|shop| ShopReport {
            shop_id: shop.id.clone(),
            shop_name: shop.name.clone(),
            totals: per_shop.get(shop.id.as_str()).copied().unwrap_or_default(),
        })
        .collect();
    rows.sort_by(|a, b| a.shop_name.cmp(&b.shop_name));

    AnalyticsSummary {
        totals: compute_totals(bills),
        shops: rows,
    }
}

/// Fetches shops and bills and aggregates them
#[derive(Clone)]
pub struct AnalyticsService {
    store: Arc<dyn DataStore>,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    pub async fn compute(&self) -> Result<AnalyticsSummary> {
        let query = BillQuery::all();
        let (shops, bills) =
            tokio::try_join!(self.store.list_shops(), self.store.list_bills(&query))?;

        tracing::debug!(
            "Computing analytics over {} shops and {} bills",
            shops.len(),
            bills.len()
        );

        Ok(summarize(&shops, &bills))
    }

    /// Keep a summary current in the background.
    ///
    /// Computes once, then again whenever bills or shops change. The returned
    /// receiver holds `None` until the first computation succeeds.
    pub fn start_refresher(self, events: &EventBus) -> watch::Receiver<Option<AnalyticsSummary>> {
        let (tx, rx) = watch::channel(None);
        let mut changes = events.subscribe();

        tokio::spawn(async move {
            tracing::info!("Starting analytics refresher");
            self.refresh(&tx).await;

            loop {
                match changes.recv().await {
                    Ok(AppEvent::BillsChanged | AppEvent::ShopsChanged) => {}
                    Ok(AppEvent::CustomersChanged) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!("Analytics refresher skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }

                if tx.is_closed() {
                    break;
                }
                self.refresh(&tx).await;
            }

            tracing::info!("Analytics refresher stopped");
        });

        rx
    }

    async fn refresh(&self, tx: &watch::Sender<Option<AnalyticsSummary>>) {
        match self.compute().await {
            Ok(summary) => {
                let _ = tx.send(Some(summary));
            }
            Err(e) => tracing::error!("Error computing analytics: {}", e),
        }
    }
}
