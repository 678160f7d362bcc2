//! Supplier purchases: the main source of new lots.

use crate::domain::{Money, ProductId, TimeMs};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseLine {
    pub product_id: ProductId,
    pub qty: i64,
    /// Supplier unit cost before freight.
    pub unit_cost: Money,
}

impl PurchaseLine {
    pub fn line_value(&self) -> Money {
        self.unit_cost.times(self.qty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPurchase {
    #[serde(default)]
    pub supplier: Option<String>,
    /// Freight and other landed costs, spread over the lines by value.
    #[serde(default)]
    pub freight_cost: Money,
    /// Defaults to now. Determines where the lots sit in FIFO order.
    #[serde(default)]
    pub received_at: Option<TimeMs>,
    pub lines: Vec<PurchaseLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: Uuid,
    pub supplier: Option<String>,
    pub freight_cost: Money,
    pub received_at: TimeMs,
    pub lots: Vec<crate::domain::InventoryLot>,
}
