//! Read-side report shapes.

use crate::domain::{Money, OrderStatus, ProductId, ProductStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which orders a profit report includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusFilter {
    Only(OrderStatus),
    Any,
}

impl Default for StatusFilter {
    fn default() -> Self {
        StatusFilter::Only(OrderStatus::Done)
    }
}

impl StatusFilter {
    pub fn matches(&self, status: OrderStatus) -> bool {
        match self {
            StatusFilter::Only(wanted) => *wanted == status,
            StatusFilter::Any => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockRow {
    pub product_id: ProductId,
    pub title: String,
    pub status: ProductStatus,
    pub stock: i64,
    pub price: Money,
    pub cost_price: Option<Money>,
    pub packaging_cost: Option<Money>,
    pub unit_margin: Option<Money>,
    /// `stock * cost_price` when the cost basis is known.
    pub stock_value: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotValuationRow {
    pub product_id: ProductId,
    pub open_lots: i64,
    pub qty_remaining: i64,
    /// `sum(qty_remaining * unit_cost)` over open lots.
    pub value: Money,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductProfit {
    pub product_id: ProductId,
    pub title: String,
    pub qty_sold: i64,
    pub revenue: Money,
    pub cogs: Money,
    pub packaging: Money,
    pub gross_profit: Money,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitReport {
    pub revenue: Money,
    pub cogs: Money,
    pub packaging: Money,
    pub gross_profit: Money,
    /// Gross profit over revenue, in percent, two decimal places.
    pub margin_percent: Decimal,
    pub order_count: i64,
    pub per_product: Vec<ProductProfit>,
}
