//! Line profit and profit report aggregation.

use crate::domain::{Money, ProductId, ProductProfit, ProfitReport};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use uuid::Uuid;

/// Report amounts no longer fit in `i64` minor units.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfitError {
    #[error("amounts of order {order_id} product {product_id} overflow the profit report")]
    RowOverflow { order_id: Uuid, product_id: ProductId },
    #[error("profit report totals overflow")]
    TotalOverflow,
}

/// `price * qty - cogs - packaging * qty`, or None on overflow.
pub fn line_profit(price: Money, qty: i64, cogs: Money, packaging: Money) -> Option<Money> {
    let revenue = price.checked_times(qty)?;
    let packaging_total = packaging.checked_times(qty)?;
    revenue
        .minor_units()
        .checked_sub(cogs.minor_units())?
        .checked_sub(packaging_total.minor_units())
        .map(Money::new)
}

/// Gross profit as a percentage of revenue, rounded half-up to 2 dp.
/// Zero revenue yields zero.
pub fn margin_percent(gross_profit: Money, revenue: Money) -> Decimal {
    if revenue.minor_units() == 0 {
        return Decimal::ZERO;
    }
    let pct = Decimal::from(gross_profit.minor_units()) * Decimal::ONE_HUNDRED
        / Decimal::from(revenue.minor_units());
    pct.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// One order item as read for profit reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfitRow {
    pub order_id: Uuid,
    pub product_id: ProductId,
    pub title: String,
    pub qty: i64,
    pub price_at_time: Money,
    pub cost_price_at_time: Option<Money>,
    pub packaging_cost_at_time: Money,
    pub cogs_total: Option<Money>,
}

impl ProfitRow {
    /// Allocated COGS, or the cost snapshot times qty for items that were
    /// never allocated. None on overflow.
    pub fn effective_cogs(&self) -> Option<Money> {
        match (self.cogs_total, self.cost_price_at_time) {
            (Some(cogs), _) => Some(cogs),
            (None, Some(cost)) => cost.checked_times(self.qty),
            (None, None) => Some(Money::zero()),
        }
    }
}

/// Folds profit rows into a `ProfitReport`.
#[derive(Debug, Default)]
pub struct ProfitAccumulator {
    orders: HashSet<Uuid>,
    per_product: BTreeMap<ProductId, ProductProfit>,
    revenue: Money,
    cogs: Money,
    packaging: Money,
    fallback_rows: usize,
}

impl ProfitAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one row in. On overflow the accumulator is left unchanged.
    pub fn add(&mut self, row: &ProfitRow) -> Result<(), ProfitError> {
        let overflow = || ProfitError::RowOverflow {
            order_id: row.order_id,
            product_id: row.product_id,
        };
        let revenue = row.price_at_time.checked_times(row.qty).ok_or_else(overflow)?;
        let cogs = row.effective_cogs().ok_or_else(overflow)?;
        let packaging = row
            .packaging_cost_at_time
            .checked_times(row.qty)
            .ok_or_else(overflow)?;

        let total_revenue = self.revenue.checked_add(revenue).ok_or_else(overflow)?;
        let total_cogs = self.cogs.checked_add(cogs).ok_or_else(overflow)?;
        let total_packaging = self.packaging.checked_add(packaging).ok_or_else(overflow)?;

        let (qty_sold, product_revenue, product_cogs, product_packaging) = self
            .per_product
            .get(&row.product_id)
            .map(|p| (p.qty_sold, p.revenue, p.cogs, p.packaging))
            .unwrap_or_default();
        let qty_sold = qty_sold.checked_add(row.qty).ok_or_else(overflow)?;
        let product_revenue = product_revenue.checked_add(revenue).ok_or_else(overflow)?;
        let product_cogs = product_cogs.checked_add(cogs).ok_or_else(overflow)?;
        let product_packaging = product_packaging
            .checked_add(packaging)
            .ok_or_else(overflow)?;
        let gross_profit = product_revenue
            .checked_sub(product_cogs)
            .and_then(|p| p.checked_sub(product_packaging))
            .ok_or_else(overflow)?;

        if row.cogs_total.is_none() {
            self.fallback_rows += 1;
        }
        self.orders.insert(row.order_id);
        self.revenue = total_revenue;
        self.cogs = total_cogs;
        self.packaging = total_packaging;

        let entry = self
            .per_product
            .entry(row.product_id)
            .or_insert_with(|| ProductProfit {
                product_id: row.product_id,
                title: row.title.clone(),
                ..Default::default()
            });
        entry.qty_sold = qty_sold;
        entry.revenue = product_revenue;
        entry.cogs = product_cogs;
        entry.packaging = product_packaging;
        entry.gross_profit = gross_profit;
        Ok(())
    }

    /// Number of rows costed from the product cost snapshot instead of lots.
    pub fn fallback_rows(&self) -> usize {
        self.fallback_rows
    }

    pub fn finish(self) -> Result<ProfitReport, ProfitError> {
        let gross_profit = self
            .revenue
            .checked_sub(self.cogs)
            .and_then(|p| p.checked_sub(self.packaging))
            .ok_or(ProfitError::TotalOverflow)?;
        Ok(ProfitReport {
            revenue: self.revenue,
            cogs: self.cogs,
            packaging: self.packaging,
            gross_profit,
            margin_percent: margin_percent(gross_profit, self.revenue),
            order_count: self.orders.len() as i64,
            per_product: self.per_product.into_values().collect(),
        })
    }
}
