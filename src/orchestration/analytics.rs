//! Read-only stock and profit reports, recomputed on every call.

use super::FulfillmentError;
use crate::db::Repository;
use crate::domain::{LotValuationRow, ProductId, ProfitReport, StatusFilter, StockRow, TimeMs};
use crate::engine::{ProfitAccumulator, ProfitError};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct AnalyticsService {
    repo: Arc<Repository>,
}

impl AnalyticsService {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    /// Ledger stock of one product. Unknown products have no movements and
    /// report 0.
    pub async fn current_stock(&self, product_id: ProductId) -> Result<i64, FulfillmentError> {
        Ok(self.repo.current_stock(product_id).await?)
    }

    /// Every product with its stock and unit economics.
    pub async fn stock_snapshot(&self) -> Result<Vec<StockRow>, FulfillmentError> {
        let rows = self.repo.stock_rows().await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let unit_margin = row
                    .cost_price
                    .map(|cost| row.price - cost - row.packaging_cost.unwrap_or_default());
                StockRow {
                    product_id: row.product_id,
                    title: row.title,
                    status: row.status,
                    stock: row.stock,
                    price: row.price,
                    cost_price: row.cost_price,
                    packaging_cost: row.packaging_cost,
                    unit_margin,
                    stock_value: row.cost_price.map(|cost| cost.times(row.stock)),
                }
            })
            .collect())
    }

    /// Remaining quantity and FIFO value of open lots, for one product or all.
    pub async fn lot_valuation(
        &self,
        product_id: Option<ProductId>,
    ) -> Result<Vec<LotValuationRow>, FulfillmentError> {
        let rows = self.repo.lot_valuation_rows().await?;
        Ok(match product_id {
            Some(id) => rows.into_iter().filter(|r| r.product_id == id).collect(),
            None => rows,
        })
    }

    /// Revenue, COGS, packaging and gross profit of orders created in
    /// `[from, to]` whose status passes `filter`. Soft-deleted orders are
    /// excluded.
    pub async fn profit_analytics(
        &self,
        from: TimeMs,
        to: TimeMs,
        filter: StatusFilter,
    ) -> Result<ProfitReport, FulfillmentError> {
        if from > to {
            return Err(FulfillmentError::Validation(format!(
                "range start {} is after range end {}",
                from.as_i64(),
                to.as_i64()
            )));
        }

        let rows = self.repo.profit_rows(from, to, filter).await?;
        let mut acc = ProfitAccumulator::new();
        for row in &rows {
            acc.add(row).map_err(report_overflow)?;
        }

        if acc.fallback_rows() > 0 {
            warn!(
                rows = acc.fallback_rows(),
                "Order items without allocated COGS, costed from product cost snapshot"
            );
        }
        let report = acc.finish().map_err(report_overflow)?;
        debug!(
            orders = report.order_count,
            revenue = report.revenue.minor_units(),
            gross_profit = report.gross_profit.minor_units(),
            "Profit report computed"
        );
        Ok(report)
    }
}

fn report_overflow(err: ProfitError) -> FulfillmentError {
    FulfillmentError::Validation(format!("{}, narrow the report range", err))
}
