//! Read-only aggregation queries backing the analytics service.

use crate::domain::{
    LotValuationRow, Money, OrderStatus, ProductId, ProductStatus, StatusFilter, TimeMs,
};
use crate::engine::ProfitRow;
use sqlx::Row;

use super::{get_parsed, get_uuid, Repository};

/// One product with its ledger stock, as read for the stock snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockQueryRow {
    pub product_id: ProductId,
    pub title: String,
    pub status: ProductStatus,
    pub price: Money,
    pub cost_price: Option<Money>,
    pub packaging_cost: Option<Money>,
    pub stock: i64,
}

impl Repository {
    /// Every product with the sum of its movements.
    pub async fn stock_rows(&self) -> Result<Vec<StockQueryRow>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.title, p.status, p.price, p.cost_price, p.packaging_cost,
                   COALESCE(SUM(m.quantity), 0) AS stock
            FROM products p
            LEFT JOIN inventory_movements m ON m.product_id = p.id
            GROUP BY p.id
            ORDER BY p.id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(StockQueryRow {
                    product_id: ProductId::new(row.try_get("id")?),
                    title: row.try_get("title")?,
                    status: get_parsed(row, "status")?,
                    price: Money::new(row.try_get("price")?),
                    cost_price: row.try_get::<Option<i64>, _>("cost_price")?.map(Money::new),
                    packaging_cost: row
                        .try_get::<Option<i64>, _>("packaging_cost")?
                        .map(Money::new),
                    stock: row.try_get("stock")?,
                })
            })
            .collect()
    }

    /// Remaining quantity and value of open lots, per product.
    pub async fn lot_valuation_rows(&self) -> Result<Vec<LotValuationRow>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT product_id,
                   COUNT(*) AS open_lots,
                   SUM(qty_remaining) AS qty_remaining,
                   SUM(qty_remaining * unit_cost) AS value
            FROM inventory_lots
            WHERE qty_remaining > 0
            GROUP BY product_id
            ORDER BY product_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(LotValuationRow {
                    product_id: ProductId::new(row.try_get("product_id")?),
                    open_lots: row.try_get("open_lots")?,
                    qty_remaining: row.try_get("qty_remaining")?,
                    value: Money::new(row.try_get("value")?),
                })
            })
            .collect()
    }

    /// Items of non-deleted orders created in `[from, to]` whose status
    /// passes `filter`.
    pub async fn profit_rows(
        &self,
        from: TimeMs,
        to: TimeMs,
        filter: StatusFilter,
    ) -> Result<Vec<ProfitRow>, sqlx::Error> {
        let status: Option<OrderStatus> = match filter {
            StatusFilter::Only(status) => Some(status),
            StatusFilter::Any => None,
        };

        let rows = sqlx::query(
            r#"
            SELECT o.id AS order_id, i.product_id, i.title_at_time, i.qty, i.price_at_time,
                   i.cost_price_at_time, i.packaging_cost_at_time, i.cogs_total
            FROM order_items i
            JOIN orders o ON o.id = i.order_id
            WHERE o.deleted_at IS NULL
              AND o.created_at >= ?
              AND o.created_at <= ?
              AND (? IS NULL OR o.status = ?)
            ORDER BY o.created_at ASC, i.id ASC
            "#,
        )
        .bind(from.as_i64())
        .bind(to.as_i64())
        .bind(status.map(|s| s.as_str()))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(ProfitRow {
                    order_id: get_uuid(row, "order_id")?,
                    product_id: ProductId::new(row.try_get("product_id")?),
                    title: row.try_get("title_at_time")?,
                    qty: row.try_get("qty")?,
                    price_at_time: Money::new(row.try_get("price_at_time")?),
                    cost_price_at_time: row
                        .try_get::<Option<i64>, _>("cost_price_at_time")?
                        .map(Money::new),
                    packaging_cost_at_time: Money::new(row.try_get("packaging_cost_at_time")?),
                    cogs_total: row.try_get::<Option<i64>, _>("cogs_total")?.map(Money::new),
                })
            })
            .collect()
    }
}
