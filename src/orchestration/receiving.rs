//! Stock receipts: the only way new lots come into existence.

use super::retry::run_with_retry;
use super::FulfillmentError;
use crate::config::Config;
use crate::db::Repository;
use crate::domain::{
    InventoryLot, Money, MovementKind, NewPurchase, ProductId, Purchase, SourceKind, TimeMs,
};
use crate::engine::invariants::check_ledger_balance;
use crate::engine::{apportion_half_up, per_unit_half_up};
use sqlx::sqlite::SqliteConnection;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct ReceivingService {
    repo: Arc<Repository>,
    retry_max: Duration,
}

impl ReceivingService {
    pub fn new(repo: Arc<Repository>, config: &Config) -> Self {
        Self {
            repo,
            retry_max: config.tx_retry_max(),
        }
    }

    /// Manual receipt of `qty` units at `unit_cost`: one lot plus one ADJUST
    /// movement.
    pub async fn receive_stock(
        &self,
        product_id: ProductId,
        qty: i64,
        unit_cost: Money,
        note: Option<String>,
    ) -> Result<InventoryLot, FulfillmentError> {
        if qty <= 0 {
            return Err(FulfillmentError::Validation(format!(
                "received quantity must be positive, got {}",
                qty
            )));
        }
        if unit_cost.is_negative() {
            return Err(FulfillmentError::Validation(format!(
                "unit cost must not be negative, got {}",
                unit_cost
            )));
        }

        let lot = run_with_retry("receive_stock", self.retry_max, || {
            self.receive_stock_tx(product_id, qty, unit_cost, note.as_deref())
        })
        .await?;

        info!(
            lot_id = lot.id.as_i64(),
            product_id = product_id.as_i64(),
            qty,
            unit_cost = unit_cost.minor_units(),
            "Stock received"
        );
        Ok(lot)
    }

    async fn receive_stock_tx(
        &self,
        product_id: ProductId,
        qty: i64,
        unit_cost: Money,
        note: Option<&str>,
    ) -> Result<InventoryLot, FulfillmentError> {
        let mut tx = self.repo.begin().await?;
        self.repo.lock_lots(&mut tx, &[product_id]).await?;
        self.require_product(&mut tx, product_id).await?;

        let lot = self
            .repo
            .insert_lot(&mut tx, product_id, unit_cost, qty, TimeMs::now(), None)
            .await?;
        self.repo
            .append_movement(
                &mut tx,
                product_id,
                qty,
                MovementKind::Adjust,
                SourceKind::Manual,
                Some(&lot.id.to_string()),
                note,
            )
            .await?;
        self.check_balance(&mut tx, product_id).await?;

        tx.commit().await?;
        Ok(lot)
    }

    /// Post a supplier purchase: one lot and one IN movement per line, with
    /// freight spread over the lines by value and folded into unit costs.
    pub async fn post_purchase(&self, purchase: NewPurchase) -> Result<Purchase, FulfillmentError> {
        validate_purchase(&purchase)?;

        let posted = run_with_retry("post_purchase", self.retry_max, || {
            self.post_purchase_tx(&purchase)
        })
        .await?;

        info!(
            purchase_id = %posted.id,
            lots = posted.lots.len(),
            freight = posted.freight_cost.minor_units(),
            "Purchase posted"
        );
        Ok(posted)
    }

    async fn post_purchase_tx(&self, purchase: &NewPurchase) -> Result<Purchase, FulfillmentError> {
        let product_ids: Vec<ProductId> = purchase
            .lines
            .iter()
            .map(|l| l.product_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut tx = self.repo.begin().await?;
        self.repo.lock_lots(&mut tx, &product_ids).await?;
        for &product_id in &product_ids {
            self.require_product(&mut tx, product_id).await?;
        }

        let id = Uuid::new_v4();
        let received_at = purchase.received_at.unwrap_or_else(TimeMs::now);
        self.repo
            .insert_purchase(
                &mut tx,
                id,
                purchase.supplier.as_deref(),
                purchase.freight_cost,
                received_at,
            )
            .await?;

        let weights: Vec<Money> = purchase.lines.iter().map(|l| l.line_value()).collect();
        let freight_shares = apportion_half_up(purchase.freight_cost, &weights)
            .map_err(|e| FulfillmentError::Validation(format!("cannot apportion freight: {}", e)))?;

        let source_id = id.to_string();
        let mut lots = Vec::with_capacity(purchase.lines.len());
        for (line, share) in purchase.lines.iter().zip(freight_shares) {
            let unit_freight = per_unit_half_up(share, line.qty).map_err(|e| {
                FulfillmentError::Validation(format!(
                    "cannot apportion freight to product {}: {}",
                    line.product_id, e
                ))
            })?;
            let landed_unit_cost = line
                .unit_cost
                .checked_add(unit_freight)
                .ok_or_else(|| {
                    FulfillmentError::Validation(format!(
                        "landed unit cost of product {} overflows",
                        line.product_id
                    ))
                })?;
            let lot = self
                .repo
                .insert_lot(&mut tx, line.product_id, landed_unit_cost, line.qty, received_at, Some(id))
                .await?;
            self.repo
                .append_movement(
                    &mut tx,
                    line.product_id,
                    line.qty,
                    MovementKind::In,
                    SourceKind::Purchase,
                    Some(&source_id),
                    None,
                )
                .await?;
            lots.push(lot);
        }

        for &product_id in &product_ids {
            self.check_balance(&mut tx, product_id).await?;
        }

        tx.commit().await?;
        Ok(Purchase {
            id,
            supplier: purchase.supplier.clone(),
            freight_cost: purchase.freight_cost,
            received_at,
            lots,
        })
    }

    async fn require_product(
        &self,
        conn: &mut SqliteConnection,
        product_id: ProductId,
    ) -> Result<(), FulfillmentError> {
        match self.repo.get_product_in(conn, product_id).await? {
            Some(_) => Ok(()),
            None => Err(FulfillmentError::NotFound(format!("product {}", product_id))),
        }
    }

    async fn check_balance(
        &self,
        conn: &mut SqliteConnection,
        product_id: ProductId,
    ) -> Result<(), FulfillmentError> {
        let ledger = self.repo.current_stock_in(conn, product_id).await?;
        let lots = self.repo.lot_stock_in(conn, product_id).await?;
        check_ledger_balance(product_id, ledger, lots)?;
        Ok(())
    }
}

fn validate_purchase(purchase: &NewPurchase) -> Result<(), FulfillmentError> {
    if purchase.lines.is_empty() {
        return Err(FulfillmentError::Validation(
            "purchase must have at least one line".to_string(),
        ));
    }
    if purchase.freight_cost.is_negative() {
        return Err(FulfillmentError::Validation(
            "freight cost must not be negative".to_string(),
        ));
    }
    for line in &purchase.lines {
        if line.qty <= 0 {
            return Err(FulfillmentError::Validation(format!(
                "quantity for product {} must be positive, got {}",
                line.product_id, line.qty
            )));
        }
        if line.unit_cost.is_negative() {
            return Err(FulfillmentError::Validation(format!(
                "unit cost for product {} must not be negative",
                line.product_id
            )));
        }
        if line.unit_cost.checked_times(line.qty).is_none() {
            return Err(FulfillmentError::Validation(format!(
                "value of the line for product {} overflows",
                line.product_id
            )));
        }
    }
    Ok(())
}
