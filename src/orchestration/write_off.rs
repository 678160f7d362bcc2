//! Stock write-offs for loss and damage.

use super::allocation::allocate;
use super::retry::run_with_retry;
use super::{FulfillmentError, OutOfStock};
use crate::config::Config;
use crate::db::Repository;
use crate::domain::{ConsumerRef, MovementKind, Product, ProductId, SourceKind, TimeMs, WriteOff};
use crate::engine::invariants::check_ledger_balance;
use crate::notify::{self, Notifier, NotifyEvent, WriteOffRecorded};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct WriteOffService {
    repo: Arc<Repository>,
    notifier: Arc<dyn Notifier>,
    retry_max: Duration,
}

impl WriteOffService {
    pub fn new(repo: Arc<Repository>, notifier: Arc<dyn Notifier>, config: &Config) -> Self {
        Self {
            repo,
            notifier,
            retry_max: config.tx_retry_max(),
        }
    }

    /// Remove `qty` units from stock, costed FIFO.
    ///
    /// Quantity, product and stock are checked on committed state first; the
    /// allocation inside the transaction is what actually guarantees stock.
    pub async fn write_off(
        &self,
        product_id: ProductId,
        qty: i64,
        reason: Option<String>,
    ) -> Result<WriteOff, FulfillmentError> {
        if qty <= 0 {
            return Err(FulfillmentError::Validation(format!(
                "write-off quantity must be positive, got {}",
                qty
            )));
        }
        let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());

        let product = self
            .repo
            .get_product(product_id)
            .await?
            .ok_or_else(|| FulfillmentError::NotFound(format!("product {}", product_id)))?;

        let available = self.repo.current_stock(product_id).await?;
        if available < qty {
            return Err(FulfillmentError::OutOfStock(OutOfStock {
                product_id,
                product_title: product.title,
                available,
                requested: qty,
            }));
        }

        let write_off = run_with_retry("write_off", self.retry_max, || {
            self.write_off_tx(&product, qty, reason.as_deref())
        })
        .await?;

        info!(
            write_off_id = %write_off.id,
            product_id = product_id.as_i64(),
            qty,
            total_cost = write_off.total_cost.minor_units(),
            "Stock written off"
        );
        notify::dispatch(
            self.notifier.clone(),
            NotifyEvent::WriteOffRecorded(WriteOffRecorded {
                write_off_id: write_off.id,
                product_id,
                qty,
                total_cost: write_off.total_cost,
                reason: write_off.reason.clone(),
            }),
        );

        Ok(write_off)
    }

    async fn write_off_tx(
        &self,
        product: &Product,
        qty: i64,
        reason: Option<&str>,
    ) -> Result<WriteOff, FulfillmentError> {
        let mut tx = self.repo.begin().await?;
        self.repo.lock_lots(&mut tx, &[product.id]).await?;

        let id = Uuid::new_v4();
        let outcome = allocate(&self.repo, &mut tx, product.id, qty, ConsumerRef::WriteOff(id))
            .await
            .map_err(|e| e.with_product_title(&product.title))?;

        let write_off = WriteOff {
            id,
            product_id: product.id,
            qty,
            total_cost: outcome.total_cost,
            reason: reason.map(str::to_string),
            created_at: TimeMs::now(),
            allocations: outcome.allocations,
        };
        self.repo.insert_write_off(&mut tx, &write_off).await?;

        self.repo
            .append_movement(
                &mut tx,
                product.id,
                -qty,
                MovementKind::Out,
                SourceKind::WriteOff,
                Some(&id.to_string()),
                reason,
            )
            .await?;
        let ledger = self.repo.current_stock_in(&mut tx, product.id).await?;
        let lots = self.repo.lot_stock_in(&mut tx, product.id).await?;
        check_ledger_balance(product.id, ledger, lots)?;

        tx.commit().await?;
        Ok(write_off)
    }

    pub async fn get_write_off(&self, id: Uuid) -> Result<WriteOff, FulfillmentError> {
        self.repo
            .get_write_off(id)
            .await?
            .ok_or_else(|| FulfillmentError::NotFound(format!("write-off {}", id)))
    }
}
