//! Applies FIFO allocation plans to the lot store.
//!
//! This is the only code path that decrements `qty_remaining`.

use super::FulfillmentError;
use crate::db::Repository;
use crate::domain::{ConsumerRef, LotAllocation, Money, ProductId};
use crate::engine::plan_allocation;
use sqlx::sqlite::SqliteConnection;
use tracing::debug;

/// What one allocation consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationOutcome {
    pub product_id: ProductId,
    pub consumer: ConsumerRef,
    pub allocations: Vec<LotAllocation>,
    pub total_cost: Money,
}

impl AllocationOutcome {
    pub fn allocated_qty(&self) -> i64 {
        self.allocations.iter().map(|a| a.qty).sum()
    }
}

/// Consume `quantity` units of a product oldest lot first and charge them to
/// `consumer`.
///
/// The caller owns the transaction, must have taken the lot write lock for
/// the product, and must roll back on any error. The plan is computed in
/// memory before the first write, so a shortfall writes nothing.
pub async fn allocate(
    repo: &Repository,
    conn: &mut SqliteConnection,
    product_id: ProductId,
    quantity: i64,
    consumer: ConsumerRef,
) -> Result<AllocationOutcome, FulfillmentError> {
    let lots = repo.list_consumable_lots(conn, product_id).await?;
    let plan = plan_allocation(product_id, &lots, quantity)?;

    let mut allocations = Vec::with_capacity(plan.takes.len());
    for take in &plan.takes {
        let applied = repo
            .decrement_lot_remaining(conn, take.lot_id, take.qty)
            .await?;
        if !applied {
            return Err(FulfillmentError::invariant(format!(
                "lot {} could not supply {} units planned for {}",
                take.lot_id, take.qty, consumer
            )));
        }

        let allocation = LotAllocation {
            lot_id: take.lot_id,
            consumer,
            qty: take.qty,
            unit_cost: take.unit_cost,
        };
        repo.insert_allocation(conn, &allocation).await?;
        allocations.push(allocation);
    }

    debug!(
        product_id = product_id.as_i64(),
        %consumer,
        qty = quantity,
        lots = allocations.len(),
        cost = plan.total_cost.minor_units(),
        "Allocated stock"
    );

    Ok(AllocationOutcome {
        product_id,
        consumer,
        allocations,
        total_cost: plan.total_cost,
    })
}
