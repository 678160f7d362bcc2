//! Always-on consistency checks for the allocation engine.
//!
//! A failure here means the allocation logic itself is wrong. Every violation
//! is logged at error level where it is detected and returned as
//! `AllocationError::Invariant`, which aborts the enclosing transaction.

use crate::domain::{InventoryLot, LotId, Money, ProductId};
use std::collections::{HashMap, HashSet};
use tracing::error;

use super::{AllocationError, AllocationPlan};

fn violation(message: String) -> AllocationError {
    error!(invariant = %message, "Inventory invariant violated");
    AllocationError::Invariant(message)
}

/// Lots handed to the planner belong to the product, respect
/// `0 <= qty_remaining <= qty_received` and are in FIFO order.
pub fn check_fifo_input(product_id: ProductId, lots: &[InventoryLot]) -> Result<(), AllocationError> {
    for lot in lots {
        if lot.product_id != product_id {
            return Err(violation(format!(
                "lot {} belongs to product {}, expected {}",
                lot.id, lot.product_id, product_id
            )));
        }
        if lot.qty_remaining < 0 || lot.qty_remaining > lot.qty_received {
            return Err(violation(format!(
                "lot {} remaining {} outside [0, {}]",
                lot.id, lot.qty_remaining, lot.qty_received
            )));
        }
    }

    for pair in lots.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if (a.received_at, a.id) >= (b.received_at, b.id) {
            return Err(violation(format!(
                "lots {} and {} are not in FIFO order",
                a.id, b.id
            )));
        }
    }

    Ok(())
}

/// A plan covers exactly the requested quantity, takes from each lot at most
/// once and never more than it holds, and its total cost is the exact sum of
/// `qty * unit_cost`.
pub fn check_plan(lots: &[InventoryLot], plan: &AllocationPlan) -> Result<(), AllocationError> {
    let by_id: HashMap<LotId, &InventoryLot> = lots.iter().map(|l| (l.id, l)).collect();
    let mut seen = HashSet::new();
    let mut allocated = 0i64;
    let mut cost = Money::zero();

    for take in &plan.takes {
        let lot = by_id.get(&take.lot_id).ok_or_else(|| {
            violation(format!("plan references unknown lot {}", take.lot_id))
        })?;
        if !seen.insert(take.lot_id) {
            return Err(violation(format!("lot {} allocated twice", take.lot_id)));
        }
        if take.qty <= 0 || take.qty > lot.qty_remaining {
            return Err(violation(format!(
                "take of {} from lot {} holding {}",
                take.qty, lot.id, lot.qty_remaining
            )));
        }
        if take.unit_cost != lot.unit_cost {
            return Err(violation(format!(
                "lot {} unit cost {} captured as {}",
                lot.id, lot.unit_cost, take.unit_cost
            )));
        }
        if take.remaining_after != lot.qty_remaining - take.qty
            || take.remaining_after < 0
            || take.remaining_after > lot.qty_received
        {
            return Err(violation(format!(
                "lot {} would be left at {}",
                lot.id, take.remaining_after
            )));
        }

        allocated += take.qty;
        cost = take
            .unit_cost
            .checked_times(take.qty)
            .and_then(|c| cost.checked_add(c))
            .ok_or_else(|| violation(format!("cost overflow on lot {}", lot.id)))?;
    }

    if allocated != plan.requested {
        return Err(violation(format!(
            "allocated {} of {} requested for product {}",
            allocated, plan.requested, plan.product_id
        )));
    }
    if cost != plan.total_cost {
        return Err(violation(format!(
            "total cost {} does not match allocations sum {} for product {}",
            plan.total_cost, cost, plan.product_id
        )));
    }

    Ok(())
}

/// Ledger stock and lot stock of a product agree.
pub fn check_ledger_balance(
    product_id: ProductId,
    ledger_stock: i64,
    lot_stock: i64,
) -> Result<(), AllocationError> {
    if ledger_stock != lot_stock {
        return Err(violation(format!(
            "product {} ledger stock {} != lot stock {}",
            product_id, ledger_stock, lot_stock
        )));
    }
    Ok(())
}
