use crate::domain::{InventoryLot, Money, ProductId};

use super::{invariants, AllocationError, AllocationPlan, PlannedTake};

/// Plan consumption of `quantity` units of `product_id` from `lots`, oldest first.
///
/// `lots` must be the product's consumable lots in FIFO order
/// (`received_at` ascending, ties by id), as returned by the lot store.
/// The plan is all-or-nothing: if the lots run out before the request is
/// covered, nothing is planned and `InsufficientStock` is returned.
///
/// Every plan is checked against the allocation invariants before it is
/// returned, so a plan that comes back `Ok` is safe to apply.
pub fn plan_allocation(
    product_id: ProductId,
    lots: &[InventoryLot],
    quantity: i64,
) -> Result<AllocationPlan, AllocationError> {
    if quantity <= 0 {
        return Err(AllocationError::NonPositiveQuantity(quantity));
    }
    invariants::check_fifo_input(product_id, lots)?;

    let mut needed = quantity;
    let mut total_cost = Money::zero();
    let mut takes = Vec::new();

    for lot in lots {
        if needed == 0 {
            break;
        }
        if lot.qty_remaining == 0 {
            continue;
        }

        let take = needed.min(lot.qty_remaining);
        let cost = lot
            .unit_cost
            .checked_times(take)
            .and_then(|c| total_cost.checked_add(c))
            .ok_or_else(|| {
                AllocationError::Invariant(format!(
                    "cost overflow allocating {} from lot {}",
                    take, lot.id
                ))
            })?;
        total_cost = cost;

        takes.push(PlannedTake {
            lot_id: lot.id,
            qty: take,
            unit_cost: lot.unit_cost,
            remaining_after: lot.qty_remaining - take,
        });
        needed -= take;
    }

    if needed > 0 {
        return Err(AllocationError::InsufficientStock {
            product_id,
            available: quantity - needed,
            requested: quantity,
        });
    }

    let plan = AllocationPlan {
        product_id,
        requested: quantity,
        takes,
        total_cost,
    };
    invariants::check_plan(lots, &plan)?;
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LotId, TimeMs};

    fn lot(id: i64, received_at: i64, qty: i64, remaining: i64, unit_cost: i64) -> InventoryLot {
        InventoryLot {
            id: LotId::new(id),
            product_id: ProductId::new(1),
            purchase_id: None,
            unit_cost: Money::new(unit_cost),
            qty_received: qty,
            qty_remaining: remaining,
            received_at: TimeMs::new(received_at),
        }
    }

    #[test]
    fn test_spans_two_lots() {
        let lots = vec![lot(1, 1000, 10, 10, 500), lot(2, 2000, 10, 10, 700)];
        let plan = plan_allocation(ProductId::new(1), &lots, 12).unwrap();

        assert_eq!(plan.takes.len(), 2);
        assert_eq!((plan.takes[0].qty, plan.takes[0].remaining_after), (10, 0));
        assert_eq!((plan.takes[1].qty, plan.takes[1].remaining_after), (2, 8));
        assert_eq!(plan.total_cost, Money::new(6400));
    }

    #[test]
    fn test_exact_fit_leaves_later_lots_untouched() {
        let lots = vec![lot(1, 1000, 5, 5, 100), lot(2, 2000, 5, 5, 200)];
        let plan = plan_allocation(ProductId::new(1), &lots, 5).unwrap();
        assert_eq!(plan.takes.len(), 1);
        assert_eq!(plan.total_cost, Money::new(500));
    }

    #[test]
    fn test_skips_exhausted_lots() {
        let lots = vec![lot(1, 1000, 5, 0, 100), lot(2, 2000, 5, 3, 200)];
        let plan = plan_allocation(ProductId::new(1), &lots, 2).unwrap();
        assert_eq!(plan.takes.len(), 1);
        assert_eq!(plan.takes[0].lot_id, LotId::new(2));
    }

    #[test]
    fn test_insufficient_stock_reports_available() {
        let lots = vec![lot(1, 1000, 5, 5, 100)];
        let err = plan_allocation(ProductId::new(1), &lots, 6).unwrap_err();
        assert_eq!(
            err,
            AllocationError::InsufficientStock {
                product_id: ProductId::new(1),
                available: 5,
                requested: 6,
            }
        );
    }

    #[test]
    fn test_rejects_non_positive_quantity() {
        let lots = vec![lot(1, 1000, 5, 5, 100)];
        assert_eq!(
            plan_allocation(ProductId::new(1), &lots, 0),
            Err(AllocationError::NonPositiveQuantity(0))
        );
    }

    #[test]
    fn test_rejects_lots_out_of_fifo_order() {
        let lots = vec![lot(2, 2000, 5, 5, 200), lot(1, 1000, 5, 5, 100)];
        assert!(matches!(
            plan_allocation(ProductId::new(1), &lots, 3),
            Err(AllocationError::Invariant(_))
        ));
    }

    #[test]
    fn test_same_received_at_breaks_ties_by_id() {
        let lots = vec![lot(1, 1000, 5, 5, 100), lot(2, 1000, 5, 5, 200)];
        let plan = plan_allocation(ProductId::new(1), &lots, 6).unwrap();
        assert_eq!(plan.takes[0].lot_id, LotId::new(1));
        assert_eq!(plan.total_cost, Money::new(700));
    }
}
