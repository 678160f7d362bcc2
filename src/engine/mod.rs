//! Pure computation engine(s) for deterministic ledger logic.
//!
//! Nothing in here touches storage: the orchestration layer loads lots inside
//! a transaction, asks the engine for a plan, and applies it.

use crate::domain::{LotId, Money, ProductId};
use thiserror::Error;

pub mod fifo;
pub mod invariants;
pub mod landed_cost;
pub mod profit;

pub use fifo::plan_allocation;
pub use landed_cost::{apportion_half_up, per_unit_half_up, LandedCostError};
pub use profit::{line_profit, margin_percent, ProfitAccumulator, ProfitError, ProfitRow};

/// One lot's contribution to an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedTake {
    pub lot_id: LotId,
    pub qty: i64,
    pub unit_cost: Money,
    /// Lot remaining quantity once this take is applied.
    pub remaining_after: i64,
}

/// FIFO consumption plan for one product and one consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationPlan {
    pub product_id: ProductId,
    pub requested: i64,
    pub takes: Vec<PlannedTake>,
    pub total_cost: Money,
}

impl AllocationPlan {
    pub fn allocated_qty(&self) -> i64 {
        self.takes.iter().map(|t| t.qty).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("requested quantity must be positive, got {0}")]
    NonPositiveQuantity(i64),
    #[error("insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: ProductId,
        available: i64,
        requested: i64,
    },
    /// The allocation logic produced an inconsistent result. Always a bug.
    #[error("allocation invariant violated: {0}")]
    Invariant(String),
}
