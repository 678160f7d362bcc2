//! Transactional operations over the ledger, the lot store and orders.
//!
//! Each mutating operation runs in exactly one SQLite transaction whose first
//! statement takes the write lock on the lots it may consume. Business errors
//! roll the transaction back and surface as `FulfillmentError`; lock conflicts
//! are retried (`retry`).

pub mod allocation;
pub mod analytics;
pub mod fulfillment;
pub mod receiving;
pub mod retry;
pub mod write_off;

pub use allocation::{allocate, AllocationOutcome};
pub use analytics::AnalyticsService;
pub use fulfillment::OrderService;
pub use receiving::ReceivingService;
pub use write_off::WriteOffService;

use crate::db::repo::is_lock_conflict;
use crate::domain::ProductId;
use crate::engine::AllocationError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// Structured payload of a stock shortfall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutOfStock {
    pub product_id: ProductId,
    pub product_title: String,
    pub available: i64,
    pub requested: i64,
}

#[derive(Debug, Error)]
pub enum FulfillmentError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error(
        "Out of stock: product {} ({}) has {} available, {} requested",
        .0.product_id, .0.product_title, .0.available, .0.requested
    )]
    OutOfStock(OutOfStock),
    /// Internal consistency failure. Always a bug, never retried.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl FulfillmentError {
    /// Log and build an `InvariantViolation`.
    pub fn invariant(message: String) -> Self {
        error!(invariant = %message, "Inventory invariant violated");
        FulfillmentError::InvariantViolation(message)
    }

    /// Fill in the product title of an `OutOfStock` raised where only the id
    /// was known.
    pub fn with_product_title(self, title: &str) -> Self {
        match self {
            FulfillmentError::OutOfStock(mut shortfall) if shortfall.product_title.is_empty() => {
                shortfall.product_title = title.to_string();
                FulfillmentError::OutOfStock(shortfall)
            }
            other => other,
        }
    }

    /// True for SQLite lock conflicts, the only errors worth retrying.
    pub fn is_lock_conflict(&self) -> bool {
        match self {
            FulfillmentError::Storage(e) => is_lock_conflict(e),
            _ => false,
        }
    }
}

impl From<AllocationError> for FulfillmentError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::NonPositiveQuantity(qty) => {
                FulfillmentError::Validation(format!("quantity must be positive, got {}", qty))
            }
            AllocationError::InsufficientStock {
                product_id,
                available,
                requested,
            } => FulfillmentError::OutOfStock(OutOfStock {
                product_id,
                product_title: String::new(),
                available,
                requested,
            }),
            // Already logged where it was detected.
            AllocationError::Invariant(msg) => FulfillmentError::InvariantViolation(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_becomes_out_of_stock() {
        let err: FulfillmentError = AllocationError::InsufficientStock {
            product_id: ProductId::new(4),
            available: 5,
            requested: 6,
        }
        .into();
        let err = err.with_product_title("Mug");
        match err {
            FulfillmentError::OutOfStock(s) => {
                assert_eq!(s.product_id, ProductId::new(4));
                assert_eq!(s.product_title, "Mug");
                assert_eq!(s.available, 5);
                assert_eq!(s.requested, 6);
            }
            other => panic!("Expected OutOfStock, got {:?}", other),
        }
    }

    #[test]
    fn test_non_positive_quantity_is_validation() {
        let err: FulfillmentError = AllocationError::NonPositiveQuantity(0).into();
        assert!(matches!(err, FulfillmentError::Validation(_)));
        assert!(!err.is_lock_conflict());
    }
}
