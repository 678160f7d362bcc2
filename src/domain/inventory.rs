//! Ledger movements, lots and lot allocations.

use crate::domain::{LotId, Money, OrderItemId, ProductId, TimeMs};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Direction of a ledger movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MovementKind {
    In,
    Out,
    Adjust,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::In => "IN",
            MovementKind::Out => "OUT",
            MovementKind::Adjust => "ADJUST",
        }
    }
}

impl FromStr for MovementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN" => Ok(MovementKind::In),
            "OUT" => Ok(MovementKind::Out),
            "ADJUST" => Ok(MovementKind::Adjust),
            other => Err(format!("unknown movement kind: {}", other)),
        }
    }
}

/// What caused a ledger movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceKind {
    Order,
    Purchase,
    Manual,
    WriteOff,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Order => "ORDER",
            SourceKind::Purchase => "PURCHASE",
            SourceKind::Manual => "MANUAL",
            SourceKind::WriteOff => "WRITE_OFF",
        }
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ORDER" => Ok(SourceKind::Order),
            "PURCHASE" => Ok(SourceKind::Purchase),
            "MANUAL" => Ok(SourceKind::Manual),
            "WRITE_OFF" => Ok(SourceKind::WriteOff),
            other => Err(format!("unknown source kind: {}", other)),
        }
    }
}

/// Immutable ledger entry. The sum of `quantity` over a product is its stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryMovement {
    pub id: i64,
    pub product_id: ProductId,
    /// Positive = received, negative = consumed. Never zero.
    pub quantity: i64,
    pub kind: MovementKind,
    pub source_kind: SourceKind,
    pub source_id: Option<String>,
    pub note: Option<String>,
    pub created_at: TimeMs,
}

/// A batch of stock received together at one unit cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryLot {
    pub id: LotId,
    pub product_id: ProductId,
    pub purchase_id: Option<Uuid>,
    /// Fixed at receipt, never revised.
    pub unit_cost: Money,
    pub qty_received: i64,
    pub qty_remaining: i64,
    /// FIFO ordering key.
    pub received_at: TimeMs,
}

impl InventoryLot {
    pub fn is_exhausted(&self) -> bool {
        self.qty_remaining == 0
    }
}

/// The consumer a lot allocation is charged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "camelCase")]
pub enum ConsumerRef {
    OrderItem(OrderItemId),
    WriteOff(Uuid),
}

impl std::fmt::Display for ConsumerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsumerRef::OrderItem(id) => write!(f, "order_item:{}", id),
            ConsumerRef::WriteOff(id) => write!(f, "write_off:{}", id),
        }
    }
}

/// Audit record of how much of one lot one consumption event took.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotAllocation {
    pub lot_id: LotId,
    pub consumer: ConsumerRef,
    pub qty: i64,
    /// Unit cost of the lot captured at allocation time.
    pub unit_cost: Money,
}

impl LotAllocation {
    pub fn cost(&self) -> Money {
        self.unit_cost.times(self.qty)
    }
}
