//! Domain types for the inventory ledger and order fulfillment.
//!
//! This module provides:
//! - Primitives: TimeMs, ProductId, LotId, OrderItemId, Money
//! - Ledger types: InventoryMovement, InventoryLot, LotAllocation, ConsumerRef
//! - Orders, write-offs and purchases
//! - Report shapes for the analytics read side

pub mod analytics;
pub mod inventory;
pub mod order;
pub mod primitives;
pub mod product;
pub mod purchase;
pub mod write_off;

pub use analytics::{LotValuationRow, ProductProfit, ProfitReport, StatusFilter, StockRow};
pub use inventory::{
    ConsumerRef, InventoryLot, InventoryMovement, LotAllocation, MovementKind, SourceKind,
};
pub use order::{
    format_order_number, CustomerInfo, NewOrder, Order, OrderItem, OrderLine, OrderStatus,
};
pub use primitives::{LotId, Money, OrderItemId, ProductId, TimeMs};
pub use product::{Product, ProductStatus};
pub use purchase::{NewPurchase, Purchase, PurchaseLine};
pub use write_off::WriteOff;
