use crate::domain::{LotAllocation, Money, ProductId, TimeMs};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stock removed for loss or damage, costed through FIFO allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteOff {
    pub id: Uuid,
    pub product_id: ProductId,
    pub qty: i64,
    pub total_cost: Money,
    pub reason: Option<String>,
    pub created_at: TimeMs,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allocations: Vec<LotAllocation>,
}
