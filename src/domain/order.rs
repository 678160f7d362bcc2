//! Orders, order lines and order numbering.

use crate::domain::{Money, OrderItemId, ProductId, TimeMs};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    Confirmed,
    InProgress,
    Done,
    Canceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::InProgress => "IN_PROGRESS",
            OrderStatus::Done => "DONE",
            OrderStatus::Canceled => "CANCELED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(OrderStatus::New),
            "CONFIRMED" => Ok(OrderStatus::Confirmed),
            "IN_PROGRESS" => Ok(OrderStatus::InProgress),
            "DONE" => Ok(OrderStatus::Done),
            "CANCELED" => Ok(OrderStatus::Canceled),
            other => Err(format!("unknown order status: {}", other)),
        }
    }
}

/// Buyer contact details captured on the order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// One requested line of a new order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    pub qty: i64,
}

/// Everything `create_order` needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub lines: Vec<OrderLine>,
    pub customer: CustomerInfo,
    pub user_id: Option<String>,
    /// Falls back to the configured default channel when None.
    pub channel: Option<String>,
    pub idempotency_key: Option<String>,
}

impl NewOrder {
    pub fn new(lines: Vec<OrderLine>, customer: CustomerInfo) -> Self {
        Self {
            lines,
            customer,
            user_id: None,
            channel: None,
            idempotency_key: None,
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Fingerprint of the requested lines, stored next to the idempotency key
    /// so a replay carrying different lines can be detected.
    ///
    /// Lines are sorted first so the hash does not depend on line order.
    pub fn request_hash(&self) -> String {
        use sha2::{Digest, Sha256};

        let mut lines: Vec<(i64, i64)> = self
            .lines
            .iter()
            .map(|l| (l.product_id.as_i64(), l.qty))
            .collect();
        lines.sort_unstable();

        let mut hasher = Sha256::new();
        for (product_id, qty) in lines {
            hasher.update(product_id.to_be_bytes());
            hasher.update(qty.to_be_bytes());
        }
        hex::encode(&hasher.finalize()[..16])
    }
}

/// Human-readable order number: `№00042/web`.
pub fn format_order_number(seq: i64, channel: &str) -> String {
    format!("№{:05}/{}", seq, channel)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: Uuid,
    pub product_id: ProductId,
    pub title_at_time: String,
    pub price_at_time: Money,
    pub cost_price_at_time: Option<Money>,
    pub packaging_cost_at_time: Money,
    pub qty: i64,
    /// None until allocation completes.
    pub cogs_total: Option<Money>,
    pub profit_total: Option<Money>,
}

impl OrderItem {
    pub fn line_revenue(&self) -> Money {
        self.price_at_time.times(self.qty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub status: OrderStatus,
    pub channel: String,
    pub seq: i64,
    pub order_number: String,
    pub idempotency_key: Option<String>,
    pub total_amount: Money,
    pub currency: String,
    pub customer: CustomerInfo,
    pub deleted_at: Option<TimeMs>,
    pub created_at: TimeMs,
    pub items: Vec<OrderItem>,
}

impl Order {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product: i64, qty: i64) -> OrderLine {
        OrderLine {
            product_id: ProductId::new(product),
            qty,
        }
    }

    #[test]
    fn test_format_order_number() {
        assert_eq!(format_order_number(42, "web"), "№00042/web");
        assert_eq!(format_order_number(123456, "tg"), "№123456/tg");
    }

    #[test]
    fn test_request_hash_ignores_line_order() {
        let a = NewOrder::new(vec![line(1, 2), line(2, 3)], CustomerInfo::default());
        let b = NewOrder::new(vec![line(2, 3), line(1, 2)], CustomerInfo::default());
        let c = NewOrder::new(vec![line(1, 2), line(2, 4)], CustomerInfo::default());
        assert_eq!(a.request_hash(), b.request_hash());
        assert_ne!(a.request_hash(), c.request_hash());
        assert_eq!(a.request_hash().len(), 32);
    }

    #[test]
    fn test_order_status_strings() {
        assert_eq!("IN_PROGRESS".parse::<OrderStatus>().unwrap(), OrderStatus::InProgress);
        assert_eq!(
            serde_json::to_string(&OrderStatus::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
        assert!("SHIPPED".parse::<OrderStatus>().is_err());
    }
}
