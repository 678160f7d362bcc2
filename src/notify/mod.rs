//! Post-commit notifications about completed inventory operations.
//!
//! Notifications are fire-and-forget: they run on a spawned task after the
//! transaction has committed, and a failure is logged, never returned to the
//! caller of the operation that triggered it.

use crate::domain::{Money, ProductId, TimeMs};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

pub mod mock;
pub mod webhook;

pub use mock::RecordingNotifier;
pub use webhook::WebhookNotifier;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreated {
    pub order_id: Uuid,
    pub order_number: String,
    pub channel: String,
    pub customer_name: String,
    pub total_amount: Money,
    pub currency: String,
    pub item_count: usize,
    pub created_at: TimeMs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteOffRecorded {
    pub write_off_id: Uuid,
    pub product_id: ProductId,
    pub qty: i64,
    pub total_cost: Money,
    pub reason: Option<String>,
}

/// Event payload, serialized with an `event` tag for webhook consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NotifyEvent {
    OrderCreated(OrderCreated),
    WriteOffRecorded(WriteOffRecorded),
}

impl NotifyEvent {
    pub fn name(&self) -> &'static str {
        match self {
            NotifyEvent::OrderCreated(_) => "order_created",
            NotifyEvent::WriteOffRecorded(_) => "write_off_recorded",
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP error {status}")]
    Http { status: u16 },
}

#[async_trait]
pub trait Notifier: Send + Sync + fmt::Debug {
    async fn notify(&self, event: &NotifyEvent) -> Result<(), NotifyError>;
}

/// Notifier used when no webhook is configured.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, event: &NotifyEvent) -> Result<(), NotifyError> {
        debug!(event = event.name(), "No notifier configured, dropping event");
        Ok(())
    }
}

/// Send `event` on a background task.
pub fn dispatch(notifier: Arc<dyn Notifier>, event: NotifyEvent) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(&event).await {
            warn!(event = event.name(), error = %e, "Notification failed");
        }
    })
}
