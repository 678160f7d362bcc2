pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod notify;
pub mod orchestration;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    ConsumerRef, InventoryLot, LotAllocation, Money, NewOrder, Order, OrderLine, OrderStatus,
    Product, ProductId, ProductStatus, TimeMs, WriteOff,
};
pub use error::AppError;
pub use notify::{NoopNotifier, Notifier, NotifyEvent, RecordingNotifier, WebhookNotifier};
pub use orchestration::{
    AnalyticsService, FulfillmentError, OrderService, OutOfStock, ReceivingService,
    WriteOffService,
};
