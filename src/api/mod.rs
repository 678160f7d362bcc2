pub mod analytics;
pub mod health;
pub mod orders;
pub mod products;
pub mod stock;

use crate::config::Config;
use crate::db::Repository;
use crate::notify::Notifier;
use crate::orchestration::{AnalyticsService, OrderService, ReceivingService, WriteOffService};
use axum::{
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub orders: OrderService,
    pub write_offs: WriteOffService,
    pub receiving: ReceivingService,
    pub analytics: AnalyticsService,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, config: Config, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            orders: OrderService::new(repo.clone(), notifier.clone(), &config),
            write_offs: WriteOffService::new(repo.clone(), notifier, &config),
            receiving: ReceivingService::new(repo.clone(), &config),
            analytics: AnalyticsService::new(repo.clone()),
            repo,
            config,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/products/:id", put(products::upsert_product))
        .route("/v1/orders", post(orders::create_order))
        .route(
            "/v1/orders/:id",
            get(orders::get_order).delete(orders::delete_order),
        )
        .route("/v1/orders/:id/status", patch(orders::set_order_status))
        .route("/v1/write-offs", post(stock::create_write_off))
        .route("/v1/write-offs/:id", get(stock::get_write_off))
        .route("/v1/stock/receipts", post(stock::receive_stock))
        .route("/v1/stock/:product_id", get(stock::get_stock))
        .route("/v1/purchases", post(stock::post_purchase))
        .route("/v1/analytics/stock", get(analytics::get_stock_snapshot))
        .route("/v1/analytics/lots", get(analytics::get_lot_valuation))
        .route("/v1/analytics/profit", get(analytics::get_profit))
        .layer(cors)
        .with_state(state)
}
