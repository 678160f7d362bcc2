use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{InventoryLot, Money, NewPurchase, ProductId, Purchase, WriteOff};
use crate::error::AppError;
use super::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteOffBody {
    pub product_id: ProductId,
    pub qty: i64,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptBody {
    pub product_id: ProductId,
    pub qty: i64,
    pub unit_cost: Money,
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockResponse {
    pub product_id: ProductId,
    pub stock: i64,
}

pub async fn create_write_off(
    State(state): State<AppState>,
    Json(body): Json<WriteOffBody>,
) -> Result<Json<WriteOff>, AppError> {
    let write_off = state
        .write_offs
        .write_off(body.product_id, body.qty, body.reason)
        .await?;
    Ok(Json(write_off))
}

pub async fn get_write_off(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<WriteOff>, AppError> {
    Ok(Json(state.write_offs.get_write_off(id).await?))
}

pub async fn receive_stock(
    State(state): State<AppState>,
    Json(body): Json<ReceiptBody>,
) -> Result<Json<InventoryLot>, AppError> {
    let lot = state
        .receiving
        .receive_stock(body.product_id, body.qty, body.unit_cost, body.note)
        .await?;
    Ok(Json(lot))
}

pub async fn post_purchase(
    State(state): State<AppState>,
    Json(body): Json<NewPurchase>,
) -> Result<Json<Purchase>, AppError> {
    Ok(Json(state.receiving.post_purchase(body).await?))
}

pub async fn get_stock(
    Path(product_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<StockResponse>, AppError> {
    let product_id = ProductId::new(product_id);
    let stock = state.analytics.current_stock(product_id).await?;
    Ok(Json(StockResponse { product_id, stock }))
}
