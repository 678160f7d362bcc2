use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::{CustomerInfo, NewOrder, Order, OrderLine, OrderStatus};
use crate::error::AppError;
use super::AppState;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderBody {
    pub items: Vec<OrderLine>,
    pub customer: CustomerInfo,
    pub channel: Option<String>,
    pub user_id: Option<String>,
    /// Used when the `Idempotency-Key` header is absent.
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
    pub status: OrderStatus,
}

pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateOrderBody>,
) -> Result<Json<Order>, AppError> {
    let header_key = match headers.get(IDEMPOTENCY_KEY_HEADER) {
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| AppError::BadRequest("invalid Idempotency-Key header".to_string()))?
                .to_string(),
        ),
        None => None,
    };

    let request = NewOrder {
        lines: body.items,
        customer: body.customer,
        user_id: body.user_id,
        channel: body.channel,
        idempotency_key: header_key.or(body.idempotency_key),
    };

    let order = state.orders.create_order(request).await?;
    Ok(Json(order))
}

pub async fn get_order(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.orders.get_order(id).await?))
}

pub async fn set_order_status(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<StatusBody>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.orders.set_order_status(id, body.status).await?))
}

pub async fn delete_order(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.orders.soft_delete_order(id).await?))
}
