use crate::orchestration::{FulfillmentError, OutOfStock};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Out of stock")]
    OutOfStock(OutOfStock),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<FulfillmentError> for AppError {
    fn from(err: FulfillmentError) -> Self {
        match err {
            FulfillmentError::NotFound(msg) => AppError::NotFound(msg),
            FulfillmentError::Validation(msg) => AppError::BadRequest(msg),
            FulfillmentError::OutOfStock(shortfall) => AppError::OutOfStock(shortfall),
            FulfillmentError::InvariantViolation(msg) => AppError::Internal(msg),
            FulfillmentError::Storage(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Internal(msg) => {
                error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg }))
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::OutOfStock(shortfall) => (
                StatusCode::CONFLICT,
                json!({
                    "error": "out of stock",
                    "productId": shortfall.product_id,
                    "productTitle": shortfall.product_title,
                    "available": shortfall.available,
                    "requested": shortfall.requested,
                }),
            ),
        };

        (status, Json(body)).into_response()
    }
}
