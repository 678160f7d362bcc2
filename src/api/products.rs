use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::domain::{Money, Product, ProductId, ProductStatus};
use crate::error::AppError;
use super::AppState;

/// Catalog fields the ledger keeps a copy of.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductBody {
    pub title: String,
    pub price: Money,
    pub cost_price: Option<Money>,
    pub packaging_cost: Option<Money>,
    #[serde(default = "default_status")]
    pub status: ProductStatus,
}

fn default_status() -> ProductStatus {
    ProductStatus::Active
}

pub async fn upsert_product(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(body): Json<ProductBody>,
) -> Result<Json<Product>, AppError> {
    if body.title.trim().is_empty() {
        return Err(AppError::BadRequest("title must not be empty".to_string()));
    }
    let negative = [Some(body.price), body.cost_price, body.packaging_cost]
        .into_iter()
        .flatten()
        .any(|m| m.is_negative());
    if negative {
        return Err(AppError::BadRequest("prices must not be negative".to_string()));
    }

    let product = Product {
        id: ProductId::new(id),
        title: body.title.trim().to_string(),
        price: body.price,
        cost_price: body.cost_price,
        packaging_cost: body.packaging_cost,
        status: body.status,
    };
    state.repo.upsert_product(&product).await?;
    Ok(Json(product))
}
