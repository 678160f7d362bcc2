use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::domain::{
    LotValuationRow, OrderStatus, ProductId, ProfitReport, StatusFilter, StockRow, TimeMs,
};
use crate::error::AppError;
use super::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotsQuery {
    pub product_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitQuery {
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
    /// An order status, or `ANY`. Defaults to `DONE`.
    pub status: Option<String>,
}

pub async fn get_stock_snapshot(
    State(state): State<AppState>,
) -> Result<Json<Vec<StockRow>>, AppError> {
    Ok(Json(state.analytics.stock_snapshot().await?))
}

pub async fn get_lot_valuation(
    Query(params): Query<LotsQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<LotValuationRow>>, AppError> {
    let product_id = params.product_id.map(ProductId::new);
    Ok(Json(state.analytics.lot_valuation(product_id).await?))
}

pub async fn get_profit(
    Query(params): Query<ProfitQuery>,
    State(state): State<AppState>,
) -> Result<Json<ProfitReport>, AppError> {
    let filter = parse_status_filter(params.status.as_deref())?;
    let from = TimeMs::new(params.from_ms.unwrap_or(0));
    let to = params.to_ms.map(TimeMs::new).unwrap_or_else(TimeMs::now);

    let report = state.analytics.profit_analytics(from, to, filter).await?;
    Ok(Json(report))
}

fn parse_status_filter(raw: Option<&str>) -> Result<StatusFilter, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(StatusFilter::default()),
        Some(s) if s.eq_ignore_ascii_case("any") => Ok(StatusFilter::Any),
        Some(s) => s
            .to_uppercase()
            .parse::<OrderStatus>()
            .map(StatusFilter::Only)
            .map_err(|_| AppError::BadRequest(format!("unknown order status: {}", s))),
    }
}
