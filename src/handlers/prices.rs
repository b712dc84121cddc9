//! Local price handlers and price comparison.

use crate::error::AppError;
use crate::handlers::{from_body, query_u64};
use crate::model::NewLocalPrice;
use crate::response::{success_many, success_one, success_one_ok};
use crate::service::PriceService;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use std::collections::HashMap;

const DEFAULT_PRICE_LIMIT: u64 = 10;
const DEFAULT_DEALS_LIMIT: u64 = 50;

/// GET /api/prices?name=&limit=
pub async fn by_name(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let name = params
        .get("name")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("name is required".into()))?;
    let limit = query_u64(&params, "limit", DEFAULT_PRICE_LIMIT)?;
    let rows = PriceService::by_name(&state.pool, name, limit).await?;
    Ok(success_many(rows))
}

pub async fn add(State(state): State<AppState>, Json(body): Json<Value>) -> Result<impl IntoResponse, AppError> {
    let new: NewLocalPrice = from_body(body)?;
    let view = PriceService::add(&state.pool, &new).await?;
    Ok(success_one(view))
}

pub async fn near_expiry(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let limit = query_u64(&params, "limit", DEFAULT_DEALS_LIMIT)?;
    let rows = PriceService::near_expiry(&state.pool, limit).await?;
    Ok(success_many(rows))
}

/// GET /api/compare/:medicine_name?limit=
pub async fn compare(
    State(state): State<AppState>,
    Path(medicine_name): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let limit = query_u64(&params, "limit", DEFAULT_PRICE_LIMIT)?;
    let comparison = PriceService::compare(&state.pool, &medicine_name, limit).await?;
    Ok(success_one_ok(comparison))
}
