//! Drug dictionary handlers: queries, CRUD, resolution, import and export.

use crate::error::AppError;
use crate::extractors::AdminSession;
use crate::handlers::{from_body, query_u64, read_upload};
use crate::model::DrugFields;
use crate::response::{success_many, success_one, success_one_ok};
use crate::service::{DrugService, ResolutionService, TransferService};
use crate::state::AppState;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use std::collections::HashMap;

const DEFAULT_LIST_LIMIT: u64 = 100;
const DEFAULT_SEARCH_LIMIT: u64 = 20;

pub async fn stats(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let stats = DrugService::stats(&state.pool).await?;
    Ok(success_one_ok(stats))
}

/// GET /api/drugs/search?q=&limit=
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let q = params.get("q").map(String::as_str).unwrap_or("");
    if q.is_empty() {
        return Err(AppError::Validation("q must be at least 1 character".into()));
    }
    let limit = query_u64(&params, "limit", DEFAULT_SEARCH_LIMIT)?;
    let rows = DrugService::search(&state.pool, q, limit).await?;
    Ok(success_many(rows))
}

pub async fn names(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let names = DrugService::all_names(&state.pool).await?;
    Ok(success_many(names))
}

pub async fn resolve(
    State(state): State<AppState>,
    Path(medicine_name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let resolution = ResolutionService::resolve(&state.pool, &medicine_name).await?;
    Ok(success_one_ok(resolution))
}

/// GET /api/drugs/export/csv: attachment download.
pub async fn export_csv(_admin: AdminSession, State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = TransferService::export_csv(&state.pool).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (header::CONTENT_DISPOSITION, "attachment; filename=drugs.csv"),
        ],
        body,
    ))
}

/// POST /api/drugs/bulk-import: multipart `file` ending in .csv or .json.
pub async fn bulk_import(
    _admin: AdminSession,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let (filename, bytes) = read_upload(&mut multipart).await?;
    let summary = TransferService::bulk_import(&state.pool, &bytes, &filename).await?;
    Ok(success_one(summary))
}

/// POST /api/drugs/import/xlsx: multipart `file` holding a workbook.
pub async fn import_xlsx(
    _admin: AdminSession,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let (_, bytes) = read_upload(&mut multipart).await?;
    let summary = DrugService::import_spreadsheet(&state.pool, &bytes).await?;
    Ok(success_one(summary))
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let skip = query_u64(&params, "skip", 0)?;
    let limit = query_u64(&params, "limit", DEFAULT_LIST_LIMIT)?;
    let page = DrugService::list(&state.pool, skip, limit).await?;
    Ok(success_one_ok(page))
}

pub async fn create(State(state): State<AppState>, Json(body): Json<Value>) -> Result<impl IntoResponse, AppError> {
    let fields: DrugFields = from_body(body)?;
    let record = DrugService::create(&state.pool, &fields).await?;
    Ok(success_one(record))
}

pub async fn read(State(state): State<AppState>, Path(drug_id): Path<i64>) -> Result<impl IntoResponse, AppError> {
    let record = DrugService::get(&state.pool, drug_id).await?;
    Ok(success_one_ok(record))
}

pub async fn update(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(drug_id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let fields: DrugFields = from_body(body)?;
    let record = DrugService::update(&state.pool, drug_id, &fields).await?;
    Ok(success_one_ok(record))
}

pub async fn delete(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(drug_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    DrugService::delete(&state.pool, drug_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
