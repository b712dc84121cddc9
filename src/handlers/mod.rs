//! HTTP handlers for drugs, local prices, and admin sessions.

pub mod auth;
pub mod drugs;
pub mod prices;

use crate::error::AppError;
use axum::extract::Multipart;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;

/// Optional non-negative integer query parameter with a default.
fn query_u64(params: &HashMap<String, String>, key: &str, default: u64) -> Result<u64, AppError> {
    match params.get(key).map(|s| s.trim()).filter(|s| !s.is_empty()) {
        None => Ok(default),
        // Bounded by i64 so the value binds as BIGINT.
        Some(s) => s
            .parse::<i64>()
            .ok()
            .filter(|n| *n >= 0)
            .map(|n| n as u64)
            .ok_or_else(|| AppError::BadRequest(format!("{} must be a non-negative integer", key))),
    }
}

/// Decode a JSON body into a typed request; shape errors are validation failures.
fn from_body<T: DeserializeOwned>(body: Value) -> Result<T, AppError> {
    serde_json::from_value(body).map_err(|e| AppError::Validation(e.to_string()))
}

/// First multipart field named `file`: (client filename, bytes).
async fn read_upload(multipart: &mut Multipart) -> Result<(String, Vec<u8>), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("").to_string();
            let data = field.bytes().await.map_err(|e| AppError::BadRequest(e.to_string()))?;
            return Ok((filename, data.to_vec()));
        }
    }
    Err(AppError::BadRequest("missing 'file' field in multipart body".into()))
}
