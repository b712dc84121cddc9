//! Drug and price routes under /api.

use crate::handlers::{auth, drugs, prices};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

/// Admin-only handlers take an `AdminSession` and answer 401 without a live bearer token.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/api/drugs/stats", get(drugs::stats))
        .route("/api/drugs/search", get(drugs::search))
        .route("/api/drugs/names", get(drugs::names))
        .route("/api/drugs/resolve/:medicine_name", get(drugs::resolve))
        .route("/api/drugs/export/csv", get(drugs::export_csv))
        .route("/api/drugs/bulk-import", post(drugs::bulk_import))
        .route("/api/drugs/import/xlsx", post(drugs::import_xlsx))
        .route("/api/drugs", get(drugs::list).post(drugs::create))
        .route(
            "/api/drugs/:drug_id",
            get(drugs::read).put(drugs::update).delete(drugs::delete),
        )
        .route("/api/prices", get(prices::by_name).post(prices::add))
        .route("/api/prices/near-expiry", get(prices::near_expiry))
        .route("/api/compare/:medicine_name", get(prices::compare))
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
}
