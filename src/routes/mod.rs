//! Router assembly.

mod catalog;
mod common;

pub use catalog::{auth_routes, catalog_routes};
pub use common::common_routes;

use crate::state::AppState;
use axum::{extract::DefaultBodyLimit, Router};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Full application: common, catalog and auth routes with the upload cap and request tracing.
pub fn app(state: AppState) -> Router {
    let max_upload = state.config.max_upload_bytes;
    Router::new()
        .merge(common_routes())
        .merge(catalog_routes())
        .merge(auth_routes())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
