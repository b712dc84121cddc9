//! Shared application state for all routes.

use crate::auth::SessionStore;
use crate::config::AppConfig;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig) -> Self {
        AppState {
            pool,
            config: Arc::new(config),
            sessions: Arc::new(SessionStore::default()),
        }
    }
}
