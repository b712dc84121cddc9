//! Drug catalog: drug dictionary, local pharmacy prices, name resolution, and bulk import/export over PostgreSQL.

pub mod auth;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod model;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use config::AppConfig;
pub use error::{AppError, ConfigError};
pub use routes::app;
pub use service::{DrugService, PriceService, ResolutionService, TransferService};
pub use state::AppState;
pub use store::{ensure_catalog_tables, ensure_database_exists};
