//! Drug catalog HTTP server.
//!
//! Configuration comes from the environment (or `.env`): DATABASE_URL, CATALOG_SCHEMA,
//! BIND_ADDR, DB_MAX_CONNECTIONS, ADMIN_USERNAME, ADMIN_PASSWORD, MAX_UPLOAD_BYTES.

use drug_catalog::store::use_catalog_schema;
use drug_catalog::{app, ensure_catalog_tables, ensure_database_exists, AppConfig, AppState};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("drug_catalog=info,tower_http=info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    ensure_database_exists(&config.database_url).await?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    use_catalog_schema(&config.catalog_schema);
    ensure_catalog_tables(&pool).await?;

    if config.admin_password.is_none() {
        tracing::warn!("ADMIN_PASSWORD is not set; admin routes are unreachable");
    }
    let listener = TcpListener::bind(&config.bind_addr).await?;
    let addr = listener.local_addr()?;
    let router = app(AppState::new(pool, config));
    tracing::info!("drug catalog listening on http://{}", addr);
    axum::serve(listener, router).await?;
    Ok(())
}
