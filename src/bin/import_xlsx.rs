//! Import brand names and manufacturers from an `.xlsx` workbook into the drug dictionary.

use clap::Parser;
use drug_catalog::store::use_catalog_schema;
use drug_catalog::{ensure_catalog_tables, ensure_database_exists, DrugService};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "import-xlsx")]
#[command(version)]
#[command(about = "Import drugs from an Excel workbook with 'Brand Name' and 'Manufacturer' columns")]
struct Cli {
    /// Path to the .xlsx workbook
    path: PathBuf,

    /// Database to import into
    #[arg(long, env = "DATABASE_URL", default_value = "postgres://localhost/drug_catalog")]
    database_url: String,

    /// Schema holding the catalog tables
    #[arg(long, env = "CATALOG_SCHEMA", default_value = "public")]
    schema: String,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "drug_catalog=debug" } else { "drug_catalog=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    let is_xlsx = cli
        .path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));
    if !is_xlsx {
        return Err(format!("{}: file must be an Excel workbook (.xlsx)", cli.path.display()).into());
    }
    let bytes = std::fs::read(&cli.path)?;

    ensure_database_exists(&cli.database_url).await?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(1)
        .connect(&cli.database_url)
        .await?;
    use_catalog_schema(&cli.schema);
    ensure_catalog_tables(&pool).await?;

    let summary = DrugService::import_spreadsheet(&pool, &bytes).await?;
    println!(
        "Imported {} of {} rows from {} ({} skipped without a brand name)",
        summary.imported,
        summary.total_rows,
        cli.path.display(),
        summary.skipped
    );
    if summary.imported == 0 {
        std::process::exit(1);
    }
    Ok(())
}
