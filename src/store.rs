//! Catalog table descriptors and DDL. Both tables live in the schema installed by
//! [`use_catalog_schema`] (default `public`).

use crate::error::{AppError, ConfigError};
use crate::sql::{qualified_table, ColumnDef, TableDef};
use sqlx::postgres::PgConnectOptions;
use sqlx::ConnectOptions;
use sqlx::PgPool;
use std::str::FromStr;
use std::sync::OnceLock;

const DEFAULT_SCHEMA: &str = "public";

static CATALOG_SCHEMA: OnceLock<String> = OnceLock::new();

/// Install the catalog schema for this process, normally `AppConfig::catalog_schema`.
/// Only the first call takes effect; later calls with a different name are logged and ignored.
pub fn use_catalog_schema(schema: &str) {
    let installed = CATALOG_SCHEMA.get_or_init(|| schema.to_string());
    if installed != schema {
        tracing::warn!(installed = %installed, requested = %schema, "catalog schema already set");
    }
}

/// Schema name for catalog tables.
pub fn catalog_schema() -> String {
    CATALOG_SCHEMA
        .get()
        .map(String::as_str)
        .unwrap_or(DEFAULT_SCHEMA)
        .to_string()
}

pub const DRUG_COLUMNS: &[ColumnDef] = &[
    ColumnDef::text("generic_name"),
    ColumnDef::text("brand_name"),
    ColumnDef::text("alternative_names"),
    ColumnDef::varchar("atc_code", 10),
    ColumnDef::varchar("unii_code", 20),
    ColumnDef::text("strength"),
    ColumnDef::text("form"),
    ColumnDef::varchar("category", 150),
    ColumnDef::varchar("sub_category", 150),
    ColumnDef::text("drug_type"),
    ColumnDef::varchar("manufacturer", 255),
    ColumnDef::varchar("country_of_origin", 100),
    ColumnDef::varchar("schedule_type", 50),
    ColumnDef::text("primary_use"),
    ColumnDef::text("secondary_use"),
    ColumnDef::varchar("common_dosage", 255),
    ColumnDef::typed("prescription_required", "boolean"),
    ColumnDef::varchar("route_of_administration", 100),
    ColumnDef::varchar("pregnancy_warning", 50),
    ColumnDef::varchar("alcohol_interaction", 50),
    ColumnDef::text("common_side_effects"),
    ColumnDef::text("contraindications"),
    ColumnDef::typed("avg_mrp", "double precision"),
    ColumnDef::varchar("storage_condition", 255),
    ColumnDef::varchar("expiry_sensitivity", 50),
    ColumnDef::typed("fda_approval", "boolean"),
    ColumnDef::typed("who_essential_medicine", "boolean"),
    ColumnDef::varchar("pack_size", 50),
    ColumnDef::varchar("availability_status", 20),
    ColumnDef::typed("last_updated_online", "timestamptz"),
    ColumnDef::typed("min_price", "double precision"),
    ColumnDef::typed("max_price", "double precision"),
    ColumnDef::varchar("price_currency", 3),
    ColumnDef::text("image_url"),
    ColumnDef::text("description"),
];

pub const DRUGS_TABLE: TableDef = TableDef {
    name: "drug_dictionary",
    pk: "id",
    columns: DRUG_COLUMNS,
    timestamps: &["created_at", "updated_at"],
};

pub const LOCAL_PRICES_TABLE: TableDef = TableDef {
    name: "local_prices",
    pk: "id",
    columns: &[
        ColumnDef::text("medicine_name").required(),
        ColumnDef::text("pharmacy_name").required(),
        ColumnDef::typed("price", "double precision").required(),
        ColumnDef::typed("expiry_date", "date"),
        ColumnDef::text("batch_number"),
    ],
    timestamps: &["updated_at"],
};

const DRUG_TYPE_CHECK: &str = "drug_dictionary_drug_type_check";

/// Columns searched by name lookups and resolution.
pub const DRUG_NAME_COLUMNS: &[&str] = &["generic_name", "brand_name", "alternative_names"];

/// Create the schema and both tables if missing, then add any column an older table lacks.
pub async fn ensure_catalog_tables(pool: &PgPool) -> Result<(), AppError> {
    let schema = catalog_schema();
    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(&schema)))
        .execute(pool)
        .await?;

    for table in [&DRUGS_TABLE, &LOCAL_PRICES_TABLE] {
        let q_table = qualified_table(&schema, table.name);
        sqlx::query(&create_table_ddl(table, &q_table)).execute(pool).await?;
        for c in table.columns {
            let alter = format!(
                "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {} {}",
                q_table,
                quote_ident(c.name),
                c.ddl_type()
            );
            sqlx::query(&alter).execute(pool).await?;
        }
    }

    let q_drugs = qualified_table(&schema, DRUGS_TABLE.name);
    let drug_type_check = format!(
        "ALTER TABLE {} ADD CONSTRAINT {} CHECK (drug_type IN ('ethical', 'generic', 'otc'))",
        q_drugs,
        quote_ident(DRUG_TYPE_CHECK)
    );
    let has_check: (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM pg_constraint c \
         JOIN pg_class t ON c.conrelid = t.oid \
         JOIN pg_namespace n ON t.relnamespace = n.oid \
         WHERE c.conname = $1 AND t.relname = $2 AND n.nspname = $3)",
    )
    .bind(DRUG_TYPE_CHECK)
    .bind(DRUGS_TABLE.name)
    .bind(&schema)
    .fetch_one(pool)
    .await?;
    if !has_check.0 {
        sqlx::query(&drug_type_check).execute(pool).await?;
    }
    for col in ["generic_name", "brand_name"] {
        let idx = format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
            quote_ident(&format!("ix_drug_dictionary_{}", col)),
            q_drugs,
            quote_ident(col)
        );
        sqlx::query(&idx).execute(pool).await?;
    }
    tracing::info!(schema = %schema, "catalog tables ready");
    Ok(())
}

fn create_table_ddl(table: &TableDef, q_table: &str) -> String {
    let mut defs = vec![format!("{} BIGSERIAL PRIMARY KEY", quote_ident(table.pk))];
    for c in table.columns {
        let mut def = format!("{} {}", quote_ident(c.name), c.ddl_type());
        if c.not_null {
            def.push_str(" NOT NULL");
        }
        defs.push(def);
    }
    for ts in table.timestamps {
        defs.push(format!("{} TIMESTAMPTZ NOT NULL DEFAULT NOW()", quote_ident(ts)));
    }
    format!("CREATE TABLE IF NOT EXISTS {} (\n  {}\n)", q_table, defs.join(",\n  "))
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database on the same server to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin, db_name) = admin_connect_options(database_url)?;
    let Some(db_name) = db_name.filter(|n| !n.is_empty() && n != "postgres") else {
        return Ok(());
    };
    let mut conn: sqlx::PgConnection = admin.connect().await.map_err(AppError::Db)?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await
        .map_err(AppError::Db)?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&db_name)))
            .execute(&mut conn)
            .await
            .map_err(AppError::Db)?;
    }
    Ok(())
}

/// Options for the `postgres` maintenance database on the server named by `url`, plus the
/// database `url` itself names.
fn admin_connect_options(url: &str) -> Result<(PgConnectOptions, Option<String>), AppError> {
    let opts = PgConnectOptions::from_str(url).map_err(|e| ConfigError::Invalid {
        key: "DATABASE_URL",
        message: e.to_string(),
    })?;
    let db_name = opts.get_database().map(|n| n.trim().to_string());
    Ok((opts.database("postgres"), db_name))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
