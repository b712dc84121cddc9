//! Drug dictionary reads and writes against PostgreSQL.

use crate::error::AppError;
use crate::model::{DrugFields, DrugPage, DrugRecord};
use crate::service::{bind_params, RequestValidator};
use crate::sql::{count, delete, group_count, insert, qualified_table, select_by_id, select_matching, select_page, update, QueryBuf};
use crate::store::{catalog_schema, DRUGS_TABLE, DRUG_NAME_COLUMNS};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use std::collections::{BTreeMap, BTreeSet};

/// Aggregate counts over the dictionary.
#[derive(Debug, Serialize)]
pub struct CatalogStats {
    pub total_drugs: i64,
    pub forms: BTreeMap<String, i64>,
    pub categories: BTreeMap<String, i64>,
    pub drug_types: BTreeMap<String, i64>,
    /// Size of the distinct name universe (see `DrugService::all_names`).
    pub unique_variations: usize,
}

pub struct DrugService;

impl DrugService {
    /// Total count plus one page ordered by id. `limit` is not capped.
    pub async fn list(pool: &PgPool, skip: u64, limit: u64) -> Result<DrugPage, AppError> {
        let schema = catalog_schema();
        let total = Self::count(pool, &schema).await?;
        let q = select_page(&DRUGS_TABLE, &schema, limit, skip);
        let results = Self::fetch_all(pool, &q).await?;
        Ok(DrugPage { total, results })
    }

    pub async fn get(pool: &PgPool, id: i64) -> Result<DrugRecord, AppError> {
        let q = select_by_id(&DRUGS_TABLE, &catalog_schema());
        tracing::debug!(sql = %q.sql, id, "query");
        sqlx::query_as::<_, DrugRecord>(&q.sql)
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("drug {}", id)))
    }

    /// Case-insensitive substring match on generic, brand or alternative names; first `limit` by id.
    pub async fn search(pool: &PgPool, query: &str, limit: u64) -> Result<Vec<DrugRecord>, AppError> {
        let q = select_matching(&DRUGS_TABLE, &catalog_schema(), DRUG_NAME_COLUMNS, query, limit);
        Self::fetch_all(pool, &q).await
    }

    /// Every distinct generic name, brand name and comma-split alternative name.
    pub async fn all_names(pool: &PgPool) -> Result<Vec<String>, AppError> {
        let sql = format!(
            "SELECT generic_name, brand_name, alternative_names FROM {}",
            qualified_table(&catalog_schema(), DRUGS_TABLE.name)
        );
        tracing::debug!(sql = %sql, "query");
        let rows: Vec<(Option<String>, Option<String>, Option<String>)> =
            sqlx::query_as(&sql).fetch_all(pool).await?;
        Ok(name_universe(rows.into_iter().map(|(generic_name, brand_name, alternative_names)| {
            DrugFields {
                generic_name,
                brand_name,
                alternative_names,
                ..Default::default()
            }
        }))
        .into_iter()
        .collect())
    }

    pub async fn stats(pool: &PgPool) -> Result<CatalogStats, AppError> {
        let schema = catalog_schema();
        let total_drugs = Self::count(pool, &schema).await?;
        let forms = Self::group_counts(pool, &schema, "form").await?;
        let categories = Self::group_counts(pool, &schema, "category").await?;
        let drug_types = Self::group_counts(pool, &schema, "drug_type").await?;
        let unique_variations = Self::all_names(pool).await?.len();
        Ok(CatalogStats {
            total_drugs,
            forms,
            categories,
            drug_types,
            unique_variations,
        })
    }

    pub async fn create(pool: &PgPool, fields: &DrugFields) -> Result<DrugRecord, AppError> {
        RequestValidator::validate_drug(fields)?;
        let q = insert(&DRUGS_TABLE, &catalog_schema(), &fields.to_columns()?);
        let record = Self::fetch_optional(pool, &q)
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))?;
        tracing::info!(id = record.id, "drug created");
        Ok(record)
    }

    /// Overwrite only the supplied fields and refresh `updated_at`.
    pub async fn update(pool: &PgPool, id: i64, fields: &DrugFields) -> Result<DrugRecord, AppError> {
        RequestValidator::validate_drug(fields)?;
        let q = update(&DRUGS_TABLE, &catalog_schema(), id, &fields.to_columns()?);
        let record = Self::fetch_optional(pool, &q)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("drug {}", id)))?;
        tracing::info!(id, "drug updated");
        Ok(record)
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<(), AppError> {
        let q = delete(&DRUGS_TABLE, &catalog_schema());
        tracing::debug!(sql = %q.sql, id, "query");
        let deleted: Option<(i64,)> = sqlx::query_as(&q.sql).bind(id).fetch_optional(pool).await?;
        if deleted.is_none() {
            return Err(AppError::NotFound(format!("drug {}", id)));
        }
        tracing::info!(id, "drug deleted");
        Ok(())
    }

    /// Insert all items in one transaction. Any failure rolls back the whole batch.
    pub async fn bulk_create(pool: &PgPool, items: &[DrugFields]) -> Result<Vec<DrugRecord>, AppError> {
        let mut tx = pool.begin().await?;
        let out = Self::insert_all(&mut tx, items).await?;
        tx.commit().await?;
        tracing::info!(count = out.len(), "drugs bulk created");
        Ok(out)
    }

    /// Validate every item first, then insert on the given connection (caller owns the transaction).
    pub(crate) async fn insert_all(
        conn: &mut PgConnection,
        items: &[DrugFields],
    ) -> Result<Vec<DrugRecord>, AppError> {
        for (i, item) in items.iter().enumerate() {
            RequestValidator::validate_drug(item)
                .map_err(|e| AppError::Validation(format!("item {}: {}", i, e)))?;
        }
        let schema = catalog_schema();
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let q = insert(&DRUGS_TABLE, &schema, &item.to_columns()?);
            tracing::debug!(sql = %q.sql, params = ?q.params, "query (tx)");
            let record = bind_params(sqlx::query_as::<_, DrugRecord>(&q.sql), &q.params)?
                .fetch_one(&mut *conn)
                .await?;
            out.push(record);
        }
        Ok(out)
    }

    async fn count(pool: &PgPool, schema: &str) -> Result<i64, AppError> {
        let q = count(&DRUGS_TABLE, schema);
        tracing::debug!(sql = %q.sql, "query");
        let (n,): (i64,) = sqlx::query_as(&q.sql).fetch_one(pool).await?;
        Ok(n)
    }

    async fn group_counts(pool: &PgPool, schema: &str, column: &str) -> Result<BTreeMap<String, i64>, AppError> {
        let q = group_count(&DRUGS_TABLE, schema, column);
        tracing::debug!(sql = %q.sql, "query");
        let rows: Vec<(String, i64)> = sqlx::query_as(&q.sql).fetch_all(pool).await?;
        Ok(rows.into_iter().collect())
    }

    async fn fetch_all(pool: &PgPool, q: &QueryBuf) -> Result<Vec<DrugRecord>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows = bind_params(sqlx::query_as::<_, DrugRecord>(&q.sql), &q.params)?
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }

    async fn fetch_optional(pool: &PgPool, q: &QueryBuf) -> Result<Option<DrugRecord>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = bind_params(sqlx::query_as::<_, DrugRecord>(&q.sql), &q.params)?
            .fetch_optional(pool)
            .await?;
        Ok(row)
    }
}

/// Distinct names across records; blanks dropped.
pub fn name_universe<I>(records: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = DrugFields>,
{
    let mut names = BTreeSet::new();
    for fields in records {
        names.extend(fields.names().map(str::to_string));
    }
    names
}
