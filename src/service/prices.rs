//! Local pharmacy price observations: add, look up by name, near-expiry deals, comparison.

use crate::error::AppError;
use crate::model::{parse_expiry_date, today, ExpiryStatus, LocalPrice, LocalPriceView, NewLocalPrice, NEAR_EXPIRY_DAYS};
use crate::service::{RequestValidator, ResolutionService};
use crate::sql::{like_pattern, qualified_table};
use crate::store::{catalog_schema, LOCAL_PRICES_TABLE};
use chrono::Duration;
use serde::Serialize;
use sqlx::PgPool;

#[derive(Debug, Serialize)]
pub struct PriceComparison {
    pub original_name: String,
    pub resolved_generic_name: Option<String>,
    pub local: Vec<LocalPriceView>,
    pub cheapest_pharmacy: Option<String>,
    pub cheapest_price: Option<f64>,
}

pub struct PriceService;

impl PriceService {
    pub async fn add(pool: &PgPool, new: &NewLocalPrice) -> Result<LocalPriceView, AppError> {
        RequestValidator::validate_price(new)?;
        let expiry_date = parse_expiry_date(new.expiry_date.as_deref());
        let sql = format!(
            "INSERT INTO {} (medicine_name, pharmacy_name, price, expiry_date, batch_number) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            qualified_table(&catalog_schema(), LOCAL_PRICES_TABLE.name),
            price_columns()
        );
        tracing::debug!(sql = %sql, medicine = %new.medicine_name, pharmacy = %new.pharmacy_name, "query");
        let price: LocalPrice = sqlx::query_as(&sql)
            .bind(new.medicine_name.trim())
            .bind(new.pharmacy_name.trim())
            .bind(new.price)
            .bind(expiry_date)
            .bind(new.batch_number.as_deref())
            .fetch_one(pool)
            .await?;
        tracing::info!(id = price.id, medicine = %price.medicine_name, "local price added");
        Ok(LocalPriceView::new(price, today()))
    }

    /// Observations whose medicine name contains `name`, newest first.
    pub async fn by_name(pool: &PgPool, name: &str, limit: u64) -> Result<Vec<LocalPriceView>, AppError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE medicine_name ILIKE $1 ESCAPE '\\' \
             ORDER BY updated_at DESC, id DESC LIMIT {}",
            price_columns(),
            qualified_table(&catalog_schema(), LOCAL_PRICES_TABLE.name),
            limit
        );
        let pattern = like_pattern(name);
        tracing::debug!(sql = %sql, pattern = %pattern, "query");
        let rows: Vec<LocalPrice> = sqlx::query_as(&sql).bind(pattern).fetch_all(pool).await?;
        let today = today();
        Ok(rows.into_iter().map(|p| LocalPriceView::new(p, today)).collect())
    }

    /// Observations expiring between today and today + 90 days inclusive, soonest first.
    pub async fn near_expiry(pool: &PgPool, limit: u64) -> Result<Vec<LocalPriceView>, AppError> {
        let today = today();
        let until = today + Duration::days(NEAR_EXPIRY_DAYS);
        let sql = format!(
            "SELECT {} FROM {} WHERE expiry_date >= $1 AND expiry_date <= $2 \
             ORDER BY expiry_date, id LIMIT {}",
            price_columns(),
            qualified_table(&catalog_schema(), LOCAL_PRICES_TABLE.name),
            limit
        );
        tracing::debug!(sql = %sql, from = %today, until = %until, "query");
        let rows: Vec<LocalPrice> = sqlx::query_as(&sql)
            .bind(today)
            .bind(until)
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(|p| LocalPriceView::new(p, today)).collect())
    }

    /// Resolve the name, then report local observations and the cheapest one still in date.
    pub async fn compare(pool: &PgPool, name: &str, limit: u64) -> Result<PriceComparison, AppError> {
        let resolution = ResolutionService::resolve(pool, name).await?;
        let resolved = resolution.best_match.clone();
        let mut local = match resolved.as_deref() {
            Some(generic) => Self::by_name(pool, generic, limit).await?,
            None => Vec::new(),
        };
        if local.is_empty() {
            local = Self::by_name(pool, name, limit).await?;
        }
        let (cheapest_pharmacy, cheapest_price) = match cheapest(&local) {
            Some(v) => (Some(v.price.pharmacy_name.clone()), Some(v.price.price)),
            None => (None, None),
        };
        Ok(PriceComparison {
            original_name: name.to_string(),
            resolved_generic_name: resolved,
            local,
            cheapest_pharmacy,
            cheapest_price,
        })
    }
}

/// Lowest-priced observation that is not expired; the earlier one wins a tie.
pub fn cheapest(views: &[LocalPriceView]) -> Option<&LocalPriceView> {
    views
        .iter()
        .filter(|v| v.expiry.status != Some(ExpiryStatus::Expired))
        .min_by(|a, b| a.price.price.total_cmp(&b.price.price))
}

fn price_columns() -> String {
    LOCAL_PRICES_TABLE.all_column_names().join(", ")
}
