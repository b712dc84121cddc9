//! Catalog services: drug CRUD and queries, local prices, name resolution, import and export.

mod drugs;
mod prices;
mod resolve;
mod spreadsheet;
mod transfer;
mod validation;

pub use drugs::{name_universe, CatalogStats, DrugService};
pub use prices::{PriceComparison, PriceService};
pub use resolve::{rank_matches, DrugMatch, Resolution, ResolutionService};
pub use spreadsheet::{parse_spreadsheet, SpreadsheetImport, SpreadsheetRows};
pub use transfer::{parse_import, render_csv, ImportSummary, TransferService, EXPORT_COLUMNS};
pub use validation::{drug_rules, RequestValidator, ValidationRule};

use crate::error::AppError;
use crate::sql::PgBindValue;
use serde_json::Value;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::QueryAs;

/// Bind builder params in order. Each value's cast comes from the SQL text.
pub(crate) fn bind_params<'q, O>(
    mut query: QueryAs<'q, Postgres, O, PgArguments>,
    params: &[Value],
) -> Result<QueryAs<'q, Postgres, O, PgArguments>, AppError> {
    for p in params {
        query = query.bind(PgBindValue::from_json(p)?);
    }
    Ok(query)
}
