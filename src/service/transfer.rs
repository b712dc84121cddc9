//! CSV export and CSV/JSON bulk import of drug records.

use crate::error::AppError;
use crate::model::{DrugFields, DrugRecord};
use crate::service::DrugService;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Export covers the first this-many records by id.
pub const EXPORT_LIMIT: u64 = 10_000;

pub const EXPORT_COLUMNS: [&str; 22] = [
    "id",
    "generic_name",
    "brand_name",
    "alternative_names",
    "strength",
    "form",
    "category",
    "sub_category",
    "drug_type",
    "manufacturer",
    "country_of_origin",
    "schedule_type",
    "primary_use",
    "secondary_use",
    "common_dosage",
    "prescription_required",
    "pregnancy_warning",
    "alcohol_interaction",
    "common_side_effects",
    "avg_mrp",
    "storage_condition",
    "expiry_sensitivity",
];

#[derive(Debug, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub message: String,
}

/// The CSV columns an import understands; anything else in the file is ignored.
#[derive(Debug, Deserialize)]
struct CsvImportRow {
    generic_name: Option<String>,
    brand_name: Option<String>,
    alternative_names: Option<String>,
    strength: Option<String>,
    form: Option<String>,
}

impl From<CsvImportRow> for DrugFields {
    fn from(row: CsvImportRow) -> Self {
        DrugFields {
            generic_name: row.generic_name,
            brand_name: row.brand_name,
            alternative_names: row.alternative_names,
            strength: row.strength,
            form: row.form,
            ..Default::default()
        }
    }
}

pub struct TransferService;

impl TransferService {
    pub async fn export_csv(pool: &PgPool) -> Result<Vec<u8>, AppError> {
        let page = DrugService::list(pool, 0, EXPORT_LIMIT).await?;
        let out = render_csv(&page.results)?;
        tracing::info!(rows = page.results.len(), total = page.total, "drugs exported");
        Ok(out)
    }

    /// Parse by file extension and insert everything in one transaction.
    pub async fn bulk_import(pool: &PgPool, bytes: &[u8], filename: &str) -> Result<ImportSummary, AppError> {
        let items = parse_import(bytes, filename)?;
        let created = DrugService::bulk_create(pool, &items).await?;
        tracing::info!(filename, imported = created.len(), "bulk import finished");
        Ok(ImportSummary {
            imported: created.len(),
            message: format!("Successfully imported {} drugs", created.len()),
        })
    }
}

pub fn render_csv(records: &[DrugRecord]) -> Result<Vec<u8>, AppError> {
    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_record(EXPORT_COLUMNS).map_err(csv_write_error)?;
    for r in records {
        let f = &r.fields;
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        let row = [
            r.id.to_string(),
            text(&f.generic_name),
            text(&f.brand_name),
            text(&f.alternative_names),
            text(&f.strength),
            text(&f.form),
            text(&f.category),
            text(&f.sub_category),
            f.drug_type.map(|t| t.to_string()).unwrap_or_default(),
            text(&f.manufacturer),
            text(&f.country_of_origin),
            text(&f.schedule_type),
            text(&f.primary_use),
            text(&f.secondary_use),
            text(&f.common_dosage),
            f.prescription_required.map(|b| b.to_string()).unwrap_or_default(),
            text(&f.pregnancy_warning),
            text(&f.alcohol_interaction),
            text(&f.common_side_effects),
            f.avg_mrp.map(|p| p.to_string()).unwrap_or_default(),
            text(&f.storage_condition),
            text(&f.expiry_sensitivity),
        ];
        w.write_record(&row).map_err(csv_write_error)?;
    }
    w.into_inner()
        .map_err(|e| AppError::BadRequest(format!("csv export: {}", e)))
}

fn csv_write_error(e: csv::Error) -> AppError {
    AppError::BadRequest(format!("csv export: {}", e))
}

/// Decode an upload into drug field sets. `.csv` and `.json` (any case) are accepted.
pub fn parse_import(bytes: &[u8], filename: &str) -> Result<Vec<DrugFields>, AppError> {
    let lower = filename.to_lowercase();
    if lower.ends_with(".csv") {
        parse_csv(bytes)
    } else if lower.ends_with(".json") {
        serde_json::from_slice::<Vec<DrugFields>>(bytes)
            .map_err(|e| AppError::Validation(format!("invalid JSON import: {}", e)))
    } else {
        Err(AppError::UnsupportedFormat(format!(
            "{}: file must be CSV or JSON",
            filename
        )))
    }
}

fn parse_csv(bytes: &[u8]) -> Result<Vec<DrugFields>, AppError> {
    std::str::from_utf8(bytes).map_err(|e| AppError::Validation(format!("CSV import must be UTF-8: {}", e)))?;
    // Short rows leave their trailing columns unset.
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(bytes);
    let mut out = Vec::new();
    for (i, row) in reader.deserialize::<CsvImportRow>().enumerate() {
        let row = row.map_err(|e| AppError::Validation(format!("CSV row {}: {}", i + 1, e)))?;
        out.push(row.into());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DrugType;
    use chrono::Utc;

    fn record(id: i64, fields: DrugFields) -> DrugRecord {
        DrugRecord {
            id,
            fields,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn paracetamol() -> DrugFields {
        DrugFields {
            generic_name: Some("Paracetamol".into()),
            brand_name: Some("Crocin".into()),
            alternative_names: Some("Calpol, Dolo 650".into()),
            strength: Some("500mg".into()),
            form: Some("Tablet".into()),
            drug_type: Some(DrugType::Otc),
            prescription_required: Some(false),
            avg_mrp: Some(25.5),
            ..Default::default()
        }
    }

    #[test]
    fn export_has_fixed_header_and_blank_absent_values() {
        let out = render_csv(&[record(7, paracetamol())]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), EXPORT_COLUMNS.join(","));
        let row = lines.next().unwrap();
        assert!(row.starts_with("7,Paracetamol,Crocin,\"Calpol, Dolo 650\",500mg,Tablet,,,otc,"));
        assert!(row.contains(",false,"));
        assert!(row.contains(",25.5,"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn exported_csv_reimports_recognized_columns() {
        let original = paracetamol();
        let bare = DrugFields {
            generic_name: Some("Ibuprofen".into()),
            ..Default::default()
        };
        let out = render_csv(&[record(1, original.clone()), record(2, bare.clone())]).unwrap();
        let back = parse_import(&out, "drugs.csv").unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].generic_name, original.generic_name);
        assert_eq!(back[0].brand_name, original.brand_name);
        assert_eq!(back[0].alternative_names, original.alternative_names);
        assert_eq!(back[0].strength, original.strength);
        assert_eq!(back[0].form, original.form);
        assert_eq!(back[0].drug_type, None);
        assert_eq!(back[1], bare);
    }

    #[test]
    fn csv_short_rows_leave_trailing_columns_unset() {
        let data = b"generic_name,brand_name,form\nParacetamol,Crocin\nIbuprofen,Brufen,Tablet\n";
        let rows = parse_import(data, "drugs.csv").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].brand_name.as_deref(), Some("Crocin"));
        assert_eq!(rows[0].form, None);
        assert_eq!(rows[1].form.as_deref(), Some("Tablet"));
    }

    #[test]
    fn csv_ignores_unknown_columns_and_blank_cells() {
        let data = b"brand_name,colour,generic_name\nCrocin,red,\n";
        let rows = parse_import(data, "IMPORT.CSV").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].brand_name.as_deref(), Some("Crocin"));
        assert_eq!(rows[0].generic_name, None);
    }

    #[test]
    fn json_maps_keys_onto_fields() {
        let data = br#"[{"generic_name": "Amoxicillin", "drug_type": "ethical", "fda_approval": true}]"#;
        let rows = parse_import(data, "drugs.json").unwrap();
        assert_eq!(rows[0].drug_type, Some(DrugType::Ethical));
        assert_eq!(rows[0].fda_approval, Some(true));

        let unknown = br#"[{"generic_name": "Amoxicillin", "colour": "red"}]"#;
        assert!(matches!(parse_import(unknown, "drugs.json"), Err(AppError::Validation(_))));
    }

    #[test]
    fn other_extensions_are_unsupported() {
        assert!(matches!(parse_import(b"x", "drugs.txt"), Err(AppError::UnsupportedFormat(_))));
        assert!(matches!(parse_import(b"x", "csv"), Err(AppError::UnsupportedFormat(_))));
    }

    #[test]
    fn invalid_utf8_csv_is_rejected() {
        assert!(matches!(parse_import(&[0xff, 0xfe, b'\n'], "a.csv"), Err(AppError::Validation(_))));
    }
}
