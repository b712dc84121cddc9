//! Drug dictionary record and its writable field set.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::postgres::{PgTypeInfo, PgValueRef, Postgres};
use sqlx::{Decode, Type};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrugType {
    Ethical,
    Generic,
    Otc,
}

impl DrugType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DrugType::Ethical => "ethical",
            DrugType::Generic => "generic",
            DrugType::Otc => "otc",
        }
    }
}

impl std::fmt::Display for DrugType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DrugType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ethical" => Ok(DrugType::Ethical),
            "generic" => Ok(DrugType::Generic),
            "otc" => Ok(DrugType::Otc),
            _ => Err(AppError::Validation(format!(
                "invalid drug_type: {} (expected ethical, generic or otc)",
                s
            ))),
        }
    }
}

// Stored as TEXT guarded by a CHECK constraint.
impl Type<Postgres> for DrugType {
    fn type_info() -> PgTypeInfo {
        <str as Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <str as Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for DrugType {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<Postgres>>::decode(value)?;
        Ok(s.parse()?)
    }
}

/// Every writable column of a drug record. Absent (None) means "not supplied":
/// on create the column stays NULL, on update it is left untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(deny_unknown_fields)]
pub struct DrugFields {
    // Identity
    pub generic_name: Option<String>,
    pub brand_name: Option<String>,
    /// Comma-separated.
    pub alternative_names: Option<String>,
    pub atc_code: Option<String>,
    pub unii_code: Option<String>,

    pub strength: Option<String>,
    pub form: Option<String>,

    // Classification
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub drug_type: Option<DrugType>,

    pub manufacturer: Option<String>,
    pub country_of_origin: Option<String>,
    pub schedule_type: Option<String>,

    // Medical
    pub primary_use: Option<String>,
    pub secondary_use: Option<String>,
    pub common_dosage: Option<String>,
    pub prescription_required: Option<bool>,
    pub route_of_administration: Option<String>,
    pub pregnancy_warning: Option<String>,
    pub alcohol_interaction: Option<String>,
    pub common_side_effects: Option<String>,
    pub contraindications: Option<String>,

    // Commercial
    pub avg_mrp: Option<f64>,
    pub storage_condition: Option<String>,
    pub expiry_sensitivity: Option<String>,
    pub fda_approval: Option<bool>,
    pub who_essential_medicine: Option<bool>,
    pub pack_size: Option<String>,
    pub availability_status: Option<String>,
    pub last_updated_online: Option<DateTime<Utc>>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub price_currency: Option<String>,
    pub image_url: Option<String>,
    pub description: Option<String>,
}

impl DrugFields {
    /// Supplied (non-null) fields as column name -> JSON value, ready for the SQL builder.
    pub fn to_columns(&self) -> Result<HashMap<String, Value>, AppError> {
        let value = serde_json::to_value(self)
            .map_err(|e| AppError::Validation(format!("drug fields: {}", e)))?;
        match value {
            Value::Object(m) => Ok(m.into_iter().filter(|(_, v)| !v.is_null()).collect()),
            _ => Err(AppError::Validation("drug fields must serialize to an object".into())),
        }
    }

    /// Generic name if present, else brand name.
    pub fn resolved_name(&self) -> Option<&str> {
        self.generic_name.as_deref().or(self.brand_name.as_deref())
    }

    /// Generic name, brand name and each trimmed alternative name, skipping blanks.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.generic_name
            .as_deref()
            .into_iter()
            .chain(self.brand_name.as_deref())
            .chain(
                self.alternative_names
                    .as_deref()
                    .into_iter()
                    .flat_map(|alts| alts.split(',')),
            )
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct DrugRecord {
    pub id: i64,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub fields: DrugFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One page of `list`: total count of all records plus the requested slice.
#[derive(Debug, Serialize)]
pub struct DrugPage {
    pub total: i64,
    pub results: Vec<DrugRecord>,
}
