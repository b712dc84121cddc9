//! Local pharmacy price observations and their derived expiry status.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Window, in days, for near-expiry deals.
pub const NEAR_EXPIRY_DAYS: i64 = 90;
const CLEARANCE_DAYS: i64 = 60;

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct LocalPrice {
    pub id: i64,
    pub medicine_name: String,
    pub pharmacy_name: String,
    pub price: f64,
    pub expiry_date: Option<NaiveDate>,
    pub batch_number: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for adding an observation. `expiry_date` is `YYYY-MM-DD`.
#[derive(Clone, Debug, Deserialize)]
pub struct NewLocalPrice {
    pub medicine_name: String,
    pub pharmacy_name: String,
    pub price: f64,
    #[serde(default)]
    pub expiry_date: Option<String>,
    #[serde(default)]
    pub batch_number: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryStatus {
    Expired,
    Clearance,
    NearExpiry,
    Valid,
}

impl ExpiryStatus {
    pub fn badge(&self) -> Option<&'static str> {
        match self {
            ExpiryStatus::Expired => Some("Expired"),
            ExpiryStatus::Clearance => Some("Clearance Stock"),
            ExpiryStatus::NearExpiry => Some("Near-Expiry Discount"),
            ExpiryStatus::Valid => None,
        }
    }
}

/// Status, badge and days remaining; all null when the observation has no expiry date.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExpiryInfo {
    #[serde(rename = "expiry_status")]
    pub status: Option<ExpiryStatus>,
    #[serde(rename = "expiry_badge")]
    pub badge: Option<&'static str>,
    pub days_remaining: Option<i64>,
}

pub fn expiry_info(expiry_date: Option<NaiveDate>, today: NaiveDate) -> ExpiryInfo {
    let Some(date) = expiry_date else {
        return ExpiryInfo::default();
    };
    let days = (date - today).num_days();
    let status = if days < 0 {
        ExpiryStatus::Expired
    } else if days < CLEARANCE_DAYS {
        ExpiryStatus::Clearance
    } else if days < NEAR_EXPIRY_DAYS {
        ExpiryStatus::NearExpiry
    } else {
        ExpiryStatus::Valid
    };
    ExpiryInfo {
        status: Some(status),
        badge: status.badge(),
        days_remaining: Some(days),
    }
}

/// Lenient `YYYY-MM-DD` parse: anything unparseable is treated as no date.
pub fn parse_expiry_date(raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(d) => Some(d),
        Err(e) => {
            tracing::warn!(expiry_date = %raw, error = %e, "ignoring unparseable expiry date");
            None
        }
    }
}

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// An observation as returned to clients: stored fields plus computed expiry status.
#[derive(Clone, Debug, Serialize)]
pub struct LocalPriceView {
    #[serde(flatten)]
    pub price: LocalPrice,
    #[serde(flatten)]
    pub expiry: ExpiryInfo,
}

impl LocalPriceView {
    pub fn new(price: LocalPrice, today: NaiveDate) -> Self {
        let expiry = expiry_info(price.expiry_date, today);
        LocalPriceView { price, expiry }
    }
}
