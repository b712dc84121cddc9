//! Request validation from per-column rules.

use crate::error::AppError;
use crate::model::{DrugFields, NewLocalPrice};
use crate::store::DRUG_COLUMNS;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Clone, Debug, Default)]
pub struct ValidationRule {
    pub max_length: Option<u32>,
    pub pattern: Option<&'static str>,
    pub minimum: Option<f64>,
}

/// Rules for drug columns: length limits from the table descriptor plus value constraints.
pub fn drug_rules() -> HashMap<&'static str, ValidationRule> {
    let mut rules: HashMap<&'static str, ValidationRule> = DRUG_COLUMNS
        .iter()
        .filter_map(|c| {
            c.max_length.map(|n| {
                (
                    c.name,
                    ValidationRule {
                        max_length: Some(n),
                        ..Default::default()
                    },
                )
            })
        })
        .collect();
    rules.entry("price_currency").or_default().pattern = Some("^[A-Z]{3}$");
    for col in ["avg_mrp", "min_price", "max_price"] {
        rules.entry(col).or_default().minimum = Some(0.0);
    }
    rules
}

pub struct RequestValidator;

impl RequestValidator {
    /// Validate only the fields present in body. Absent fields are never required.
    pub fn validate_partial(
        body: &HashMap<String, Value>,
        rules: &HashMap<&'static str, ValidationRule>,
    ) -> Result<(), AppError> {
        for (col, v) in body {
            if let Some(rule) = rules.get(col.as_str()) {
                validate_field(col, v, rule)?;
            }
        }
        Ok(())
    }

    pub fn validate_drug(fields: &DrugFields) -> Result<(), AppError> {
        let body = fields.to_columns()?;
        Self::validate_partial(&body, &drug_rules())?;
        if let (Some(min), Some(max)) = (fields.min_price, fields.max_price) {
            if min > max {
                return Err(AppError::Validation(format!(
                    "min_price ({}) must not exceed max_price ({})",
                    min, max
                )));
            }
        }
        Ok(())
    }

    pub fn validate_price(new: &NewLocalPrice) -> Result<(), AppError> {
        if new.medicine_name.trim().is_empty() {
            return Err(AppError::Validation("medicine_name is required".into()));
        }
        if new.pharmacy_name.trim().is_empty() {
            return Err(AppError::Validation("pharmacy_name is required".into()));
        }
        if !new.price.is_finite() || new.price <= 0.0 {
            return Err(AppError::Validation("price must be a positive number".into()));
        }
        Ok(())
    }
}

fn validate_field(col: &str, v: &Value, rule: &ValidationRule) -> Result<(), AppError> {
    if v.is_null() {
        return Ok(());
    }
    if let Some(max) = rule.max_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() > max as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at most {} characters",
                    col, max
                )));
            }
        }
    }
    if let Some(pattern) = rule.pattern {
        let re = Regex::new(pattern).map_err(|_| AppError::Validation(format!("invalid pattern for {}", col)))?;
        if let Some(s) = v.as_str() {
            if !re.is_match(s) {
                return Err(AppError::Validation(format!("{} does not match required pattern", col)));
            }
        }
    }
    if let Some(min) = rule.minimum {
        if let Some(n) = v.as_f64() {
            if n < min {
                return Err(AppError::Validation(format!("{} must be at least {}", col, min)));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> DrugFields {
        DrugFields {
            generic_name: Some("Amoxicillin".into()),
            ..Default::default()
        }
    }

    #[test]
    fn accepts_plain_record() {
        assert!(RequestValidator::validate_drug(&fields()).is_ok());
        assert!(RequestValidator::validate_drug(&DrugFields::default()).is_ok());
    }

    #[test]
    fn enforces_column_lengths() {
        let f = DrugFields {
            atc_code: Some("J01CA04-TOO-LONG".into()),
            ..fields()
        };
        let err = RequestValidator::validate_drug(&f).unwrap_err();
        assert!(err.to_string().contains("atc_code"));
    }

    #[test]
    fn currency_must_be_three_upper_letters() {
        let ok = DrugFields { price_currency: Some("INR".into()), ..fields() };
        assert!(RequestValidator::validate_drug(&ok).is_ok());
        let bad = DrugFields { price_currency: Some("in".into()), ..fields() };
        assert!(RequestValidator::validate_drug(&bad).is_err());
    }

    #[test]
    fn prices_non_negative_and_ordered() {
        let neg = DrugFields { avg_mrp: Some(-1.0), ..fields() };
        assert!(RequestValidator::validate_drug(&neg).is_err());
        let inverted = DrugFields { min_price: Some(10.0), max_price: Some(5.0), ..fields() };
        assert!(RequestValidator::validate_drug(&inverted).is_err());
        let ordered = DrugFields { min_price: Some(5.0), max_price: Some(10.0), ..fields() };
        assert!(RequestValidator::validate_drug(&ordered).is_ok());
    }

    #[test]
    fn price_observation_rules() {
        let mut new = NewLocalPrice {
            medicine_name: "Paracetamol 500mg".into(),
            pharmacy_name: "ABC Pharmacy".into(),
            price: 25.5,
            expiry_date: None,
            batch_number: None,
        };
        assert!(RequestValidator::validate_price(&new).is_ok());
        new.price = 0.0;
        assert!(RequestValidator::validate_price(&new).is_err());
        new.price = f64::NAN;
        assert!(RequestValidator::validate_price(&new).is_err());
        new.price = 1.0;
        new.pharmacy_name = " ".into();
        assert!(RequestValidator::validate_price(&new).is_err());
    }
}
