//! Resolve a free-text medicine name to dictionary candidates and a canonical generic name.

use crate::error::AppError;
use crate::model::DrugRecord;
use crate::service::DrugService;
use serde::Serialize;
use sqlx::PgPool;

/// Candidates considered per resolution.
const RESOLVE_LIMIT: u64 = 5;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DrugMatch {
    pub id: i64,
    pub generic_name: Option<String>,
    pub brand_name: Option<String>,
    pub alternative_names: Option<String>,
    pub strength: Option<String>,
    pub form: Option<String>,
    pub resolved_generic_name: Option<String>,
}

impl From<DrugRecord> for DrugMatch {
    fn from(r: DrugRecord) -> Self {
        let resolved_generic_name = r.fields.resolved_name().map(str::to_string);
        let f = r.fields;
        DrugMatch {
            id: r.id,
            generic_name: f.generic_name,
            brand_name: f.brand_name,
            alternative_names: f.alternative_names,
            strength: f.strength,
            form: f.form,
            resolved_generic_name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Resolution {
    pub found: bool,
    pub original_name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<DrugMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_match: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl Resolution {
    fn from_candidates(original_name: &str, candidates: Vec<DrugRecord>) -> Self {
        let matches: Vec<DrugMatch> = rank_matches(original_name, candidates)
            .into_iter()
            .map(DrugMatch::from)
            .collect();
        if matches.is_empty() {
            return Resolution {
                found: false,
                original_name: original_name.to_string(),
                matches,
                best_match: None,
                message: Some("No matching drug found in dictionary"),
            };
        }
        let best_match = matches[0].resolved_generic_name.clone();
        Resolution {
            found: true,
            original_name: original_name.to_string(),
            matches,
            best_match,
            message: None,
        }
    }
}

pub struct ResolutionService;

impl ResolutionService {
    pub async fn resolve(pool: &PgPool, name: &str) -> Result<Resolution, AppError> {
        let candidates = DrugService::search(pool, name, RESOLVE_LIMIT).await?;
        let resolution = Resolution::from_candidates(name, candidates);
        tracing::debug!(name, found = resolution.found, best = ?resolution.best_match, "resolved");
        Ok(resolution)
    }
}

/// Order candidates by match quality: an exact name, then a name prefix, then any substring.
/// The sort is stable so equal-quality candidates keep their id order.
pub fn rank_matches(query: &str, mut candidates: Vec<DrugRecord>) -> Vec<DrugRecord> {
    let needle = query.trim().to_lowercase();
    candidates.sort_by_key(|r| {
        r.fields
            .names()
            .map(|n| {
                let n = n.to_lowercase();
                if n == needle {
                    0u8
                } else if n.starts_with(&needle) {
                    1
                } else {
                    2
                }
            })
            .min()
            .unwrap_or(2)
    });
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DrugFields;
    use chrono::Utc;

    fn record(id: i64, generic: Option<&str>, brand: Option<&str>, alts: Option<&str>) -> DrugRecord {
        DrugRecord {
            id,
            fields: DrugFields {
                generic_name: generic.map(Into::into),
                brand_name: brand.map(Into::into),
                alternative_names: alts.map(Into::into),
                ..Default::default()
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn ids(records: &[DrugRecord]) -> Vec<i64> {
        records.iter().map(|r| r.id).collect()
    }

    #[test]
    fn exact_beats_prefix_beats_substring() {
        let ranked = rank_matches(
            "crocin",
            vec![
                record(1, Some("Paracetamol"), Some("Crocin Advance"), None),
                record(2, Some("Caffeine"), None, Some("Procrocine")),
                record(3, Some("Paracetamol"), Some("Crocin"), None),
            ],
        );
        assert_eq!(ids(&ranked), vec![3, 1, 2]);
    }

    #[test]
    fn equal_quality_keeps_id_order() {
        let ranked = rank_matches(
            "para",
            vec![
                record(4, Some("Paracetamol"), None, None),
                record(9, Some("Paraffin"), None, None),
            ],
        );
        assert_eq!(ids(&ranked), vec![4, 9]);
    }

    #[test]
    fn best_match_falls_back_to_brand() {
        let r = Resolution::from_candidates("dolo", vec![record(5, None, Some("Dolo 650"), None)]);
        assert!(r.found);
        assert_eq!(r.best_match.as_deref(), Some("Dolo 650"));
        assert_eq!(r.matches[0].resolved_generic_name.as_deref(), Some("Dolo 650"));
    }

    #[test]
    fn no_candidates_reports_not_found() {
        let r = Resolution::from_candidates("xyzzy", Vec::new());
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["found"], false);
        assert_eq!(v["original_name"], "xyzzy");
        assert!(v.get("matches").is_none());
        assert!(v["message"].is_string());
    }
}
