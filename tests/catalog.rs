//! Store-backed tests. Run only when TEST_DATABASE_URL points at a PostgreSQL server;
//! every test tags its rows with a fresh token so runs never see each other's data.

use chrono::{Duration, NaiveDate};
use drug_catalog::model::{today, DrugFields, DrugType, ExpiryStatus, NewLocalPrice};
use drug_catalog::service::render_csv;
use drug_catalog::{
    ensure_catalog_tables, ensure_database_exists, AppError, DrugService, PriceService, ResolutionService,
    TransferService,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::io::Write;
use tokio::sync::OnceCell;

static SCHEMA_READY: OnceCell<()> = OnceCell::const_new();

async fn pool() -> Option<PgPool> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    ensure_database_exists(&url).await.unwrap();
    let pool = PgPoolOptions::new().max_connections(4).connect(&url).await.unwrap();
    SCHEMA_READY
        .get_or_init(|| async { ensure_catalog_tables(&pool).await.unwrap() })
        .await;
    Some(pool)
}

fn token() -> String {
    format!("zq{}", &uuid::Uuid::new_v4().simple().to_string()[..10])
}

fn generic(name: String) -> DrugFields {
    DrugFields {
        generic_name: Some(name),
        ..Default::default()
    }
}

async fn add_price(pool: &PgPool, medicine: &str, pharmacy: &str, price: f64, expiry: Option<NaiveDate>) {
    PriceService::add(
        pool,
        &NewLocalPrice {
            medicine_name: medicine.into(),
            pharmacy_name: pharmacy.into(),
            price,
            expiry_date: expiry.map(|d| d.format("%Y-%m-%d").to_string()),
            batch_number: None,
        },
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn table_setup_runs_again_on_an_existing_schema() {
    let Some(pool) = pool().await else { return };
    ensure_catalog_tables(&pool).await.unwrap();
    ensure_catalog_tables(&pool).await.unwrap();
    let (checks,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM pg_constraint WHERE conname = 'drug_dictionary_drug_type_check'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(checks >= 1);
}

#[tokio::test]
async fn create_then_get_returns_input_fields() {
    let Some(pool) = pool().await else { return };
    let fields = DrugFields {
        generic_name: Some(format!("Paracetamol {}", token())),
        brand_name: Some("Crocin".into()),
        drug_type: Some(DrugType::Otc),
        prescription_required: Some(false),
        avg_mrp: Some(25.5),
        price_currency: Some("INR".into()),
        ..Default::default()
    };
    let created = DrugService::create(&pool, &fields).await.unwrap();
    let fetched = DrugService::get(&pool, created.id).await.unwrap();
    assert_eq!(fetched.fields, fields);
    assert_eq!(fetched.fields.form, None);
    assert_eq!(fetched.created_at, created.created_at);
}

#[tokio::test]
async fn update_touches_only_supplied_fields() {
    let Some(pool) = pool().await else { return };
    let original = DrugFields {
        brand_name: Some("Dolo 650".into()),
        form: Some("Tablet".into()),
        ..generic(format!("Paracetamol {}", token()))
    };
    let created = DrugService::create(&pool, &original).await.unwrap();
    let patch = DrugFields {
        strength: Some("650mg".into()),
        ..Default::default()
    };
    let updated = DrugService::update(&pool, created.id, &patch).await.unwrap();
    assert_eq!(
        updated.fields,
        DrugFields {
            strength: Some("650mg".into()),
            ..original
        }
    );
    assert!(updated.updated_at >= created.updated_at);
    assert_eq!(updated.created_at, created.created_at);
}

#[tokio::test]
async fn missing_ids_are_not_found() {
    let Some(pool) = pool().await else { return };
    let created = DrugService::create(&pool, &generic(token())).await.unwrap();
    DrugService::delete(&pool, created.id).await.unwrap();
    assert!(matches!(DrugService::get(&pool, created.id).await, Err(AppError::NotFound(_))));
    assert!(matches!(DrugService::delete(&pool, created.id).await, Err(AppError::NotFound(_))));
    assert!(matches!(
        DrugService::update(&pool, created.id, &generic("x".into())).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn search_matches_any_name_case_insensitively() {
    let Some(pool) = pool().await else { return };
    let tok = token();
    let by_generic = DrugService::create(&pool, &generic(format!("{}amol", tok))).await.unwrap();
    let by_brand = DrugService::create(
        &pool,
        &DrugFields {
            brand_name: Some(format!("Brand{}", tok.to_uppercase())),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let by_alt = DrugFields {
        alternative_names: Some(format!("Calpol, alt{}", tok)),
        ..Default::default()
    };
    let by_alt = DrugService::create(&pool, &by_alt).await.unwrap();
    DrugService::create(&pool, &generic(format!("Unrelated {}", token()))).await.unwrap();

    let ids: Vec<i64> = DrugService::search(&pool, &tok, 20).await.unwrap().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![by_generic.id, by_brand.id, by_alt.id]);

    let capped = DrugService::search(&pool, &tok, 2).await.unwrap();
    assert_eq!(capped.len(), 2);

    let literal = DrugService::search(&pool, &format!("{}%", tok), 20).await.unwrap();
    assert!(literal.is_empty());
}

#[tokio::test]
async fn bulk_create_is_all_or_nothing() {
    let Some(pool) = pool().await else { return };
    let tok = token();
    let items = vec![
        generic(format!("{} one", tok)),
        DrugFields {
            atc_code: Some("WAY-TOO-LONG-CODE".into()),
            ..generic(format!("{} two", tok))
        },
    ];
    assert!(matches!(DrugService::bulk_create(&pool, &items).await, Err(AppError::Validation(_))));
    assert!(DrugService::search(&pool, &tok, 10).await.unwrap().is_empty());

    let ok = DrugService::bulk_create(&pool, &items[..1]).await.unwrap();
    assert_eq!(ok.len(), 1);
}

#[tokio::test]
async fn names_and_stats_cover_new_records() {
    let Some(pool) = pool().await else { return };
    let tok = token();
    let before = DrugService::stats(&pool).await.unwrap();
    DrugService::create(
        &pool,
        &DrugFields {
            alternative_names: Some(format!(" {}-a ,, {}-b", tok, tok)),
            drug_type: Some(DrugType::Generic),
            form: Some(format!("Form {}", tok)),
            ..generic(format!("{}-g", tok))
        },
    )
    .await
    .unwrap();

    let names = DrugService::all_names(&pool).await.unwrap();
    for expected in [format!("{}-a", tok), format!("{}-b", tok), format!("{}-g", tok)] {
        assert!(names.contains(&expected), "missing {}", expected);
    }

    let after = DrugService::stats(&pool).await.unwrap();
    assert!(after.total_drugs > before.total_drugs);
    assert_eq!(after.forms.get(&format!("Form {}", tok)), Some(&1));
    assert!(after.drug_types.get("generic").copied().unwrap_or(0) >= 1);
    assert!(after.unique_variations >= before.unique_variations + 3);
}

#[tokio::test]
async fn resolution_prefers_exact_names() {
    let Some(pool) = pool().await else { return };
    let tok = token();
    DrugService::create(&pool, &generic(format!("{} extended", tok))).await.unwrap();
    let exact = DrugService::create(
        &pool,
        &DrugFields {
            brand_name: Some(tok.clone()),
            ..generic(format!("Generic {}", tok))
        },
    )
    .await
    .unwrap();

    let r = ResolutionService::resolve(&pool, &tok).await.unwrap();
    assert!(r.found);
    assert_eq!(r.matches[0].id, exact.id);
    assert_eq!(r.best_match, Some(format!("Generic {}", tok)));

    let none = ResolutionService::resolve(&pool, &token()).await.unwrap();
    assert!(!none.found);
    assert!(none.matches.is_empty());
}

#[tokio::test]
async fn added_price_is_found_by_name() {
    let Some(pool) = pool().await else { return };
    let tok = token();
    let medicine = format!("Paracetamol 500mg {}", tok);
    PriceService::add(
        &pool,
        &NewLocalPrice {
            medicine_name: medicine.clone(),
            pharmacy_name: "ABC Pharmacy".into(),
            price: 25.50,
            expiry_date: Some("2025-03-01".into()),
            batch_number: Some("B123".into()),
        },
    )
    .await
    .unwrap();
    PriceService::add(
        &pool,
        &NewLocalPrice {
            medicine_name: medicine.clone(),
            pharmacy_name: "Lenient Dates".into(),
            price: 30.0,
            expiry_date: Some("03/01/2025".into()),
            batch_number: None,
        },
    )
    .await
    .unwrap();

    let found = PriceService::by_name(&pool, &tok, 10).await.unwrap();
    assert_eq!(found.len(), 2);
    // Newest first.
    assert_eq!(found[0].price.pharmacy_name, "Lenient Dates");
    assert_eq!(found[0].price.expiry_date, None);
    assert_eq!(found[0].expiry.status, None);
    let abc = &found[1].price;
    assert_eq!(abc.price, 25.50);
    assert_eq!(abc.expiry_date, NaiveDate::from_ymd_opt(2025, 3, 1));
    assert_eq!(abc.batch_number.as_deref(), Some("B123"));

    let invalid = NewLocalPrice {
        medicine_name: medicine,
        pharmacy_name: "Free".into(),
        price: 0.0,
        expiry_date: None,
        batch_number: None,
    };
    assert!(matches!(PriceService::add(&pool, &invalid).await, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn near_expiry_deals_are_in_window_and_ordered() {
    let Some(pool) = pool().await else { return };
    let tok = token();
    let day = today();
    add_price(&pool, &format!("{} late", tok), "P", 10.0, Some(day + Duration::days(80))).await;
    add_price(&pool, &format!("{} expired", tok), "P", 10.0, Some(day - Duration::days(1))).await;
    add_price(&pool, &format!("{} soon", tok), "P", 10.0, Some(day + Duration::days(10))).await;
    add_price(&pool, &format!("{} undated", tok), "P", 10.0, None).await;
    add_price(&pool, &format!("{} far", tok), "P", 10.0, Some(day + Duration::days(120))).await;

    let deals: Vec<String> = PriceService::near_expiry(&pool, 100_000)
        .await
        .unwrap()
        .into_iter()
        .filter(|v| v.price.medicine_name.starts_with(&tok))
        .map(|v| v.price.medicine_name)
        .collect();
    assert_eq!(deals, vec![format!("{} soon", tok), format!("{} late", tok)]);
}

#[tokio::test]
async fn compare_uses_resolved_name_and_skips_expired() {
    let Some(pool) = pool().await else { return };
    let tok = token();
    let generic_name = format!("Generic{}", tok);
    DrugService::create(
        &pool,
        &DrugFields {
            brand_name: Some(format!("Brand{}", tok)),
            ..generic(generic_name.clone())
        },
    )
    .await
    .unwrap();
    let day = today();
    add_price(&pool, &generic_name, "Alpha", 30.0, None).await;
    add_price(&pool, &generic_name, "Expired Stock", 5.0, Some(day - Duration::days(5))).await;
    add_price(&pool, &generic_name, "Gamma", 25.0, Some(day + Duration::days(30))).await;

    let c = PriceService::compare(&pool, &format!("Brand{}", tok), 10).await.unwrap();
    assert_eq!(c.resolved_generic_name.as_deref(), Some(generic_name.as_str()));
    assert_eq!(c.local.len(), 3);
    assert_eq!(c.cheapest_pharmacy.as_deref(), Some("Gamma"));
    assert_eq!(c.cheapest_price, Some(25.0));
    let gamma = c.local.iter().find(|v| v.price.pharmacy_name == "Gamma").unwrap();
    assert_eq!(gamma.expiry.status, Some(ExpiryStatus::Clearance));

    let unresolved_name = format!("Loose {}", token());
    add_price(&pool, &unresolved_name, "Solo", 9.0, None).await;
    let c = PriceService::compare(&pool, &unresolved_name, 10).await.unwrap();
    assert_eq!(c.resolved_generic_name, None);
    assert_eq!(c.cheapest_pharmacy.as_deref(), Some("Solo"));
}

#[tokio::test]
async fn csv_export_reimports_recognized_columns() {
    let Some(pool) = pool().await else { return };
    let tok = token();
    let source = vec![
        DrugFields {
            brand_name: Some("Crocin".into()),
            alternative_names: Some("Calpol, Dolo".into()),
            strength: Some("500mg".into()),
            form: Some("Tablet".into()),
            category: Some("Analgesic".into()),
            ..generic(format!("{} first", tok))
        },
        generic(format!("{} second", tok)),
    ];
    let created = DrugService::bulk_create(&pool, &source).await.unwrap();
    let csv = render_csv(&created).unwrap();

    let summary = TransferService::bulk_import(&pool, &csv, "drugs.CSV").await.unwrap();
    assert_eq!(summary.imported, 2);
    let all = DrugService::search(&pool, &tok, 10).await.unwrap();
    assert_eq!(all.len(), 4);
    let reimported = &all[2..];
    for (orig, back) in created.iter().zip(reimported) {
        assert_eq!(back.fields.generic_name, orig.fields.generic_name);
        assert_eq!(back.fields.brand_name, orig.fields.brand_name);
        assert_eq!(back.fields.alternative_names, orig.fields.alternative_names);
        assert_eq!(back.fields.strength, orig.fields.strength);
        assert_eq!(back.fields.form, orig.fields.form);
        assert_eq!(back.fields.category, None);
    }

    let err = TransferService::bulk_import(&pool, b"[]", "drugs.txt").await.unwrap_err();
    assert!(matches!(err, AppError::UnsupportedFormat(_)));
}

#[tokio::test]
async fn json_import_with_bad_row_commits_nothing() {
    let Some(pool) = pool().await else { return };
    let tok = token();
    let body = format!(
        r#"[{{"generic_name": "{tok} a"}}, {{"generic_name": "{tok} b", "price_currency": "rupees"}}]"#,
        tok = tok
    );
    let err = TransferService::bulk_import(&pool, body.as_bytes(), "drugs.json").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(DrugService::search(&pool, &tok, 10).await.unwrap().is_empty());
}

fn workbook(rows: &[[&str; 2]]) -> Vec<u8> {
    let mut sheet = String::from(
        r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (i, row) in rows.iter().enumerate() {
        sheet.push_str(&format!("<row r=\"{}\">", i + 1));
        for (col, text) in ["A", "B"].iter().zip(row) {
            if !text.is_empty() {
                sheet.push_str(&format!(
                    "<c r=\"{}{}\" t=\"inlineStr\"><is><t>{}</t></is></c>",
                    col,
                    i + 1,
                    text
                ));
            }
        }
        sheet.push_str("</row>");
    }
    sheet.push_str("</sheetData></worksheet>");
    let mut w = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    w.start_file("xl/worksheets/sheet1.xml", zip::write::SimpleFileOptions::default())
        .unwrap();
    w.write_all(sheet.as_bytes()).unwrap();
    w.finish().unwrap().into_inner()
}

#[tokio::test]
async fn spreadsheet_import_counts_skipped_rows() {
    let Some(pool) = pool().await else { return };
    let tok = token();
    let brand = format!("Brand {}", tok);
    let brand_two = format!("{} two", brand);
    let bytes = workbook(&[
        ["Brand Name", "Manufacturer"],
        [brand.as_str(), "GSK"],
        ["", "Orphan Maker"],
        [brand_two.as_str(), ""],
    ]);
    let summary = DrugService::import_spreadsheet(&pool, &bytes).await.unwrap();
    assert_eq!((summary.imported, summary.skipped, summary.total_rows), (2, 1, 3));

    let rows = DrugService::search(&pool, &tok, 10).await.unwrap();
    let makers: Vec<Option<&str>> = rows.iter().map(|r| r.fields.manufacturer.as_deref()).collect();
    assert_eq!(makers, vec![Some("GSK"), Some("N/A")]);

    let missing = workbook(&[["Brand Name", "Maker"], ["X", "Y"]]);
    assert!(matches!(
        DrugService::import_spreadsheet(&pool, &missing).await,
        Err(AppError::Validation(_))
    ));
}
