//! Brand/manufacturer import from the first worksheet of an `.xlsx` workbook.

use crate::error::AppError;
use crate::model::DrugFields;
use crate::service::DrugService;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;
use sqlx::PgPool;
use std::io::{Cursor, Read, Seek};
use zip::ZipArchive;

const BRAND_HEADER: &str = "Brand Name";
const MANUFACTURER_HEADER: &str = "Manufacturer";
const UNKNOWN_MANUFACTURER: &str = "N/A";

/// Cell text of a worksheet: header row plus data rows, each padded to its last non-empty cell.
#[derive(Debug, Default, PartialEq)]
pub struct SpreadsheetRows {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SpreadsheetRows {
    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }

    /// Records for rows with a brand name, and the count of rows skipped for lacking one.
    pub fn drugs(&self) -> Result<(Vec<DrugFields>, usize), AppError> {
        let (Some(brand_col), Some(maker_col)) = (self.column(BRAND_HEADER), self.column(MANUFACTURER_HEADER)) else {
            let missing: Vec<&str> = [BRAND_HEADER, MANUFACTURER_HEADER]
                .into_iter()
                .filter(|h| self.column(h).is_none())
                .collect();
            return Err(AppError::Validation(format!(
                "missing required columns: {} (found: {})",
                missing.join(", "),
                self.headers.join(", ")
            )));
        };
        let cell = |row: &Vec<String>, i: usize| row.get(i).map(|s| s.trim().to_string()).unwrap_or_default();
        let mut drugs = Vec::new();
        let mut skipped = 0;
        for row in &self.rows {
            let brand = cell(row, brand_col);
            if brand.is_empty() {
                skipped += 1;
                continue;
            }
            let maker = cell(row, maker_col);
            drugs.push(DrugFields {
                brand_name: Some(brand),
                manufacturer: Some(if maker.is_empty() { UNKNOWN_MANUFACTURER.to_string() } else { maker }),
                ..Default::default()
            });
        }
        Ok((drugs, skipped))
    }
}

#[derive(Debug, Serialize)]
pub struct SpreadsheetImport {
    pub imported: usize,
    pub skipped: usize,
    pub total_rows: usize,
}

impl DrugService {
    /// Insert one record per branded row of the first worksheet, in a single transaction.
    pub async fn import_spreadsheet(pool: &PgPool, bytes: &[u8]) -> Result<SpreadsheetImport, AppError> {
        let sheet = parse_spreadsheet(bytes)?;
        let (drugs, skipped) = sheet.drugs()?;
        let mut tx = pool.begin().await?;
        let created = Self::insert_all(&mut tx, &drugs).await?;
        tx.commit().await?;
        let summary = SpreadsheetImport {
            imported: created.len(),
            skipped,
            total_rows: sheet.rows.len(),
        };
        tracing::info!(
            imported = summary.imported,
            skipped = summary.skipped,
            total_rows = summary.total_rows,
            "spreadsheet import finished"
        );
        Ok(summary)
    }
}

/// Read cell text from the first worksheet. The first row is the header.
pub fn parse_spreadsheet(bytes: &[u8]) -> Result<SpreadsheetRows, AppError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| AppError::Validation(format!("not an xlsx workbook: {}", e)))?;
    let shared = match read_entry(&mut archive, "xl/sharedStrings.xml")? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };
    let sheet_name = first_worksheet(&mut archive)?
        .ok_or_else(|| AppError::Validation("workbook has no worksheets".into()))?;
    let xml = read_entry(&mut archive, &sheet_name)?
        .ok_or_else(|| AppError::Validation(format!("missing {}", sheet_name)))?;
    let mut rows = parse_sheet(&xml, &shared)?.into_iter();
    Ok(SpreadsheetRows {
        headers: rows.next().unwrap_or_default(),
        rows: rows.collect(),
    })
}

/// Entry name of the first sheet in workbook order (`xl/workbook.xml` plus its relationships),
/// falling back to the lowest-numbered worksheet part.
fn first_worksheet<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Option<String>, AppError> {
    let workbook = read_entry(archive, "xl/workbook.xml")?;
    let rels = read_entry(archive, "xl/_rels/workbook.xml.rels")?;
    if let (Some(workbook), Some(rels)) = (workbook, rels) {
        if let Some(rid) = first_sheet_rel_id(&workbook)? {
            if let Some(target) = rel_target(&rels, &rid)? {
                let name = match target.strip_prefix('/') {
                    Some(absolute) => absolute.to_string(),
                    None => format!("xl/{}", target),
                };
                if archive.index_for_name(&name).is_some() {
                    return Ok(Some(name));
                }
            }
        }
    }
    let mut sheets: Vec<&str> = archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/") && n.ends_with(".xml"))
        .collect();
    sheets.sort_by_key(|n| (sheet_number(n), n.to_string()));
    Ok(sheets.first().map(|s| s.to_string()))
}

/// Trailing number of a part name such as `xl/worksheets/sheet10.xml`.
fn sheet_number(name: &str) -> u64 {
    let stem = name.trim_end_matches(".xml");
    let digits = stem.len() - stem.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    stem[stem.len() - digits..].parse().unwrap_or(u64::MAX)
}

/// `r:id` of the first `<sheet>` in `xl/workbook.xml`.
fn first_sheet_rel_id(xml: &str) -> Result<Option<String>, AppError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                return attribute(&e, b"id");
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// `Target` of the relationship with the given `Id`.
fn rel_target(xml: &str, rel_id: &str) -> Result<Option<String>, AppError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if attribute(&e, b"Id")?.as_deref() == Some(rel_id) {
                    return attribute(&e, b"Target");
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

fn attribute(e: &BytesStart<'_>, local: &[u8]) -> Result<Option<String>, AppError> {
    for attr in e.attributes() {
        let attr = attr.map_err(xml_error)?;
        if attr.key.local_name().as_ref() == local {
            return Ok(Some(attr.unescape_value().map_err(xml_error)?.into_owned()));
        }
    }
    Ok(None)
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Option<String>, AppError> {
    let mut f = match archive.by_name(name) {
        Ok(f) => f,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(AppError::Validation(format!("{}: {}", name, e))),
    };
    let mut s = String::new();
    f.read_to_string(&mut s)
        .map_err(|e| AppError::Validation(format!("{}: {}", name, e)))?;
    Ok(Some(s))
}

fn xml_error(e: impl std::fmt::Display) -> AppError {
    AppError::Validation(format!("malformed worksheet xml: {}", e))
}

/// `<si>` entries in order; rich-text runs are concatenated.
fn parse_shared_strings(xml: &str) -> Result<Vec<String>, AppError> {
    let mut reader = Reader::from_str(xml);
    let mut out = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_text = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => out.push(String::new()),
            Event::Text(t) if in_text => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&t.unescape().map_err(xml_error)?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"si" => out.extend(current.take()),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

/// Last column a worksheet can hold (`XFD`).
const MAX_COLUMN: usize = 16_383;

/// Zero-based column index from a cell reference such as `B7`. `None` when the reference has no letters.
fn column_index(cell_ref: &str) -> Result<Option<usize>, AppError> {
    let letters: Vec<u8> = cell_ref.bytes().take_while(u8::is_ascii_alphabetic).collect();
    if letters.is_empty() {
        return Ok(None);
    }
    let out_of_range = || AppError::Validation(format!("cell reference {} is beyond column XFD", cell_ref));
    let mut n = 0usize;
    for c in letters {
        n = n
            .checked_mul(26)
            .and_then(|n| n.checked_add((c.to_ascii_uppercase() - b'A') as usize + 1))
            .filter(|n| n - 1 <= MAX_COLUMN)
            .ok_or_else(out_of_range)?;
    }
    Ok(Some(n - 1))
}

struct CellStart {
    column: Option<usize>,
    kind: Option<String>,
}

fn cell_start(e: &BytesStart<'_>) -> Result<CellStart, AppError> {
    let mut cell = CellStart { column: None, kind: None };
    for attr in e.attributes() {
        let attr = attr.map_err(xml_error)?;
        let value = attr.unescape_value().map_err(xml_error)?;
        match attr.key.local_name().as_ref() {
            b"r" => cell.column = column_index(&value)?,
            b"t" => cell.kind = Some(value.into_owned()),
            _ => {}
        }
    }
    Ok(cell)
}

fn parse_sheet(xml: &str, shared: &[String]) -> Result<Vec<Vec<String>>, AppError> {
    let mut reader = Reader::from_str(xml);
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell: Option<CellStart> = None;
    let mut value = String::new();
    let mut in_value = false;
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => row = Vec::new(),
                b"c" => {
                    let mut c = cell_start(&e)?;
                    c.column.get_or_insert(row.len());
                    cell = Some(c);
                    value.clear();
                }
                b"v" | b"t" if cell.is_some() => in_value = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"row" => rows.push(Vec::new()),
            Event::Text(t) if in_value => value.push_str(&t.unescape().map_err(xml_error)?),
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    if let Some(c) = cell.take() {
                        let text = match c.kind.as_deref() {
                            Some("s") => value
                                .trim()
                                .parse::<usize>()
                                .ok()
                                .and_then(|i| shared.get(i).cloned())
                                .unwrap_or_default(),
                            _ => value.clone(),
                        };
                        let col = c.column.unwrap_or(row.len());
                        if !text.is_empty() {
                            if row.len() <= col {
                                row.resize(col + 1, String::new());
                            }
                            row[col] = text;
                        }
                    }
                }
                b"row" => rows.push(std::mem::take(&mut row)),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(rows)
}
