//! Builds parameterized INSERT, SELECT, UPDATE, DELETE from a table descriptor.

use crate::sql::table::TableDef;
use serde_json::Value;
use std::collections::HashMap;

/// Quote identifier for PostgreSQL (safe: only from static table descriptors).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }
}

/// SELECT list: pk, writable columns, timestamps, in descriptor order.
fn select_column_list(table: &TableDef) -> String {
    table
        .all_column_names()
        .into_iter()
        .map(quoted)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Escape LIKE metacharacters and wrap in `%` for a literal substring match (ESCAPE '\').
pub fn like_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

/// SELECT by primary key. Caller binds id as the sole param.
pub fn select_by_id(table: &TableDef, schema: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = $1",
        select_column_list(table),
        qualified_table(schema, table.name),
        quoted(table.pk)
    );
    q
}

/// SELECT page ordered by pk. Limit is not capped here.
pub fn select_page(table: &TableDef, schema: &str, limit: u64, offset: u64) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT {} FROM {} ORDER BY {} LIMIT {} OFFSET {}",
        select_column_list(table),
        qualified_table(schema, table.name),
        quoted(table.pk),
        limit,
        offset
    );
    q
}

/// SELECT rows where any of `columns` contains `needle` (case-insensitive), ORDER BY pk, LIMIT.
pub fn select_matching(
    table: &TableDef,
    schema: &str,
    columns: &[&str],
    needle: &str,
    limit: u64,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(Value::String(like_pattern(needle)));
    let ors: Vec<String> = columns
        .iter()
        .map(|c| format!("{} ILIKE ${} ESCAPE '\\'", quoted(c), n))
        .collect();
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} ORDER BY {} LIMIT {}",
        select_column_list(table),
        qualified_table(schema, table.name),
        ors.join(" OR "),
        quoted(table.pk),
        limit
    );
    q
}

/// SELECT COUNT(*).
pub fn count(table: &TableDef, schema: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!("SELECT COUNT(*) FROM {}", qualified_table(schema, table.name));
    q
}

/// SELECT column, COUNT(*) grouped over non-null keys.
pub fn group_count(table: &TableDef, schema: &str, column: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    let col = quoted(column);
    q.sql = format!(
        "SELECT {col}::text, COUNT(*) FROM {} WHERE {col} IS NOT NULL GROUP BY {col} ORDER BY {col}",
        qualified_table(schema, table.name),
    );
    q
}

/// INSERT: only columns present in body, with `$n::type` casts. Timestamps and pk use DB defaults.
pub fn insert(table: &TableDef, schema: &str, body: &HashMap<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in table.columns {
        let Some(val) = body.get(c.name) else { continue };
        let param_num = q.push_param(val.clone());
        cols.push(quoted(c.name));
        placeholders.push(format!("${}::{}", param_num, c.pg_type));
    }
    let target = qualified_table(schema, table.name);
    let returning = select_column_list(table);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", target, returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            target,
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE by id: SET only columns present in body, always refresh `updated_at`.
pub fn update(table: &TableDef, schema: &str, id: i64, body: &HashMap<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for c in table.columns {
        let Some(val) = body.get(c.name) else { continue };
        let param_num = q.push_param(val.clone());
        sets.push(format!("{} = ${}::{}", quoted(c.name), param_num, c.pg_type));
    }
    if table.timestamps.contains(&"updated_at") {
        sets.push(format!("{} = NOW()", quoted("updated_at")));
    }
    let id_param = q.push_param(Value::Number(id.into()));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ${} RETURNING {}",
        qualified_table(schema, table.name),
        sets.join(", "),
        quoted(table.pk),
        id_param,
        select_column_list(table)
    );
    q
}

/// DELETE by id. Caller binds id as the sole param.
pub fn delete(table: &TableDef, schema: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "DELETE FROM {} WHERE {} = $1 RETURNING {}",
        qualified_table(schema, table.name),
        quoted(table.pk),
        quoted(table.pk)
    );
    q
}
