//! Static table descriptors consumed by the SQL builder and the DDL in `store`.

/// One writable column.
#[derive(Clone, Copy, Debug)]
pub struct ColumnDef {
    pub name: &'static str,
    /// PostgreSQL type used for DDL (when `max_length` is None) and for `$n::type` casts.
    pub pg_type: &'static str,
    /// When set, DDL uses VARCHAR(n) and validation enforces the limit.
    pub max_length: Option<u32>,
    pub not_null: bool,
}

impl ColumnDef {
    pub const fn text(name: &'static str) -> Self {
        ColumnDef { name, pg_type: "text", max_length: None, not_null: false }
    }

    pub const fn varchar(name: &'static str, max_length: u32) -> Self {
        ColumnDef { name, pg_type: "text", max_length: Some(max_length), not_null: false }
    }

    pub const fn typed(name: &'static str, pg_type: &'static str) -> Self {
        ColumnDef { name, pg_type, max_length: None, not_null: false }
    }

    pub const fn required(self) -> Self {
        ColumnDef { not_null: true, ..self }
    }

    /// Column type as written in CREATE TABLE / ADD COLUMN.
    pub fn ddl_type(&self) -> String {
        match self.max_length {
            Some(n) => format!("varchar({})", n),
            None => self.pg_type.to_string(),
        }
    }
}

/// A table with a BIGSERIAL primary key, writable columns, and store-managed timestamps.
#[derive(Clone, Copy, Debug)]
pub struct TableDef {
    pub name: &'static str,
    pub pk: &'static str,
    pub columns: &'static [ColumnDef],
    /// TIMESTAMPTZ NOT NULL DEFAULT NOW() columns, never written from a body.
    pub timestamps: &'static [&'static str],
}

impl TableDef {
    /// All selectable column names: pk, writable columns, timestamps.
    pub fn all_column_names(&self) -> Vec<&'static str> {
        let mut out = Vec::with_capacity(self.columns.len() + self.timestamps.len() + 1);
        out.push(self.pk);
        out.extend(self.columns.iter().map(|c| c.name));
        out.extend(self.timestamps.iter().copied());
        out
    }
}
