//! Dynamic SQL construction.
//!
//! Pure functions from (table, structured arguments) to a [`SqlFragment`]:
//! statement text with `$1..$n` placeholders plus the ordered parameter list.
//!
//! Two separate paths feed the statement text:
//! - identifiers go through [`Identifier::parse`] and are written literally;
//! - values only ever go through [`FragmentWriter::bind`], which appends the
//!   value to the parameter list and returns its 1-based position as the
//!   placeholder index. Placeholder numbers therefore always equal parameter
//!   positions, and clauses written later (WHERE after SET) continue the
//!   numbering instead of restarting it.

use crate::db::ident::Identifier;
use crate::error::{DbError, DbResult};
use crate::models::{ColumnValues, SqlValue};
use std::fmt::Write;

/// Default column returned by `INSERT ... RETURNING`.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// Tables visible in the default schema, in catalog order.
pub const LIST_TABLES_SQL: &str = "SELECT table_name::text AS table_name \
     FROM information_schema.tables \
     WHERE table_schema = 'public'";

/// Schema searched by `describe_table` for unqualified names.
pub const DEFAULT_SCHEMA: &str = "public";

/// Column descriptors of one table; `$1` is the schema, `$2` the table name.
pub const DESCRIBE_TABLE_SQL: &str = "SELECT column_name::text AS column_name, \
     data_type::text AS data_type, \
     is_nullable::text AS is_nullable, \
     column_default::text AS column_default \
     FROM information_schema.columns \
     WHERE table_schema = $1 AND table_name = $2 \
     ORDER BY ordinal_position";

/// Largest `LIMIT` PostgreSQL accepts (a signed 64-bit count).
pub const MAX_LIMIT: u64 = i64::MAX as u64;

/// Statement text paired with its ordered bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl SqlFragment {
    fn fixed(sql: &str) -> Self {
        Self {
            sql: sql.to_string(),
            params: Vec::new(),
        }
    }
}

struct FragmentWriter {
    sql: String,
    params: Vec<SqlValue>,
}

impl FragmentWriter {
    fn new() -> Self {
        Self {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    fn push_ident(&mut self, ident: &Identifier) {
        self.sql.push_str(ident.as_str());
    }

    /// Append a value to the parameter list and write its placeholder.
    fn bind(&mut self, value: &SqlValue) {
        self.params.push(value.clone());
        let _ = write!(self.sql, "${}", self.params.len());
    }

    /// Write `col = $i` pairs joined by `separator`.
    fn push_equalities(&mut self, pairs: &ColumnValues, separator: &str) -> DbResult<()> {
        for (i, (column, value)) in pairs.iter().enumerate() {
            if i > 0 {
                self.push(separator);
            }
            let column = Identifier::parse(column)?;
            self.push_ident(&column);
            self.push(" = ");
            self.bind(value);
        }
        Ok(())
    }

    fn finish(self) -> SqlFragment {
        SqlFragment {
            sql: self.sql,
            params: self.params,
        }
    }
}

fn require_non_empty(values: Option<&ColumnValues>, field: &str) -> DbResult<()> {
    match values {
        Some(v) if !v.is_empty() => Ok(()),
        Some(_) => Err(DbError::invalid_argument(format!(
            "'{}' must contain at least one column",
            field
        ))),
        None => Err(DbError::invalid_argument(format!(
            "Missing '{}' argument",
            field
        ))),
    }
}

/// Builds parameterized CRUD statements for the PostgreSQL dialect.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    primary_key: Identifier,
}

impl QueryBuilder {
    /// Create a builder whose inserts return `primary_key`.
    pub fn new(primary_key: &str) -> DbResult<Self> {
        Ok(Self {
            primary_key: Identifier::parse(primary_key)?,
        })
    }

    pub fn primary_key(&self) -> &str {
        self.primary_key.as_str()
    }

    /// `INSERT INTO <table> (<cols>) VALUES ($1, ..) RETURNING <pk>`
    pub fn insert(&self, table: &str, data: &ColumnValues) -> DbResult<SqlFragment> {
        require_non_empty(Some(data), "data")?;
        let table = Identifier::parse(table)?;

        let columns = data
            .columns()
            .map(Identifier::parse)
            .collect::<DbResult<Vec<_>>>()?;

        let mut w = FragmentWriter::new();
        w.push("INSERT INTO ");
        w.push_ident(&table);
        w.push(" (");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                w.push(", ");
            }
            w.push_ident(column);
        }
        w.push(") VALUES (");
        for (i, value) in data.values().enumerate() {
            if i > 0 {
                w.push(", ");
            }
            w.bind(value);
        }
        w.push(") RETURNING ");
        w.push_ident(&self.primary_key);
        Ok(w.finish())
    }

    /// `SELECT * FROM <table> [WHERE ..] [LIMIT n]`
    ///
    /// Absent or empty `conditions` produce no WHERE clause. `limit` is
    /// written as a literal, never bound, and must fit PostgreSQL's bigint.
    pub fn select(
        &self,
        table: &str,
        conditions: Option<&ColumnValues>,
        limit: Option<u64>,
    ) -> DbResult<SqlFragment> {
        let table = Identifier::parse(table)?;
        if let Some(limit) = limit.filter(|l| *l > MAX_LIMIT) {
            return Err(DbError::invalid_argument(format!(
                "'limit' must not exceed {} (got {})",
                MAX_LIMIT, limit
            )));
        }

        let mut w = FragmentWriter::new();
        w.push("SELECT * FROM ");
        w.push_ident(&table);
        if let Some(conditions) = conditions.filter(|c| !c.is_empty()) {
            w.push(" WHERE ");
            w.push_equalities(conditions, " AND ")?;
        }
        if let Some(limit) = limit {
            w.push(&format!(" LIMIT {}", limit));
        }
        Ok(w.finish())
    }

    /// `UPDATE <table> SET .. WHERE ..`; SET values occupy `$1..$k`, WHERE
    /// values `$k+1..$k+m`.
    pub fn update(
        &self,
        table: &str,
        data: &ColumnValues,
        conditions: &ColumnValues,
    ) -> DbResult<SqlFragment> {
        require_non_empty(Some(data), "data")?;
        require_non_empty(Some(conditions), "conditions")?;
        let table = Identifier::parse(table)?;

        let mut w = FragmentWriter::new();
        w.push("UPDATE ");
        w.push_ident(&table);
        w.push(" SET ");
        w.push_equalities(data, ", ")?;
        w.push(" WHERE ");
        w.push_equalities(conditions, " AND ")?;
        Ok(w.finish())
    }

    /// `DELETE FROM <table> WHERE ..`
    pub fn delete(&self, table: &str, conditions: &ColumnValues) -> DbResult<SqlFragment> {
        require_non_empty(Some(conditions), "conditions")?;
        let table = Identifier::parse(table)?;

        let mut w = FragmentWriter::new();
        w.push("DELETE FROM ");
        w.push_ident(&table);
        w.push(" WHERE ");
        w.push_equalities(conditions, " AND ")?;
        Ok(w.finish())
    }

    pub fn list_tables(&self) -> SqlFragment {
        SqlFragment::fixed(LIST_TABLES_SQL)
    }

    /// `schema.table` or `table` (in [`DEFAULT_SCHEMA`]). Both parts are
    /// bound, not interpolated.
    pub fn describe_table(&self, table: &str) -> DbResult<SqlFragment> {
        if table.trim().is_empty() {
            return Err(DbError::invalid_argument("Missing 'table' argument"));
        }
        let (schema, name) = table.split_once('.').unwrap_or((DEFAULT_SCHEMA, table));
        Ok(SqlFragment {
            sql: DESCRIBE_TABLE_SQL.to_string(),
            params: vec![
                SqlValue::String(schema.to_string()),
                SqlValue::String(name.to_string()),
            ],
        })
    }

    /// `SELECT <value> FROM <table> ORDER BY <order> DESC LIMIT 1`
    pub fn latest_value(
        &self,
        table: &str,
        value_column: &str,
        order_column: &str,
    ) -> DbResult<SqlFragment> {
        let table = Identifier::parse(table)?;
        let value_column = Identifier::parse(value_column)?;
        let order_column = Identifier::parse(order_column)?;

        let mut w = FragmentWriter::new();
        w.push("SELECT ");
        w.push_ident(&value_column);
        w.push(" FROM ");
        w.push_ident(&table);
        w.push(" ORDER BY ");
        w.push_ident(&order_column);
        w.push(" DESC LIMIT 1");
        Ok(w.finish())
    }
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self {
            primary_key: Identifier::from_static(DEFAULT_PRIMARY_KEY),
        }
    }
}
