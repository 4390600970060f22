//! Typed builder for the import script.
//!
//! Values are never spliced in as raw text: every value goes through
//! [`SqlValue`], whose rendering is the escaping contract of the import:
//! embedded single quotes are doubled and JSON `null` becomes the bare token
//! `NULL`, never `'null'` or `''`.

use crate::models::Row;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    /// Numeric literal, already in canonical JSON form
    Number(String),
    Text(String),
}

impl From<&Value> for SqlValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Bool(*b),
            Value::Number(n) => SqlValue::Number(n.to_string()),
            Value::String(s) => SqlValue::Text(s.clone()),
            // json/jsonb columns: stored as their JSON text
            Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Bool(true) => f.write_str("TRUE"),
            SqlValue::Bool(false) => f.write_str("FALSE"),
            SqlValue::Number(n) => f.write_str(n),
            SqlValue::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

/// Double-quoted identifier with embedded quotes doubled.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Deferrable constraints are checked at commit, after every table is
    /// reloaded.
    DeferConstraints,
    /// One statement for every reloaded table, without `CASCADE`: Postgres
    /// refuses when a table outside the list references one inside it.
    Truncate {
        tables: Vec<String>,
    },
    Insert {
        table: String,
        columns: Vec<String>,
        values: Vec<SqlValue>,
    },
    /// Move the `id` sequence past the highest inserted id.
    ResetSequence {
        table: String,
        column: String,
    },
}

impl Statement {
    pub fn truncate<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Statement::Truncate {
            tables: tables.into_iter().map(Into::into).collect(),
        }
    }

    pub fn insert(table: &str, row: &Row) -> Self {
        Statement::Insert {
            table: table.to_string(),
            columns: row.keys().cloned().collect(),
            values: row.values().map(SqlValue::from).collect(),
        }
    }

    pub fn reset_sequence(table: &str, column: &str) -> Self {
        Statement::ResetSequence {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::DeferConstraints => f.write_str("SET CONSTRAINTS ALL DEFERRED;"),
            Statement::Truncate { tables } => {
                let tables = tables
                    .iter()
                    .map(|t| quote_identifier(t))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "TRUNCATE TABLE {};", tables)
            }
            Statement::Insert {
                table,
                columns,
                values,
            } => {
                let columns = columns
                    .iter()
                    .map(|c| quote_identifier(c))
                    .collect::<Vec<_>>()
                    .join(", ");
                let values = values
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(
                    f,
                    "INSERT INTO {} ({}) VALUES ({});",
                    quote_identifier(table),
                    columns,
                    values
                )
            }
            Statement::ResetSequence { table, column } => {
                let table_ident = quote_identifier(table);
                // only emitted for integer ids; a column without a sequence
                // selects no row
                write!(
                    f,
                    "SELECT setval(s, (SELECT COALESCE(MAX({}), 1) FROM {})) FROM pg_get_serial_sequence('{}', '{}') AS s WHERE s IS NOT NULL;",
                    quote_identifier(column),
                    table_ident,
                    table_ident.replace('\'', "''"),
                    column.replace('\'', "''")
                )
            }
        }
    }
}

/// Ordered list of statements executed as one unit.
#[derive(Debug, Clone, Default)]
pub struct SqlScript {
    statements: Vec<Statement>,
}

impl SqlScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn render(&self) -> String {
        let mut script = String::new();
        for statement in &self.statements {
            script.push_str(&statement.to_string());
            script.push('\n');
        }
        script
    }
}
