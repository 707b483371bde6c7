//! Table schema inference.
//!
//! A table that only exists remotely is created locally from one sample
//! record. The sample's field order fixes the column order and each value's
//! JSON type picks the column's storage type. Later records never alter the
//! schema: their extra fields are dropped when written.

use crate::{
    error::Result,
    ident::{is_valid_identifier, quote_identifier},
    Error, Fields, TableName, ID_COLUMN,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Storage types used for inferred columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    /// Pick the column type for a sample value.
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Bool(_) => ColumnType::Integer,
            Value::Number(n) if n.is_i64() || n.is_u64() => ColumnType::Integer,
            Value::Number(_) => ColumnType::Real,
            // Composites are stored as JSON text; strings and nulls are text.
            _ => ColumnType::Text,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One inferred column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    /// Column name
    pub name: String,
    /// Storage type
    pub column_type: ColumnType,
}

/// The schema of a table to create locally.
///
/// `columns` excludes the synthetic `id TEXT PRIMARY KEY` column, which
/// every table gets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    /// Table name
    pub table: TableName,
    /// Payload columns in sample order
    pub columns: Vec<Column>,
    /// Sample fields left out because their names are not valid identifiers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dropped: Vec<String>,
}

impl TableSchema {
    /// Names of the payload columns, in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for this schema.
    pub fn create_table_sql(&self) -> String {
        let mut defs = Vec::with_capacity(self.columns.len() + 1);
        defs.push(format!("{} TEXT PRIMARY KEY", quote_identifier(ID_COLUMN)));
        defs.extend(
            self.columns
                .iter()
                .map(|c| format!("{} {}", quote_identifier(&c.name), c.column_type)),
        );
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.table.quoted(),
            defs.join(", ")
        )
    }
}

/// Infer a table schema from a single sample record.
///
/// The `id` key is never a column. Field names that fail identifier
/// validation are reported in [`TableSchema::dropped`] instead of reaching
/// SQL text. A sample with no usable field is an error: a table holding only
/// ids could never receive data.
pub fn infer_schema(table: &TableName, sample: &Fields) -> Result<TableSchema> {
    let mut columns = Vec::with_capacity(sample.len());
    let mut dropped = Vec::new();

    for (name, value) in sample {
        if name == ID_COLUMN {
            continue;
        }
        if !is_valid_identifier(name) {
            dropped.push(name.clone());
            continue;
        }
        columns.push(Column {
            name: name.clone(),
            column_type: ColumnType::infer(value),
        });
    }

    if columns.is_empty() {
        return Err(Error::EmptySample(table.to_string()));
    }

    Ok(TableSchema {
        table: table.clone(),
        columns,
        dropped,
    })
}
