//! Table-level operations: catalog, schema and snapshots.

use super::connection::{SqliteStore, CATALOG};
use crate::error::{Result, SyncError};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Column, Connection, Row, TypeInfo, ValueRef};
use std::collections::BTreeSet;
use tablesync_engine::{
    is_valid_identifier, Side, StoredValue, TableName, TableSchema, TableSnapshot, ID_COLUMN,
};

impl SqliteStore {
    /// Names of all user tables, without SQLite's internal ones.
    ///
    /// Tables whose names are not valid identifiers are left out: they can
    /// not be queried safely.
    pub async fn list_tables(&self) -> Result<BTreeSet<String>> {
        let mut conn = self.connect(CATALOG).await?;
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT name FROM sqlite_master
            WHERE type = 'table' AND name NOT LIKE 'sqlite\_%' ESCAPE '\'
            ORDER BY name
            "#,
        )
        .fetch_all(&mut conn)
        .await
        .map_err(|e| SyncError::storage(CATALOG, e))?;
        close(conn, CATALOG).await?;

        Ok(names
            .into_iter()
            .filter(|name| {
                let valid = is_valid_identifier(name);
                if !valid {
                    tracing::warn!("Ignoring local table with unsafe name {:?}", name);
                }
                valid
            })
            .collect())
    }

    /// Whether the table exists.
    pub async fn table_exists(&self, table: &TableName) -> Result<bool> {
        let mut conn = self.connect(table.as_str()).await?;
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table.as_str())
        .fetch_one(&mut conn)
        .await
        .map_err(|e| SyncError::storage(table.as_str(), e))?;
        close(conn, table.as_str()).await?;
        Ok(count > 0)
    }

    /// Payload columns of a table, in declaration order, without `id`.
    pub async fn table_columns(&self, table: &TableName) -> Result<Vec<String>> {
        let mut conn = self.connect(table.as_str()).await?;
        let columns = columns_of(&mut conn, table).await?;
        close(conn, table.as_str()).await?;
        columns.ok_or_else(|| SyncError::TableNotFound(table.to_string()))
    }

    /// Capture every record of a table.
    ///
    /// Text values that parse as JSON come back decoded, so composites
    /// round-trip. Rows with a null id are skipped.
    pub async fn get_table(&self, table: &TableName) -> Result<TableSnapshot> {
        let mut conn = self.connect(table.as_str()).await?;
        let Some(columns) = columns_of(&mut conn, table).await? else {
            return Err(SyncError::TableNotFound(table.to_string()));
        };

        let rows = sqlx::query(&format!("SELECT * FROM {}", table.quoted()))
            .fetch_all(&mut conn)
            .await
            .map_err(|e| SyncError::storage(table.as_str(), e))?;
        close(conn, table.as_str()).await?;

        let mut snapshot = TableSnapshot::new(table.clone(), Side::Local).with_columns(columns);
        for row in &rows {
            let mut id = None;
            let mut fields = tablesync_engine::Fields::new();
            for (index, column) in row.columns().iter().enumerate() {
                let value = read_value(row, index).map_err(|e| SyncError::storage(table.as_str(), e))?;
                if column.name() == ID_COLUMN {
                    id = record_id(value);
                } else {
                    fields.insert(column.name().to_string(), value.into_json());
                }
            }
            match id {
                Some(id) => snapshot.insert(id, fields),
                None => tracing::warn!("Skipping row without id in local table {}", table),
            }
        }
        Ok(snapshot)
    }

    /// Create the table unless it exists. An existing schema is never altered.
    ///
    /// Returns true when this call created the table.
    pub async fn ensure_table(&self, schema: &TableSchema) -> Result<bool> {
        let table = schema.table.as_str();
        let mut conn = self.connect(table).await?;

        if columns_of(&mut conn, &schema.table).await?.is_some() {
            close(conn, table).await?;
            return Ok(false);
        }

        for field in &schema.dropped {
            tracing::warn!("Field {:?} of table {} is not a valid column name, dropped", field, table);
        }

        sqlx::query(&schema.create_table_sql())
            .execute(&mut conn)
            .await
            .map_err(|e| SyncError::storage(table, e))?;
        close(conn, table).await?;

        tracing::info!(
            "Created local table {} with columns {:?}",
            table,
            schema.column_names()
        );
        Ok(true)
    }
}

/// Column names of a table without `id`, or `None` when it does not exist.
pub(super) async fn columns_of(
    conn: &mut SqliteConnection,
    table: &TableName,
) -> Result<Option<Vec<String>>> {
    let names: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info(?)")
        .bind(table.as_str())
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| SyncError::storage(table.as_str(), e))?;

    if names.is_empty() {
        return Ok(None);
    }
    Ok(Some(names.into_iter().filter(|n| n != ID_COLUMN).collect()))
}

pub(super) async fn close(conn: SqliteConnection, table: &str) -> Result<()> {
    conn.close().await.map_err(|e| SyncError::storage(table, e))
}

/// Read a column by its runtime storage class rather than its declared type.
fn read_value(row: &SqliteRow, index: usize) -> std::result::Result<StoredValue, sqlx::Error> {
    let kind = {
        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            return Ok(StoredValue::Null);
        }
        raw.type_info().name().to_ascii_uppercase()
    };

    let value = match kind.as_str() {
        "INTEGER" | "BOOLEAN" => StoredValue::Integer(row.try_get_unchecked(index)?),
        "REAL" | "NUMERIC" => StoredValue::Real(row.try_get_unchecked(index)?),
        "BLOB" => {
            let bytes: Vec<u8> = row.try_get_unchecked(index)?;
            StoredValue::Text(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => StoredValue::Text(row.try_get_unchecked(index)?),
    };
    Ok(value)
}

/// Ids are text, but tables created elsewhere may hold numeric ones.
fn record_id(value: StoredValue) -> Option<String> {
    match value {
        StoredValue::Null => None,
        StoredValue::Integer(i) => Some(i.to_string()),
        StoredValue::Real(f) => Some(f.to_string()),
        StoredValue::Text(s) => Some(s),
    }
}
