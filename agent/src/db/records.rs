//! Record-level operations.

use super::connection::SqliteStore;
use super::tables::{close, columns_of};
use crate::error::{Result, SyncError};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};
use tablesync_engine::{quote_identifier, Fields, Outcome, StoredValue, TableName, ID_COLUMN};

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

impl SqliteStore {
    /// Insert or update a record.
    ///
    /// Only fields the table has a column for are written; the rest are
    /// dropped. Composite values are stored as JSON text. A payload sharing
    /// no field with the table is skipped rather than written as a bare id.
    pub async fn upsert_record(&self, table: &TableName, id: &str, fields: &Fields) -> Result<Outcome> {
        let mut conn = self.connect(table.as_str()).await?;
        let Some(columns) = columns_of(&mut conn, table).await? else {
            return Err(SyncError::TableNotFound(table.to_string()));
        };

        let mut names = Vec::new();
        let mut values = Vec::new();
        for column in &columns {
            if let Some(value) = fields.get(column) {
                names.push(column.as_str());
                values.push(StoredValue::from_json(value));
            }
        }

        let dropped: Vec<&str> = fields
            .keys()
            .map(String::as_str)
            .filter(|k| *k != ID_COLUMN && !columns.iter().any(|c| c == k))
            .collect();
        if !dropped.is_empty() {
            tracing::debug!("Dropping fields {:?} not in local table {}", dropped, table);
        }

        if names.is_empty() {
            close(conn, table.as_str()).await?;
            return Ok(Outcome::Skipped(format!(
                "no field matches the columns of local table {}",
                table
            )));
        }

        let exists: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?",
            table.quoted(),
            quote_identifier(ID_COLUMN)
        ))
        .bind(id)
        .fetch_one(&mut conn)
        .await
        .map_err(|e| SyncError::storage(table.as_str(), e))?;

        let (sql, outcome) = if exists > 0 {
            let assignments: Vec<String> = names
                .iter()
                .map(|n| format!("{} = ?", quote_identifier(n)))
                .collect();
            let sql = format!(
                "UPDATE {} SET {} WHERE {} = ?",
                table.quoted(),
                assignments.join(", "),
                quote_identifier(ID_COLUMN)
            );
            (sql, Outcome::Updated)
        } else {
            let quoted: Vec<String> = names.iter().map(|n| quote_identifier(n)).collect();
            let sql = format!(
                "INSERT INTO {} ({}, {}) VALUES (?, {})",
                table.quoted(),
                quote_identifier(ID_COLUMN),
                quoted.join(", "),
                vec!["?"; names.len()].join(", ")
            );
            (sql, Outcome::Created)
        };

        let mut query = sqlx::query(&sql);
        if outcome == Outcome::Created {
            query = query.bind(id);
        }
        for value in values {
            query = bind_value(query, value);
        }
        if outcome == Outcome::Updated {
            query = query.bind(id);
        }

        query
            .execute(&mut conn)
            .await
            .map_err(|e| SyncError::storage(table.as_str(), e))?;
        close(conn, table.as_str()).await?;

        Ok(outcome)
    }

    /// Delete a record. Returns whether a row was removed.
    pub async fn delete_record(&self, table: &TableName, id: &str) -> Result<bool> {
        let mut conn = self.connect(table.as_str()).await?;
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE {} = ?",
            table.quoted(),
            quote_identifier(ID_COLUMN)
        ))
        .bind(id)
        .execute(&mut conn)
        .await
        .map_err(|e| SyncError::storage(table.as_str(), e))?;
        close(conn, table.as_str()).await?;

        Ok(result.rows_affected() > 0)
    }
}

fn bind_value(query: SqliteQuery<'_>, value: StoredValue) -> SqliteQuery<'_> {
    match value {
        StoredValue::Null => query.bind(None::<String>),
        StoredValue::Integer(i) => query.bind(i),
        StoredValue::Real(f) => query.bind(f),
        StoredValue::Text(s) => query.bind(s),
    }
}
