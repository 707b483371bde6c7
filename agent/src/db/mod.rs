//! Local Store Adapter backed by SQLite.
//!
//! Each logical table is a SQLite table with a text `id` primary key and one
//! column per inferred field. A connection is opened per operation and
//! closed when it completes; record writes commit one by one.

mod connection;
mod records;
mod tables;

pub use connection::*;

use crate::error::Result;
use crate::store::LocalTables;
use async_trait::async_trait;
use std::collections::BTreeSet;
use tablesync_engine::{Fields, Outcome, TableName, TableSchema, TableSnapshot};

#[async_trait]
impl LocalTables for SqliteStore {
    async fn list_tables(&self) -> Result<BTreeSet<String>> {
        SqliteStore::list_tables(self).await
    }

    async fn get_table(&self, table: &TableName) -> Result<TableSnapshot> {
        SqliteStore::get_table(self, table).await
    }

    async fn ensure_table(&self, schema: &TableSchema) -> Result<bool> {
        SqliteStore::ensure_table(self, schema).await
    }

    async fn upsert_record(&self, table: &TableName, id: &str, fields: &Fields) -> Result<Outcome> {
        SqliteStore::upsert_record(self, table, id, fields).await
    }
}
