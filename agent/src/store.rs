//! Store contracts used by a sync pass.
//!
//! The pass executor only sees these two traits. [`crate::db::SqliteStore`]
//! and [`crate::remote::RemoteClient`] implement them; tests plug in fakes.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;
use tablesync_engine::{Fields, Outcome, TableName, TableSchema, TableSnapshot};

/// The local embedded store.
#[async_trait]
pub trait LocalTables: Send + Sync {
    /// Names of all user tables. A failure here means the store is unusable.
    async fn list_tables(&self) -> Result<BTreeSet<String>>;

    /// Capture every record of an existing table.
    async fn get_table(&self, table: &TableName) -> Result<TableSnapshot>;

    /// Create the table from an inferred schema unless it already exists.
    ///
    /// Returns true when the table was created by this call.
    async fn ensure_table(&self, schema: &TableSchema) -> Result<bool>;

    /// Insert or update one record, writing only fields the table has columns for.
    async fn upsert_record(&self, table: &TableName, id: &str, fields: &Fields) -> Result<Outcome>;
}

/// The remote HTTP table store.
#[async_trait]
pub trait RemoteTables: Send + Sync {
    /// Names of all tables the remote knows about.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Capture every record of a table.
    async fn get_table(&self, table: &TableName) -> Result<TableSnapshot>;

    /// Create or replace one record.
    async fn upsert_record(&self, table: &TableName, id: &str, fields: &Fields) -> Result<()>;
}
