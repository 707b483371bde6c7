//! Remote Store Client.
//!
//! The remote side is a plain HTTP table store:
//!
//! - `GET /tables` returns `{"tables": [...]}`
//! - `GET /{table}` returns `{"<id>": {field: value, ...}, ...}`
//! - `PUT /{table}/{id}` takes the record's fields as a JSON object
//!
//! Requests carry a timeout and are never retried within a pass.

mod client;

pub use client::*;

use crate::error::Result;
use crate::store::RemoteTables;
use async_trait::async_trait;
use tablesync_engine::{Fields, TableName, TableSnapshot};

#[async_trait]
impl RemoteTables for RemoteClient {
    async fn list_tables(&self) -> Result<Vec<String>> {
        RemoteClient::list_tables(self).await
    }

    async fn get_table(&self, table: &TableName) -> Result<TableSnapshot> {
        RemoteClient::get_table(self, table).await
    }

    async fn upsert_record(&self, table: &TableName, id: &str, fields: &Fields) -> Result<()> {
        RemoteClient::upsert_record(self, table, id, fields).await
    }
}
