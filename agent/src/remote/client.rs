use crate::error::{Result, SyncError};
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tablesync_engine::{Fields, TableName, TableSnapshot};

/// Catalog endpoint body.
#[derive(Debug, Deserialize)]
struct TableList {
    tables: Vec<String>,
}

/// HTTP client for the remote table store.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    client: Client,
    base_url: Url,
}

impl RemoteClient {
    /// Build a client for the store rooted at `base_url`.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        if base_url.cannot_be_a_base() {
            return Err(SyncError::RemoteProtocol(format!(
                "{} cannot be used as a base URL",
                base_url
            )));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// List the tables the remote knows about.
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        let url = self.endpoint(&["tables"])?;
        let response = self.client.get(url).send().await?;
        let response = expect_success(response).await?;

        let body: TableList = response.json().await?;
        Ok(body.tables)
    }

    /// Fetch every record of a table.
    ///
    /// Entries that are not objects are kept out of the snapshot and listed
    /// in its `malformed` ids.
    pub async fn get_table(&self, table: &TableName) -> Result<TableSnapshot> {
        let url = self.endpoint(&[table.as_str()])?;
        let response = self.client.get(url).send().await?;
        let response = expect_success(response).await?;

        let body: Value = response.json().await?;
        TableSnapshot::from_wire(table.clone(), body)
            .map_err(|e| SyncError::RemoteProtocol(e.to_string()))
    }

    /// Create or replace one record. 200 and 201 are success.
    pub async fn upsert_record(&self, table: &TableName, id: &str, fields: &Fields) -> Result<()> {
        let url = self.endpoint(&[table.as_str(), id])?;
        let response = self.client.put(url).json(fields).send().await?;

        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::CREATED {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(SyncError::RemoteRejected {
            status: status.as_u16(),
            body,
        })
    }

    /// Append percent-encoded segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                SyncError::RemoteProtocol(format!("{} cannot be used as a base URL", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Turn a non-2xx response into `RemoteUnavailable`.
async fn expect_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    Err(SyncError::RemoteUnavailable {
        status: status.as_u16(),
        message: error_message(&text),
    })
}

/// The `error` field of a `{"error": "..."}` body, or the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
