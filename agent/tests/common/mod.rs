//! In-process mock of the remote table store.

#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tablesync_agent::{Reconciler, RemoteClient, SqliteStore, SyncOptions};
use tablesync_engine::{infer_schema, ConflictPolicy, TableName};
use tempfile::TempDir;

#[derive(Default)]
struct Inner {
    tables: BTreeMap<String, Value>,
    failing_catalog: bool,
    failing_reads: HashSet<String>,
    failing_writes: HashSet<(String, String)>,
    writes: Vec<(String, String)>,
}

/// Shared handle to the mock's state.
#[derive(Clone, Default)]
pub struct MockRemote {
    state: Arc<Mutex<Inner>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a table's body. Any JSON is accepted so malformed bodies can
    /// be served.
    pub fn set_table(&self, table: &str, body: Value) {
        self.state
            .lock()
            .unwrap()
            .tables
            .insert(table.to_string(), body);
    }

    pub fn table(&self, table: &str) -> Value {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Answer `GET /tables` with a 500.
    pub fn fail_catalog(&self) {
        self.state.lock().unwrap().failing_catalog = true;
    }

    /// Answer `GET /{table}` with a 500.
    pub fn fail_reads(&self, table: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_reads
            .insert(table.to_string());
    }

    /// Answer `PUT /{table}/{id}` with a 500.
    pub fn fail_write(&self, table: &str, id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_writes
            .insert((table.to_string(), id.to_string()));
    }

    /// Every accepted write, in arrival order.
    pub fn writes(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().writes.clone()
    }

    /// Serve on an ephemeral port and return the base URL.
    pub async fn spawn(&self) -> String {
        let app = Router::new()
            .route("/tables", get(list_tables))
            .route("/{table}", get(get_table))
            .route("/{table}/{id}", put(put_record))
            .with_state(self.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }
}

async fn list_tables(State(mock): State<MockRemote>) -> Response {
    let state = mock.state.lock().unwrap();
    if state.failing_catalog {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "catalog down");
    }
    let names: Vec<&String> = state.tables.keys().collect();
    Json(json!({ "tables": names })).into_response()
}

async fn get_table(State(mock): State<MockRemote>, Path(table): Path<String>) -> Response {
    let state = mock.state.lock().unwrap();
    if state.failing_reads.contains(&table) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "backend down");
    }
    match state.tables.get(&table) {
        Some(body) => Json(body.clone()).into_response(),
        None => error(StatusCode::INTERNAL_SERVER_ERROR, "no such table"),
    }
}

async fn put_record(
    State(mock): State<MockRemote>,
    Path((table, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = mock.state.lock().unwrap();
    if state.failing_writes.contains(&(table.clone(), id.clone())) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "write failed");
    }
    let Value::Object(fields) = body else {
        return error(StatusCode::BAD_REQUEST, "body must be an object");
    };

    let records = state
        .tables
        .entry(table.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    let Some(records) = records.as_object_mut() else {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "table is corrupt");
    };

    let status = match records.get_mut(&id).and_then(Value::as_object_mut) {
        Some(existing) => {
            existing.extend(fields);
            StatusCode::OK
        }
        None => {
            records.insert(id.clone(), Value::Object(fields));
            StatusCode::CREATED
        }
    };

    state.writes.push((table, id));
    (status, Json(json!({ "ok": true }))).into_response()
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Drop explicit nulls so records compare by content.
pub fn without_nulls(table: Value) -> Value {
    let Value::Object(records) = table else {
        return table;
    };
    let records = records
        .into_iter()
        .map(|(id, fields)| match fields {
            Value::Object(fields) => {
                let fields: Map<String, Value> =
                    fields.into_iter().filter(|(_, v)| !v.is_null()).collect();
                (id, Value::Object(fields))
            }
            other => (id, other),
        })
        .collect();
    Value::Object(records)
}

/// A temporary SQLite store.
pub async fn local_store() -> (TempDir, SqliteStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("local.db")).await.unwrap();
    (dir, store)
}

/// Create a local table from its first record and write every record.
pub async fn seed_local(store: &SqliteStore, table: &str, records: Value) {
    let table = TableName::new(table).unwrap();
    let records = records.as_object().unwrap();
    let (_, sample) = records.iter().next().unwrap();
    let schema = infer_schema(&table, sample.as_object().unwrap()).unwrap();
    store.ensure_table(&schema).await.unwrap();
    for (id, fields) in records {
        store
            .upsert_record(&table, id, fields.as_object().unwrap())
            .await
            .unwrap();
    }
}

/// Local records of a table as `{id: fields}` JSON, nulls dropped.
pub async fn local_table(store: &SqliteStore, table: &str) -> Value {
    let snapshot = store.get_table(&TableName::new(table).unwrap()).await.unwrap();
    let records: Map<String, Value> = snapshot
        .records
        .into_iter()
        .map(|(id, fields)| (id, Value::Object(fields)))
        .collect();
    without_nulls(Value::Object(records))
}

pub fn client(base_url: &str) -> RemoteClient {
    RemoteClient::new(base_url.parse().unwrap(), Duration::from_secs(5)).unwrap()
}

pub fn reconciler(
    store: SqliteStore,
    base_url: &str,
    policy: ConflictPolicy,
) -> Reconciler<SqliteStore, RemoteClient> {
    Reconciler::new(
        store,
        client(base_url),
        SyncOptions {
            policy,
            push_local_tables: false,
        },
    )
}
