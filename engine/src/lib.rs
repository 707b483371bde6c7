//! # Tablesync Engine
//!
//! Deterministic reconciliation logic for syncing a local embedded table
//! store with a remote HTTP table store.
//!
//! This crate holds everything about a sync pass that does not touch a
//! store: what a record is, how values are stored and compared, how a
//! table's schema is inferred, which writes reconcile two snapshots, and how
//! outcomes are reported.
//!
//! ## Design Principles
//!
//! - **No IO**: adapters for SQLite and HTTP live in `tablesync-agent`
//! - **Deterministic**: snapshots are id-ordered, so plans are stable
//! - **Testable**: plans are plain data and can be applied in memory
//!
//! ## Core Concepts
//!
//! ### Tables and records
//!
//! A table is a named set of records. Its name is a [`TableName`], validated
//! against `[A-Za-z0-9_]+` before it can reach any query text. A record is an
//! opaque string id plus a [`Fields`] map; the id is never one of the fields.
//!
//! ### Values
//!
//! [`StoredValue`] is the storage form of a field. Composite values are kept
//! as JSON text and decoded again on read. [`values_equivalent`] compares
//! values the way both stores see them.
//!
//! ### Snapshots and plans
//!
//! A [`TableSnapshot`] captures one table from one store. [`plan_table`]
//! compares the local and remote snapshots under a [`ConflictPolicy`]:
//! - [`ConflictPolicy::Bidirectional`] - missing records flow both ways and
//!   the remote value wins a mismatch (default)
//! - [`ConflictPolicy::LocalPriority`] - local values overwrite remote ones;
//!   remote records only fill ids missing locally
//!
//! ## Quick Start
//!
//! ```rust
//! use tablesync_engine::{plan_table, ConflictPolicy, Side, TableName, TableSnapshot};
//! use serde_json::json;
//!
//! let table = TableName::new("tarefas").unwrap();
//!
//! let mut local = TableSnapshot::new(table.clone(), Side::Local);
//! local.insert("a", json!({"v": 1}).as_object().cloned().unwrap());
//!
//! let remote = TableSnapshot::from_wire(table, json!({"b": {"v": 2}})).unwrap();
//!
//! let plan = plan_table(&local, &remote, ConflictPolicy::Bidirectional);
//! assert_eq!(plan.writes.len(), 2);
//! ```

pub mod error;
pub mod ident;
pub mod reconcile;
pub mod report;
pub mod schema;
pub mod snapshot;
pub mod value;

// Re-export main types at crate root
pub use error::Error;
pub use ident::{is_valid_identifier, quote_identifier, TableName};
pub use reconcile::{plan_table, ConflictPolicy, PlannedWrite, TablePlan, WriteKind};
pub use report::{
    Outcome, PassReport, PassSummary, RecordOutcome, RunMode, TableReport, TableStatus,
};
pub use schema::{infer_schema, Column, ColumnType, TableSchema};
pub use snapshot::{Side, TableSnapshot};
pub use value::{fields_equivalent, values_equivalent, StoredValue};

/// Type aliases for clarity
pub type RecordId = String;
pub type Timestamp = u64;

/// A record's payload: field name to JSON value, in wire order.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Primary key column of every local table.
pub const ID_COLUMN: &str = "id";
