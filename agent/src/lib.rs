//! # tablesync-agent
//!
//! Keeps a local SQLite database and a remote HTTP table store in step.
//!
//! The agent owns all IO. Planning which record goes where lives in
//! [`tablesync_engine`]; this crate captures snapshots from both stores,
//! hands them to the planner and executes the resulting writes one record
//! at a time.
//!
//! - [`db::SqliteStore`]: the local store
//! - [`remote::RemoteClient`]: the remote store
//! - [`sync::Reconciler`]: one reconciliation pass
//! - [`scheduler::Runner`]: single-shot or continuous operation

pub mod config;
pub mod db;
pub mod error;
pub mod remote;
pub mod scheduler;
pub mod store;
pub mod sync;

pub use config::{Config, ConfigError};
pub use db::SqliteStore;
pub use error::{Result, SyncError};
pub use remote::RemoteClient;
pub use scheduler::Runner;
pub use store::{LocalTables, RemoteTables};
pub use sync::{Reconciler, SyncOptions};
