//! Opening the local database.

use crate::error::{Result, SyncError};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name used in storage errors that are not about one table.
pub(crate) const CATALOG: &str = "sqlite_master";

/// Handle to the local SQLite file.
///
/// Holds no open connection between operations. The file is assumed to be
/// owned by this process alone.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
    options: SqliteConnectOptions,
}

impl SqliteStore {
    /// Open the store, creating the parent directory and file if needed.
    ///
    /// A connection is made once so an unusable path fails at startup rather
    /// than on the first pass.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| SyncError::storage(CATALOG, sqlx::Error::Io(e)))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        let store = Self { path, options };
        let conn = store.connect(CATALOG).await?;
        conn.close()
            .await
            .map_err(|e| SyncError::storage(CATALOG, e))?;

        tracing::debug!("Local store ready at {}", store.path.display());
        Ok(store)
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) async fn connect(&self, table: &str) -> Result<SqliteConnection> {
        SqliteConnection::connect_with(&self.options)
            .await
            .map_err(|e| SyncError::storage(table, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("meu_banco.db");

        let store = SqliteStore::open(&path).await.unwrap();

        assert!(path.exists());
        assert_eq!(store.path(), path.as_path());
    }

    #[tokio::test]
    async fn open_fails_on_unusable_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"x").unwrap();

        let result = SqliteStore::open(blocker.join("db.sqlite")).await;
        assert!(matches!(result, Err(SyncError::Storage { .. })));
    }
}
