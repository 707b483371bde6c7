//! Unified error handling for the agent.

/// Errors raised while talking to either store.
///
/// None of these stop the process once it is running: a pass converts them
/// into table or record outcomes and the next pass retries.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Timeout, refused connection, DNS failure.
    #[error("remote unreachable: {0}")]
    RemoteUnreachable(String),

    #[error("remote unavailable: HTTP {status}: {message}")]
    RemoteUnavailable { status: u16, message: String },

    #[error("remote rejected write: HTTP {status}: {body}")]
    RemoteRejected { status: u16, body: String },

    #[error("malformed remote response: {0}")]
    RemoteProtocol(String),

    #[error("storage error on table {table}: {source}")]
    Storage {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("engine error: {0}")]
    Engine(#[from] tablesync_engine::Error),
}

impl SyncError {
    /// Wrap a database error with the table it happened on.
    pub fn storage(table: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Storage {
            table: table.into(),
            source,
        }
    }

    /// Returns true if the next pass may succeed without intervention.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SyncError::RemoteUnreachable(_)
                | SyncError::RemoteUnavailable { .. }
                | SyncError::RemoteRejected { .. }
                | SyncError::RemoteProtocol(_)
        )
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SyncError::RemoteProtocol(err.to_string())
        } else {
            SyncError::RemoteUnreachable(err.to_string())
        }
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, SyncError>;
