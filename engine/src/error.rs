//! Error types for the tablesync engine.

use thiserror::Error;

/// All possible errors from the tablesync engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("cannot infer a schema for table {0}: sample record has no usable fields")]
    EmptySample(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
