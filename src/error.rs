//! Error types for update-name.

use crate::pipeline::types::ActionKind;

/// Top-level error type for the job.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Cursor persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the remote timeline service.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Request to {endpoint} failed: {reason}")]
    RequestFailed { endpoint: String, reason: String },

    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },
}

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Timeline fetch failed: {0}")]
    Fetch(#[source] FeedError),

    #[error("Action {kind} for item {item_id:?} failed: {source}")]
    Action {
        kind: ActionKind,
        item_id: Option<i64>,
        #[source]
        source: FeedError,
    },

    #[error("Cursor persistence failed for {account}: {source}")]
    Cursor {
        account: String,
        #[source]
        source: DatabaseError,
    },
}

/// Result type alias for the job.
pub type Result<T> = std::result::Result<T, Error>;
