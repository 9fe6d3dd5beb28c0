//! Error types for WorkerSQL core
//!
//! Defines a unified error type shared by every component. Error kinds map
//! 1:1 onto the kinds enumerated in the system's error handling design, and
//! each carries the HTTP-like status code and stable tag callers need to
//! assemble a `{ success: false, error, request_id }` envelope.

use std::fmt;
use std::io;

/// Unified error type for WorkerSQL core operations.
#[derive(Debug, Clone)]
pub enum WorkerSqlError {
    /// Auth collaborator's domain; listed for completeness, never raised by the core itself.
    Unauthorized(String),
    /// Auth collaborator's domain; listed for completeness, never raised by the core itself.
    Forbidden(String),
    /// The classifier rejected the statement (unknown leading keyword, etc).
    InvalidSql(String),
    /// A split-planning precondition failed.
    InvalidPlan(String),
    /// A policy `propose`/version update raced another writer.
    VersionConflict { expected: u64, got: u64 },
    /// The circuit breaker for a shard is open.
    ShardUnavailable(String),
    /// The primary shard rejected a mutation.
    MutationFailed(String),
    /// The primary shard rejected a DDL statement.
    DdlFailed(String),
    /// One or more groups within a batch failed.
    BatchFailed(String),
    /// A batch or single op exceeded configured size limits.
    InvalidInput(String),
    /// A shard RPC exceeded its deadline.
    Timeout(String),
    /// A plan/session/cache lookup missed.
    NotFound(String),
    /// I/O error (persisted plan/policy state, etc).
    Io(String),
    /// JSON (de)serialization error.
    Json(String),
    /// Generic internal error that doesn't fit another kind.
    Internal(String),
}

impl WorkerSqlError {
    /// The HTTP-like status code this error kind maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            WorkerSqlError::Unauthorized(_) => 401,
            WorkerSqlError::Forbidden(_) => 403,
            WorkerSqlError::InvalidSql(_) => 400,
            WorkerSqlError::InvalidPlan(_) => 400,
            WorkerSqlError::InvalidInput(_) => 400,
            WorkerSqlError::VersionConflict { .. } => 409,
            WorkerSqlError::ShardUnavailable(_) => 503,
            WorkerSqlError::MutationFailed(_) => 500,
            WorkerSqlError::DdlFailed(_) => 500,
            WorkerSqlError::BatchFailed(_) => 500,
            WorkerSqlError::Timeout(_) => 504,
            WorkerSqlError::NotFound(_) => 404,
            WorkerSqlError::Io(_) => 500,
            WorkerSqlError::Json(_) => 500,
            WorkerSqlError::Internal(_) => 500,
        }
    }

    /// Stable machine-readable tag for the error kind (the `error` field of
    /// the `{ success: false, error, request_id }` envelope).
    pub fn kind_tag(&self) -> &'static str {
        match self {
            WorkerSqlError::Unauthorized(_) => "Unauthorized",
            WorkerSqlError::Forbidden(_) => "Forbidden",
            WorkerSqlError::InvalidSql(_) => "InvalidSQL",
            WorkerSqlError::InvalidPlan(_) => "InvalidPlan",
            WorkerSqlError::InvalidInput(_) => "InvalidInput",
            WorkerSqlError::VersionConflict { .. } => "VersionConflict",
            WorkerSqlError::ShardUnavailable(_) => "ShardUnavailable",
            WorkerSqlError::MutationFailed(_) => "MutationFailed",
            WorkerSqlError::DdlFailed(_) => "DDLFailed",
            WorkerSqlError::BatchFailed(_) => "BatchFailed",
            WorkerSqlError::Timeout(_) => "Timeout",
            WorkerSqlError::NotFound(_) => "NotFound",
            WorkerSqlError::Io(_) => "Internal",
            WorkerSqlError::Json(_) => "Internal",
            WorkerSqlError::Internal(_) => "Internal",
        }
    }
}

impl fmt::Display for WorkerSqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerSqlError::Unauthorized(msg) => write!(f, "{}", msg),
            WorkerSqlError::Forbidden(msg) => write!(f, "{}", msg),
            WorkerSqlError::InvalidSql(msg) => write!(f, "{}", msg),
            WorkerSqlError::InvalidPlan(msg) => write!(f, "{}", msg),
            WorkerSqlError::InvalidInput(msg) => write!(f, "{}", msg),
            WorkerSqlError::VersionConflict { expected, got } => write!(
                f,
                "version conflict: expected next version {}, got {}",
                expected, got
            ),
            WorkerSqlError::ShardUnavailable(shard_id) => {
                write!(f, "shard '{}' unavailable (circuit open)", shard_id)
            }
            WorkerSqlError::MutationFailed(msg) => write!(f, "{}", msg),
            WorkerSqlError::DdlFailed(msg) => write!(f, "{}", msg),
            WorkerSqlError::BatchFailed(msg) => write!(f, "{}", msg),
            WorkerSqlError::Timeout(msg) => write!(f, "{}", msg),
            WorkerSqlError::NotFound(msg) => write!(f, "{}", msg),
            WorkerSqlError::Io(msg) => write!(f, "{}", msg),
            WorkerSqlError::Json(msg) => write!(f, "{}", msg),
            WorkerSqlError::Internal(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for WorkerSqlError {}

impl From<io::Error> for WorkerSqlError {
    fn from(e: io::Error) -> Self {
        WorkerSqlError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for WorkerSqlError {
    fn from(e: serde_json::Error) -> Self {
        WorkerSqlError::Json(e.to_string())
    }
}

/// Result type alias for WorkerSQL core operations.
pub type Result<T> = std::result::Result<T, WorkerSqlError>;
