//! Error types for the task store and the ownership guard.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    InvalidRequest,
    SelfReference,

    // Ownership errors
    Unauthenticated,
    OwnerMismatch,
    CrossUserParent,
    PolicyViolation,

    // Not found errors
    ParentNotFoundOrDenied,
    TaskNotFound,

    // Conflict errors
    ConstraintViolation,

    // Internal errors
    DatabaseError,
    InternalError,
}

/// Failure reported by a [`TaskStore`](crate::store::TaskStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// No row visible to the acting identity has this id.
    #[error("task {0} not found")]
    NotFound(String),

    /// The row would not be visible to (or owned by) the acting identity.
    #[error("row-level policy violation: {0}")]
    PolicyViolation(String),

    /// A schema constraint or write-time trigger rejected the row.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("database error: {0}")]
    Database(#[source] rusqlite::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            StoreError::NotFound(_) => ErrorCode::TaskNotFound,
            StoreError::PolicyViolation(_) => ErrorCode::PolicyViolation,
            StoreError::ConstraintViolation(_) => ErrorCode::ConstraintViolation,
            StoreError::Database(_) => ErrorCode::DatabaseError,
            StoreError::Unavailable(_) => ErrorCode::InternalError,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        // Trigger aborts and CHECK/FK failures all surface as constraint violations.
        match err {
            rusqlite::Error::SqliteFailure(ref e, ref msg)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::ConstraintViolation(msg.clone().unwrap_or_else(|| e.to_string()))
            }
            other => StoreError::Database(other),
        }
    }
}

/// Why a proposed (owner, parent) pairing or a task mutation was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The owner asserted in the payload is not the acting identity.
    #[error("User ID mismatch - potential security violation")]
    OwnerMismatch,

    /// The parent could not be read. Under row scoping "missing" and
    /// "someone else's" look the same, so they share one variant. A store
    /// failure during the lookup is kept in `cause` for logging only.
    #[error("Parent task not found or access denied")]
    ParentNotFoundOrDenied { cause: Option<String> },

    /// The parent was readable but belongs to another user.
    #[error("Parent task belongs to different user")]
    CrossUserParent,

    #[error("Task cannot reference itself as parent")]
    SelfReference,

    /// The task being updated could not be located to resolve its owner.
    #[error("Task not found or access denied")]
    TaskNotFound,
}

impl ValidationError {
    /// The store failure behind a refused parent lookup, if any.
    pub fn cause(&self) -> Option<&str> {
        match self {
            ValidationError::ParentNotFoundOrDenied { cause } => cause.as_deref(),
            _ => None,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ValidationError::OwnerMismatch => ErrorCode::OwnerMismatch,
            ValidationError::ParentNotFoundOrDenied { .. } => ErrorCode::ParentNotFoundOrDenied,
            ValidationError::CrossUserParent => ErrorCode::CrossUserParent,
            ValidationError::SelfReference => ErrorCode::SelfReference,
            ValidationError::TaskNotFound => ErrorCode::TaskNotFound,
        }
    }
}

/// Which guarded mutation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Creation,
    Update,
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::Creation => write!(f, "creation"),
            Mutation::Update => write!(f, "update"),
        }
    }
}

/// Failure of a guarded create or update.
#[derive(Debug, Error)]
pub enum GuardError {
    /// Validation refused the mutation; storage was never reached.
    #[error("Task {op} blocked: {reason}")]
    Blocked {
        op: Mutation,
        #[source]
        reason: ValidationError,
    },

    /// Validation passed but the write itself failed.
    #[error("Task {op} failed: {source}")]
    Storage {
        op: Mutation,
        #[source]
        source: StoreError,
    },
}

impl GuardError {
    pub fn blocked(op: Mutation, reason: ValidationError) -> Self {
        GuardError::Blocked { op, reason }
    }

    pub fn storage(op: Mutation, source: StoreError) -> Self {
        GuardError::Storage { op, source }
    }

    /// The validation reason, if this mutation was blocked.
    pub fn reason(&self) -> Option<&ValidationError> {
        match self {
            GuardError::Blocked { reason, .. } => Some(reason),
            GuardError::Storage { .. } => None,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            GuardError::Blocked { reason, .. } => reason.code(),
            GuardError::Storage { source, .. } => source.code(),
        }
    }
}

/// Result of an ownership check: `Ok(())` when the pairing is legal.
pub type Verdict = std::result::Result<(), ValidationError>;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type for guarded mutations.
pub type GuardResult<T> = std::result::Result<T, GuardError>;
