//! Error taxonomy for the mirror store.
//!
//! Not-found is a normal outcome and is modeled as `Option`, never as
//! an error variant. `Busy` is the only class eligible for automatic
//! retry; everything else surfaces to the caller as-is.

/// Errors that can occur in the store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Caller violated a precondition (bad timestamps, oversized page
    /// request against a closed ceiling, missing capability, ...).
    #[error("invalid state: {reason}")]
    InvalidState { reason: String },

    /// The store is in a state the engine cannot reconcile, e.g. two
    /// live versions for one identity. Never silently repaired.
    #[error("invariant violation: {details}")]
    InvariantViolation { details: String },

    /// Metadata key or value outside the allowed size bounds.
    #[error("metadata {what} length {len} exceeds limit {max}")]
    MetadataLimit {
        what: &'static str,
        len: usize,
        max: usize,
    },

    /// Record already carries the maximum number of distinct metadata keys.
    #[error("metadata key count limit {max} reached")]
    MetadataCount { max: usize },

    #[error("SQLite error: {message}")]
    Sqlite { message: String },

    #[error("migration failed at version {version}: {message}")]
    MigrationFailed { version: u32, message: String },

    /// Database busy or locked — transient, safe to retry once the
    /// enclosing transaction has rolled back.
    #[error("database busy")]
    Busy,
}

impl StoreError {
    /// Whether this failure class may be retried after a clean rollback.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Busy)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;
        if let rusqlite::Error::SqliteFailure(err, _) = &e {
            if matches!(
                err.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ) {
                return StoreError::Busy;
            }
        }
        StoreError::Sqlite {
            message: e.to_string(),
        }
    }
}

/// Convenience type alias.
pub type StoreResult<T> = Result<T, StoreError>;
