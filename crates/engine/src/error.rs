use atelier_core::blob::BlobError;
use atelier_core::error::{CoreError, ErrorKind};
use atelier_db::error::classify_sqlx_error;

/// Error returned by every engine operation.
///
/// Wraps [`CoreError`] for domain errors and carries database and blob
/// backend failures unchanged. [`EngineError::kind`] maps any of them onto
/// the caller-facing taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A domain-level error from `atelier_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A blob backend error.
    #[error(transparent)]
    Blob(#[from] BlobError),
}

/// Convenience type alias for engine return values.
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Core(core) => core.kind(),
            EngineError::Database(err) => classify_sqlx_error(err),
            EngineError::Blob(BlobError::NotFound(_)) => ErrorKind::NotFound,
            EngineError::Blob(_) => ErrorKind::Storage,
        }
    }
}

impl From<sqlx::migrate::MigrateError> for EngineError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        EngineError::Core(CoreError::Internal(format!("Migration failed: {err}")))
    }
}
