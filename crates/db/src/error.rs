//! Mapping of sqlx errors onto the caller-facing error taxonomy.

use atelier_core::error::ErrorKind;

/// Classify a sqlx error.
///
/// - `RowNotFound` is `NotFound`.
/// - Unique and foreign-key violations are `Conflict`.
/// - Check and not-null violations are `Validation`.
/// - Everything else is `Internal`.
pub fn classify_sqlx_error(err: &sqlx::Error) -> ErrorKind {
    match err {
        sqlx::Error::RowNotFound => ErrorKind::NotFound,
        sqlx::Error::Database(db_err) => match db_err.kind() {
            sqlx::error::ErrorKind::UniqueViolation
            | sqlx::error::ErrorKind::ForeignKeyViolation => ErrorKind::Conflict,
            sqlx::error::ErrorKind::CheckViolation
            | sqlx::error::ErrorKind::NotNullViolation => ErrorKind::Validation,
            _ => ErrorKind::Internal,
        },
        _ => ErrorKind::Internal,
    }
}
