use std::fmt::Display;

use crate::blob::BlobError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Caller-facing error taxonomy every failure is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Storage,
    Internal,
}

impl CoreError {
    /// Shorthand for a [`CoreError::NotFound`] over any displayable id.
    pub fn not_found(entity: &'static str, id: impl Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<BlobError> for CoreError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::NotFound(id) => CoreError::not_found("Blob", id),
            other => CoreError::Storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_formats_entity_and_id() {
        let err = CoreError::not_found("Prompt", 42);
        assert_eq!(err.to_string(), "Entity not found: Prompt with id 42");
    }

    #[test]
    fn missing_blob_stays_not_found() {
        let id = uuid::Uuid::new_v4();
        let err: CoreError = BlobError::NotFound(id).into();
        assert!(matches!(err, CoreError::NotFound { entity: "Blob", .. }));
    }

    #[test]
    fn backend_failure_becomes_storage() {
        let err: CoreError = BlobError::Backend("disk full".into()).into();
        assert!(matches!(err, CoreError::Storage(ref msg) if msg.contains("disk full")));
        assert_eq!(err.kind(), ErrorKind::Storage);
    }
}
