//! Blob store capability contract.
//!
//! A blob store holds opaque byte content keyed by [`BlobId`]. It knows
//! nothing about prompts or requests; references are one-directional from
//! the relational rows to the store. Backends live in `atelier_storage`.

use async_trait::async_trait;

use crate::types::BlobId;

/// Errors raised by a blob backend.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("Blob {0} not found")]
    NotFound(BlobId),

    #[error("Blob I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Blob backend error: {0}")]
    Backend(String),
}

/// Content-addressed binary storage.
///
/// Read-after-write is consistent for every implementation: a `read` issued
/// after a successful `create` or `update` observes the written bytes.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Short backend name used in log fields.
    fn backend_name(&self) -> &'static str;

    /// Persist `content` under a freshly generated id.
    async fn create(&self, content: &[u8]) -> Result<BlobId, BlobError>;

    /// Return the stored bytes, or [`BlobError::NotFound`].
    async fn read(&self, id: BlobId) -> Result<Vec<u8>, BlobError>;

    /// Replace the content of an existing blob, keeping its id.
    ///
    /// Updating an id that is not stored is [`BlobError::NotFound`]; the
    /// store never creates a blob under a caller-chosen id.
    async fn update(&self, id: BlobId, content: &[u8]) -> Result<(), BlobError>;

    /// Remove a blob. Removing an absent id succeeds.
    async fn delete(&self, id: BlobId) -> Result<(), BlobError>;

    /// Whether a blob with this id is stored.
    async fn exists(&self, id: BlobId) -> Result<bool, BlobError>;

    /// Every id currently stored, in no particular order.
    async fn list(&self) -> Result<Vec<BlobId>, BlobError>;

    /// Remove every blob. Reset tooling only.
    async fn delete_all(&self) -> Result<(), BlobError>;
}
