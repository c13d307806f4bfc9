//! Blob store backends.
//!
//! - [`LocalBlobStore`] keeps each blob as a file under a root directory.
//! - [`MemoryBlobStore`] keeps blobs in a process-local map (tests, ephemeral runs).
//!
//! Callers normally go through [`open`] with a [`BlobBackend`] taken from
//! configuration and hold the result as `Arc<dyn BlobStore>`.

pub mod local;
pub mod memory;

use std::path::PathBuf;
use std::sync::Arc;

use atelier_core::blob::{BlobError, BlobStore};
use atelier_core::error::CoreError;

pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;

/// Which backend to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobBackend {
    Local { root: PathBuf },
    Memory,
}

impl BlobBackend {
    /// Parse from the `BLOB_BACKEND` configuration value.
    ///
    /// `root` is only used by the local backend.
    pub fn from_name(name: &str, root: impl Into<PathBuf>) -> Result<Self, CoreError> {
        match name.trim() {
            "local" => Ok(Self::Local { root: root.into() }),
            "memory" => Ok(Self::Memory),
            other => Err(CoreError::Validation(format!(
                "Unknown blob backend '{other}'. Must be one of: local, memory"
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Local { .. } => "local",
            Self::Memory => "memory",
        }
    }
}

/// Open the configured backend.
pub async fn open(backend: &BlobBackend) -> Result<Arc<dyn BlobStore>, BlobError> {
    let store: Arc<dyn BlobStore> = match backend {
        BlobBackend::Local { root } => Arc::new(LocalBlobStore::open(root.clone()).await?),
        BlobBackend::Memory => Arc::new(MemoryBlobStore::new()),
    };
    tracing::info!(backend = store.backend_name(), "Blob store opened");
    Ok(store)
}
