//! In-process blob backend.

use std::collections::HashMap;

use async_trait::async_trait;
use atelier_core::blob::{BlobError, BlobStore};
use atelier_core::types::BlobId;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Blob store holding everything in a map. Contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<BlobId, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn create(&self, content: &[u8]) -> Result<BlobId, BlobError> {
        let id = Uuid::new_v4();
        self.blobs.write().await.insert(id, content.to_vec());
        Ok(id)
    }

    async fn read(&self, id: BlobId) -> Result<Vec<u8>, BlobError> {
        self.blobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(BlobError::NotFound(id))
    }

    async fn update(&self, id: BlobId, content: &[u8]) -> Result<(), BlobError> {
        match self.blobs.write().await.get_mut(&id) {
            Some(slot) => {
                *slot = content.to_vec();
                Ok(())
            }
            None => Err(BlobError::NotFound(id)),
        }
    }

    async fn delete(&self, id: BlobId) -> Result<(), BlobError> {
        self.blobs.write().await.remove(&id);
        Ok(())
    }

    async fn exists(&self, id: BlobId) -> Result<bool, BlobError> {
        Ok(self.blobs.read().await.contains_key(&id))
    }

    async fn list(&self) -> Result<Vec<BlobId>, BlobError> {
        Ok(self.blobs.read().await.keys().copied().collect())
    }

    async fn delete_all(&self) -> Result<(), BlobError> {
        self.blobs.write().await.clear();
        Ok(())
    }
}
