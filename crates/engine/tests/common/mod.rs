//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use atelier_core::blob::{BlobError, BlobStore};
use atelier_core::reconcile::{PromptSpec, StaleIdPolicy, TargetList};
use atelier_core::types::{BlobId, DbId};
use atelier_engine::Atelier;
use atelier_storage::MemoryBlobStore;
use sqlx::SqlitePool;

// ---------------------------------------------------------------------------
// Failure-injecting blob store
// ---------------------------------------------------------------------------

/// Memory store whose creates and deletes can be made to fail on demand.
#[derive(Default)]
pub struct FlakyBlobStore {
    inner: MemoryBlobStore,
    /// `Some(n)`: the next `n` creates succeed, every later one fails.
    creates_left: Mutex<Option<usize>>,
    fail_deletes: AtomicBool,
}

impl FlakyBlobStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_creates_after(&self, successes: usize) {
        *self.creates_left.lock().unwrap() = Some(successes);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.inner.len().await
    }
}

#[async_trait]
impl BlobStore for FlakyBlobStore {
    fn backend_name(&self) -> &'static str {
        "flaky"
    }

    async fn create(&self, content: &[u8]) -> Result<BlobId, BlobError> {
        {
            let mut left = self.creates_left.lock().unwrap();
            match left.as_mut() {
                Some(0) => return Err(BlobError::Backend("injected create failure".into())),
                Some(n) => *n -= 1,
                None => {}
            }
        }
        self.inner.create(content).await
    }

    async fn read(&self, id: BlobId) -> Result<Vec<u8>, BlobError> {
        self.inner.read(id).await
    }

    async fn update(&self, id: BlobId, content: &[u8]) -> Result<(), BlobError> {
        self.inner.update(id, content).await
    }

    async fn delete(&self, id: BlobId) -> Result<(), BlobError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(BlobError::Backend("injected delete failure".into()));
        }
        self.inner.delete(id).await
    }

    async fn exists(&self, id: BlobId) -> Result<bool, BlobError> {
        self.inner.exists(id).await
    }

    async fn list(&self) -> Result<Vec<BlobId>, BlobError> {
        self.inner.list().await
    }

    async fn delete_all(&self) -> Result<(), BlobError> {
        self.inner.delete_all().await
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn atelier(pool: SqlitePool, blobs: Arc<dyn BlobStore>) -> Atelier {
    Atelier::new(pool, blobs, StaleIdPolicy::CreateOnStaleId)
}

pub fn memory_atelier(pool: SqlitePool) -> (Atelier, Arc<MemoryBlobStore>) {
    let blobs = Arc::new(MemoryBlobStore::new());
    (atelier(pool, blobs.clone()), blobs)
}

pub fn entry(id: Option<DbId>, text: &str, image: Option<&[u8]>) -> PromptSpec {
    PromptSpec {
        id,
        text: text.to_string(),
        image: image.map(<[u8]>::to_vec),
    }
}

pub fn target(entries: Vec<PromptSpec>) -> TargetList {
    TargetList::new(entries).unwrap()
}

pub async fn seed_project(atelier: &Atelier, name: &str) -> DbId {
    atelier.projects().create(name).await.unwrap().id
}
