//! Reconciliation engine for project / request / prompt aggregates.
//!
//! Coordinates the relational store (`atelier_db`) and a blob store
//! (`atelier_storage`) so that every prompt image and request output a row
//! references exists, and every blob a row stops referencing is deleted.
//!
//! [`Atelier::connect`] wires the pieces together from an [`EngineConfig`].

pub mod cascade;
pub mod children;
pub mod config;
pub mod error;
pub mod generation;
pub mod projects;
pub mod prompts;
pub mod reconcile;
pub mod sweep;
pub mod unit_of_work;

use std::sync::Arc;

use atelier_core::blob::BlobStore;
use atelier_core::reconcile::StaleIdPolicy;
use atelier_db::DbPool;

pub use cascade::{CascadeDeleter, CascadeReport};
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use generation::{ImageGenerator, StaticImageGenerator};
pub use projects::ProjectService;
pub use prompts::{NewPrompt, PromptService};
pub use reconcile::{NewRequest, ReconciliationEngine, RequestUpdate};
pub use sweep::OrphanSweeper;
pub use unit_of_work::{CommitReport, RollbackReport, UnitOfWork};

/// Handle bundling the pool, the blob store and every service built on them.
#[derive(Clone)]
pub struct Atelier {
    pool: DbPool,
    blobs: Arc<dyn BlobStore>,
    policy: StaleIdPolicy,
}

impl Atelier {
    /// Open the pool, apply migrations and open the blob backend.
    pub async fn connect(config: &EngineConfig) -> EngineResult<Self> {
        let pool = atelier_db::create_pool(&config.database_url, config.max_connections).await?;
        atelier_db::run_migrations(&pool).await?;
        let blobs = atelier_storage::open(&config.blob_backend).await?;
        tracing::info!(
            backend = config.blob_backend.name(),
            stale_id_policy = config.stale_id_policy.name(),
            "Engine connected"
        );
        Ok(Self::new(pool, blobs, config.stale_id_policy))
    }

    pub fn new(pool: DbPool, blobs: Arc<dyn BlobStore>, policy: StaleIdPolicy) -> Self {
        Self {
            pool,
            blobs,
            policy,
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    pub fn requests(&self) -> ReconciliationEngine {
        ReconciliationEngine::new(self.pool.clone(), Arc::clone(&self.blobs), self.policy)
    }

    pub fn prompts(&self) -> PromptService {
        PromptService::new(self.pool.clone(), Arc::clone(&self.blobs))
    }

    pub fn projects(&self) -> ProjectService {
        ProjectService::new(self.pool.clone(), Arc::clone(&self.blobs))
    }

    pub fn cascade(&self) -> CascadeDeleter {
        CascadeDeleter::new(self.pool.clone(), Arc::clone(&self.blobs))
    }

    pub fn sweeper(&self) -> OrphanSweeper {
        OrphanSweeper::new(self.pool.clone(), Arc::clone(&self.blobs))
    }
}
