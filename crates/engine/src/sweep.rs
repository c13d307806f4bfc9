//! Orphaned blob sweep.
//!
//! Reclaims blobs that no row references, such as those left by a failed
//! deferred delete or an abandoned unit of work. Run it in a maintenance
//! window: a blob created by an in-flight unit is not referenced until that
//! unit commits and would be swept.

use std::collections::HashSet;
use std::sync::Arc;

use atelier_core::blob::BlobStore;
use atelier_core::sweep::{find_orphans, SweepReport};
use atelier_db::repositories::BlobRefRepo;
use atelier_db::DbPool;

use crate::error::EngineResult;

#[derive(Clone)]
pub struct OrphanSweeper {
    pool: DbPool,
    blobs: Arc<dyn BlobStore>,
}

impl OrphanSweeper {
    pub fn new(pool: DbPool, blobs: Arc<dyn BlobStore>) -> Self {
        Self { pool, blobs }
    }

    /// Delete every stored blob no prompt or request references.
    ///
    /// With `dry_run` the orphans are only counted. Individual delete
    /// failures are collected into the report rather than aborting.
    pub async fn sweep(&self, dry_run: bool) -> EngineResult<SweepReport> {
        let stored = self.blobs.list().await?;
        let referenced: HashSet<_> = {
            let mut conn = self.pool.acquire().await?;
            BlobRefRepo::list_referenced(&mut conn).await?.into_iter().collect()
        };
        let orphans = find_orphans(&stored, &referenced);

        let mut report = SweepReport {
            blobs_scanned: stored.len(),
            orphans_found: orphans.len(),
            dry_run,
            ..Default::default()
        };

        if !dry_run {
            for id in orphans {
                match self.blobs.delete(id).await {
                    Ok(()) => report.orphans_deleted += 1,
                    Err(e) => {
                        tracing::warn!(blob_id = %id, error = %e, "Failed to delete orphaned blob");
                        report.errors.push(format!("{id}: {e}"));
                    }
                }
            }
        }

        tracing::info!(
            scanned = report.blobs_scanned,
            found = report.orphans_found,
            deleted = report.orphans_deleted,
            dry_run,
            "Orphan sweep complete"
        );
        Ok(report)
    }
}
