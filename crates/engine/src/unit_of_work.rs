//! Transaction coordinator spanning the relational store and the blob store.
//!
//! A [`UnitOfWork`] owns one SQLite transaction. Row changes commit or roll
//! back together; blob side effects are staged around that boundary:
//!
//! - blobs created during the unit are remembered and deleted again if the
//!   unit rolls back;
//! - blobs the unit stops referencing are only *staged* for deletion and
//!   removed after the rows commit, so a failure can leave an orphan but
//!   never a row pointing at a missing blob;
//! - in-place content replacement cannot be undone and is logged as such.
//!
//! The transaction is opened deferred. Callers make their first statement a
//! write (see `crate::children`), so concurrent units queue on SQLite's
//! busy timeout rather than failing to upgrade a read lock.
//!
//! A unit dropped without `commit` or `rollback` rolls its rows back (sqlx
//! does that when the transaction is dropped). Blobs it created stay behind
//! as orphans for [`crate::sweep::OrphanSweeper`].

use std::sync::Arc;

use atelier_core::blob::BlobStore;
use atelier_core::types::BlobId;
use atelier_db::DbPool;
use serde::Serialize;
use sqlx::{Sqlite, SqliteConnection, Transaction};

use crate::error::EngineResult;

/// Blob-side effects of a committed unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitReport {
    pub blobs_created: usize,
    pub blobs_deleted: usize,
    /// Staged deletions that failed after commit. The rows no longer
    /// reference these blobs; the sweep reclaims them.
    pub orphaned: Vec<BlobId>,
}

/// Blob-side effects of a rolled back unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RollbackReport {
    pub blobs_compensated: usize,
    /// Created blobs whose compensating delete failed.
    pub orphaned: Vec<BlobId>,
}

pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
    blobs: Arc<dyn BlobStore>,
    created: Vec<BlobId>,
    doomed: Vec<BlobId>,
    replaced: Vec<BlobId>,
}

impl UnitOfWork {
    /// Open a transaction on `pool`.
    pub async fn begin(pool: &DbPool, blobs: Arc<dyn BlobStore>) -> EngineResult<Self> {
        let tx = pool.begin().await?;
        Ok(Self {
            tx,
            blobs,
            created: Vec::new(),
            doomed: Vec::new(),
            replaced: Vec::new(),
        })
    }

    /// The transaction's connection, for repository calls.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut *self.tx
    }

    // ── Blob operations ──────────────────────────────────────────────

    /// Store `content` as a new blob. Compensated on rollback.
    pub async fn create_blob(&mut self, content: &[u8]) -> EngineResult<BlobId> {
        let id = self.blobs.create(content).await?;
        tracing::debug!(blob_id = %id, size = content.len(), "Blob staged for create");
        self.created.push(id);
        Ok(id)
    }

    /// Overwrite an existing blob in place. Not undone on rollback.
    pub async fn replace_blob(&mut self, id: BlobId, content: &[u8]) -> EngineResult<()> {
        self.blobs.update(id, content).await?;
        tracing::debug!(blob_id = %id, size = content.len(), "Blob replaced in place");
        self.replaced.push(id);
        Ok(())
    }

    /// Stage a blob for deletion once the rows have committed.
    pub fn discard_blob(&mut self, id: BlobId) {
        tracing::debug!(blob_id = %id, "Blob staged for delete");
        self.doomed.push(id);
    }

    /// Blobs currently staged for deletion.
    pub fn staged_deletes(&self) -> &[BlobId] {
        &self.doomed
    }

    // ── Completion ───────────────────────────────────────────────────

    /// Commit the rows, then perform the staged blob deletions.
    ///
    /// A failed deletion after a successful commit does not fail the call;
    /// it is logged and reported in [`CommitReport::orphaned`]. If the
    /// commit itself fails, blobs created by this unit are compensated.
    pub async fn commit(self) -> EngineResult<CommitReport> {
        let Self {
            tx,
            blobs,
            created,
            doomed,
            replaced: _,
        } = self;

        if let Err(err) = tx.commit().await {
            compensate(blobs.as_ref(), &created).await;
            return Err(err.into());
        }

        let mut report = CommitReport {
            blobs_created: created.len(),
            ..Default::default()
        };
        for id in doomed {
            match blobs.delete(id).await {
                Ok(()) => report.blobs_deleted += 1,
                Err(err) => {
                    tracing::warn!(
                        blob_id = %id,
                        error = %err,
                        "Deferred blob delete failed, blob orphaned"
                    );
                    report.orphaned.push(id);
                }
            }
        }
        Ok(report)
    }

    /// Roll the rows back and delete the blobs this unit created.
    ///
    /// Staged deletions are dropped: the restored rows still reference them.
    pub async fn rollback(self) -> RollbackReport {
        let Self {
            tx,
            blobs,
            created,
            doomed: _,
            replaced,
        } = self;

        if let Err(err) = tx.rollback().await {
            tracing::warn!(error = %err, "Transaction rollback failed");
        }
        if !replaced.is_empty() {
            tracing::warn!(
                blobs = ?replaced,
                "Rolled back unit had replaced blob content in place; new content kept"
            );
        }

        let orphaned = compensate(blobs.as_ref(), &created).await;
        RollbackReport {
            blobs_compensated: created.len() - orphaned.len(),
            orphaned,
        }
    }

    /// Commit on `Ok`, roll back on `Err`, and pass the result through.
    pub async fn finish<T>(self, result: EngineResult<T>) -> EngineResult<T> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                let report = self.rollback().await;
                tracing::debug!(
                    error = %err,
                    compensated = report.blobs_compensated,
                    "Unit of work rolled back"
                );
                Err(err)
            }
        }
    }
}

/// Delete `created`, returning the ids whose delete failed.
async fn compensate(blobs: &dyn BlobStore, created: &[BlobId]) -> Vec<BlobId> {
    let mut orphaned = Vec::new();
    for &id in created {
        if let Err(err) = blobs.delete(id).await {
            tracing::warn!(blob_id = %id, error = %err, "Compensating blob delete failed");
            orphaned.push(id);
        }
    }
    orphaned
}
