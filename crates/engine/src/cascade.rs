//! Cascade deletion of requests and projects.
//!
//! Children go before parents within one branch. All rows of one call are
//! removed in a single [`UnitOfWork`], and every blob they referenced is
//! deleted once the rows have committed.

use std::sync::Arc;

use atelier_core::blob::BlobStore;
use atelier_core::error::CoreError;
use atelier_core::types::{BlobId, DbId};
use atelier_db::repositories::{ProjectRepo, RequestRepo};
use atelier_db::DbPool;
use serde::Serialize;

use crate::children::{discard_request, lock_project, lock_request};
use crate::error::EngineResult;
use crate::unit_of_work::UnitOfWork;

/// What a cascade removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub requests_deleted: usize,
    pub prompts_deleted: usize,
    pub blobs_deleted: usize,
    /// Blobs whose deferred delete failed; left for the orphan sweep.
    pub orphaned: Vec<BlobId>,
}

#[derive(Clone)]
pub struct CascadeDeleter {
    pool: DbPool,
    blobs: Arc<dyn BlobStore>,
}

impl CascadeDeleter {
    pub fn new(pool: DbPool, blobs: Arc<dyn BlobStore>) -> Self {
        Self { pool, blobs }
    }

    /// Delete a request, its prompts and every blob they reference.
    pub async fn delete_request(&self, request_id: DbId) -> EngineResult<CascadeReport> {
        let mut uow = UnitOfWork::begin(&self.pool, Arc::clone(&self.blobs)).await?;
        let result = delete_request_in(&mut uow, request_id).await;
        let report = finish(uow, result).await?;
        tracing::info!(
            request_id,
            prompts = report.prompts_deleted,
            blobs = report.blobs_deleted,
            "Request deleted"
        );
        Ok(report)
    }

    /// Delete a project and everything beneath it.
    pub async fn delete_project(&self, project_id: DbId) -> EngineResult<CascadeReport> {
        let mut uow = UnitOfWork::begin(&self.pool, Arc::clone(&self.blobs)).await?;
        let result = delete_project_in(&mut uow, project_id).await;
        let report = finish(uow, result).await?;
        tracing::info!(
            project_id,
            requests = report.requests_deleted,
            prompts = report.prompts_deleted,
            blobs = report.blobs_deleted,
            "Project deleted"
        );
        Ok(report)
    }
}

async fn delete_request_in(
    uow: &mut UnitOfWork,
    request_id: DbId,
) -> EngineResult<CascadeReport> {
    let request = lock_request(uow, request_id, None).await?;
    let prompts_deleted = discard_request(uow, &request).await?;
    Ok(CascadeReport {
        requests_deleted: 1,
        prompts_deleted,
        ..Default::default()
    })
}

async fn delete_project_in(
    uow: &mut UnitOfWork,
    project_id: DbId,
) -> EngineResult<CascadeReport> {
    lock_project(uow, project_id).await?;

    let mut report = CascadeReport::default();
    for request in RequestRepo::list_by_project(uow.conn(), project_id).await? {
        report.prompts_deleted += discard_request(uow, &request).await?;
        report.requests_deleted += 1;
    }
    if !ProjectRepo::delete(uow.conn(), project_id).await? {
        return Err(CoreError::not_found("Project", project_id).into());
    }
    Ok(report)
}

/// Commit or roll back, folding the blob outcome into the report.
async fn finish(
    uow: UnitOfWork,
    result: EngineResult<CascadeReport>,
) -> EngineResult<CascadeReport> {
    match result {
        Ok(mut report) => {
            let committed = uow.commit().await?;
            report.blobs_deleted = committed.blobs_deleted;
            report.orphaned = committed.orphaned;
            Ok(report)
        }
        Err(err) => {
            uow.rollback().await;
            Err(err)
        }
    }
}
