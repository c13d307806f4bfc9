//! Reconciliation engine: applies a target prompt list to a request.
//!
//! Each call runs in one [`UnitOfWork`]:
//! 1. bump the request version (optionally guarded by the caller's token),
//! 2. load the persisted prompts and plan with
//!    [`atelier_core::reconcile::plan_reconciliation`],
//! 3. apply creates and updates in target order, then deletes,
//! 4. commit, then delete the blobs the plan stopped referencing.

use std::sync::Arc;

use atelier_core::blob::BlobStore;
use atelier_core::error::CoreError;
use atelier_core::reconcile::{
    plan_reconciliation, PersistedPrompt, PlannedWrite, StaleIdPolicy, TargetList,
};
use atelier_core::types::DbId;
use atelier_db::models::request::{CreateRequest, Request, RequestWithPrompts};
use atelier_db::repositories::{ProjectRepo, PromptRepo, RequestRepo};
use atelier_db::DbPool;
use serde::Serialize;

use crate::children::{discard_prompt, insert_prompt, lock_project, lock_request, rewrite_prompt};
use crate::error::EngineResult;
use crate::generation::ImageGenerator;
use crate::unit_of_work::UnitOfWork;

/// Input for [`ReconciliationEngine::create_request`].
#[derive(Debug, Clone)]
pub struct NewRequest {
    pub project_id: DbId,
    pub target: TargetList,
}

/// Input for [`ReconciliationEngine::reconcile`].
#[derive(Debug, Clone, Default)]
pub struct RequestUpdate {
    /// Must equal the stored owner when supplied; the owner never changes.
    pub project_id: Option<DbId>,
    /// Version the caller last observed. `None` skips the staleness check.
    pub expected_version: Option<i64>,
    pub target: TargetList,
}

/// Counts of the row operations one reconciliation applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

#[derive(Clone)]
pub struct ReconciliationEngine {
    pool: DbPool,
    blobs: Arc<dyn BlobStore>,
    policy: StaleIdPolicy,
}

impl ReconciliationEngine {
    pub fn new(pool: DbPool, blobs: Arc<dyn BlobStore>, policy: StaleIdPolicy) -> Self {
        Self {
            pool,
            blobs,
            policy,
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Load a request with its prompts.
    pub async fn get_request(&self, request_id: DbId) -> EngineResult<RequestWithPrompts> {
        let mut conn = self.pool.acquire().await?;
        let request = RequestRepo::find_by_id(&mut conn, request_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Request", request_id))?;
        let prompts = PromptRepo::list_by_request(&mut conn, request_id).await?;
        Ok(RequestWithPrompts { request, prompts })
    }

    /// List the requests of a project.
    pub async fn list_requests(&self, project_id: DbId) -> EngineResult<Vec<Request>> {
        let mut conn = self.pool.acquire().await?;
        ProjectRepo::find_by_id(&mut conn, project_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Project", project_id))?;
        Ok(RequestRepo::list_by_project(&mut conn, project_id).await?)
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Create a request under an existing project with an initial prompt list.
    pub async fn create_request(&self, input: NewRequest) -> EngineResult<RequestWithPrompts> {
        let mut uow = UnitOfWork::begin(&self.pool, Arc::clone(&self.blobs)).await?;
        let result = self.create_request_in(&mut uow, &input).await;
        let created = uow.finish(result).await?;
        tracing::info!(
            request_id = created.request.id,
            project_id = input.project_id,
            prompts = created.prompts.len(),
            "Request created"
        );
        Ok(created)
    }

    async fn create_request_in(
        &self,
        uow: &mut UnitOfWork,
        input: &NewRequest,
    ) -> EngineResult<RequestWithPrompts> {
        lock_project(uow, input.project_id).await?;
        let request = RequestRepo::create(
            uow.conn(),
            &CreateRequest {
                project_id: input.project_id,
            },
        )
        .await?;
        self.apply(uow, request.id, &[], &input.target).await?;
        let prompts = PromptRepo::list_by_request(uow.conn(), request.id).await?;
        Ok(RequestWithPrompts { request, prompts })
    }

    /// Synchronise a request's prompts with `update.target`.
    pub async fn reconcile(
        &self,
        request_id: DbId,
        update: RequestUpdate,
    ) -> EngineResult<RequestWithPrompts> {
        let mut uow = UnitOfWork::begin(&self.pool, Arc::clone(&self.blobs)).await?;
        let result = self.reconcile_in(&mut uow, request_id, &update).await;
        let (refreshed, summary) = uow.finish(result).await?;
        tracing::info!(
            request_id,
            version = refreshed.request.version,
            created = summary.created,
            updated = summary.updated,
            deleted = summary.deleted,
            "Request reconciled"
        );
        Ok(refreshed)
    }

    async fn reconcile_in(
        &self,
        uow: &mut UnitOfWork,
        request_id: DbId,
        update: &RequestUpdate,
    ) -> EngineResult<(RequestWithPrompts, ReconcileSummary)> {
        let request = lock_request(uow, request_id, update.expected_version).await?;
        if let Some(project_id) = update.project_id {
            if project_id != request.project_id {
                return Err(CoreError::Validation(format!(
                    "Request {request_id} belongs to project {}, not {project_id}",
                    request.project_id
                ))
                .into());
            }
        }

        let current: Vec<PersistedPrompt> = PromptRepo::list_by_request(uow.conn(), request_id)
            .await?
            .iter()
            .map(|p| p.persisted())
            .collect();
        let summary = self.apply(uow, request_id, &current, &update.target).await?;

        let prompts = PromptRepo::list_by_request(uow.conn(), request_id).await?;
        Ok((RequestWithPrompts { request, prompts }, summary))
    }

    /// Plan against `current` and apply: writes in target order, deletes last.
    async fn apply(
        &self,
        uow: &mut UnitOfWork,
        request_id: DbId,
        current: &[PersistedPrompt],
        target: &TargetList,
    ) -> EngineResult<ReconcileSummary> {
        let plan = plan_reconciliation(current, target, self.policy)?;
        let summary = ReconcileSummary {
            created: plan.create_count(),
            updated: plan.update_count(),
            deleted: plan.delete_count(),
        };

        for write in plan.writes {
            match write {
                PlannedWrite::Create {
                    position,
                    text,
                    image,
                    stale_id,
                } => {
                    if let Some(stale_id) = stale_id {
                        tracing::debug!(
                            request_id,
                            stale_id,
                            "Unmatched prompt id, creating instead"
                        );
                    }
                    insert_prompt(uow, request_id, position as i64, &text, image.as_deref()).await?;
                }
                PlannedWrite::Update {
                    position,
                    prompt_id,
                    text,
                    image,
                } => {
                    rewrite_prompt(uow, prompt_id, Some(position as i64), &text, image).await?;
                }
            }
        }

        for prompt in plan.deletes {
            discard_prompt(uow, prompt).await?;
        }

        Ok(summary)
    }

    /// Generate and attach a new output image.
    ///
    /// The generator runs outside the transaction on a snapshot of the
    /// request. If the request changed meanwhile the call fails with
    /// `Conflict` and the generated bytes are never stored. The previous
    /// output blob is deleted after commit.
    pub async fn generate_output(
        &self,
        request_id: DbId,
        generator: &dyn ImageGenerator,
    ) -> EngineResult<RequestWithPrompts> {
        let snapshot = self.get_request(request_id).await?;
        if snapshot.prompts.is_empty() {
            return Err(CoreError::Validation(format!(
                "Request {request_id} has no prompts to generate from"
            ))
            .into());
        }
        let bytes = generator.generate(&snapshot).await?;

        let mut uow = UnitOfWork::begin(&self.pool, Arc::clone(&self.blobs)).await?;
        let result = attach_output(&mut uow, &snapshot, &bytes).await;
        let request = uow.finish(result).await?;
        tracing::info!(
            request_id,
            version = request.version,
            size = bytes.len(),
            "Output image generated"
        );

        Ok(RequestWithPrompts {
            request,
            prompts: snapshot.prompts,
        })
    }
}

async fn attach_output(
    uow: &mut UnitOfWork,
    snapshot: &RequestWithPrompts,
    bytes: &[u8],
) -> EngineResult<Request> {
    let request_id = snapshot.request.id;
    lock_request(uow, request_id, Some(snapshot.request.version)).await?;

    let blob_id = uow.create_blob(bytes).await?;
    let request = RequestRepo::set_output_image(uow.conn(), request_id, Some(blob_id))
        .await?
        .ok_or_else(|| CoreError::not_found("Request", request_id))?;
    if let Some(previous) = snapshot.request.output_image {
        uow.discard_blob(previous);
    }
    Ok(request)
}
