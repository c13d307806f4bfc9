//! Per-child steps shared by reconciliation, single-prompt operations and
//! cascade deletion. Every helper runs inside the caller's [`UnitOfWork`].
//!
//! Each unit opens with one of the `lock_*` helpers. They are writes, so the
//! unit takes SQLite's write lock with its first statement and waits on the
//! busy timeout instead of failing an upgrade from a read lock.

use atelier_core::error::CoreError;
use atelier_core::reconcile::{ImageAction, PersistedPrompt};
use atelier_core::types::DbId;
use atelier_db::models::project::Project;
use atelier_db::models::prompt::{CreatePrompt, Prompt, UpdatePrompt};
use atelier_db::models::request::Request;
use atelier_db::repositories::{ProjectRepo, PromptRepo, RequestRepo};

use crate::error::EngineResult;
use crate::unit_of_work::UnitOfWork;

/// Bump the request version as the first write of the unit.
///
/// `expected_version`, when supplied, must match the stored version or the
/// call fails with `Conflict`. A missing request is `NotFound`.
pub async fn lock_request(
    uow: &mut UnitOfWork,
    request_id: DbId,
    expected_version: Option<i64>,
) -> EngineResult<Request> {
    let bumped = RequestRepo::bump_version(uow.conn(), request_id, expected_version).await?;
    if let Some(request) = bumped {
        return Ok(request);
    }
    match RequestRepo::find_by_id(uow.conn(), request_id).await? {
        Some(current) => Err(CoreError::Conflict(format!(
            "Request {request_id} is at version {}, caller observed version {}",
            current.version,
            expected_version.unwrap_or_default()
        ))
        .into()),
        None => Err(CoreError::not_found("Request", request_id).into()),
    }
}

/// Bump the version of the request owning `prompt_id`.
///
/// A missing prompt is `NotFound`.
pub async fn lock_prompt_request(uow: &mut UnitOfWork, prompt_id: DbId) -> EngineResult<Request> {
    RequestRepo::bump_version_for_prompt(uow.conn(), prompt_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Prompt", prompt_id).into())
}

/// Touch a project row as the first write of the unit. A missing project
/// is `NotFound`.
pub async fn lock_project(uow: &mut UnitOfWork, project_id: DbId) -> EngineResult<Project> {
    ProjectRepo::touch(uow.conn(), project_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Project", project_id).into())
}

/// Insert a prompt, storing its image first when one is supplied.
pub async fn insert_prompt(
    uow: &mut UnitOfWork,
    request_id: DbId,
    position: i64,
    text: &str,
    image: Option<&[u8]>,
) -> EngineResult<Prompt> {
    let image = match image {
        Some(bytes) => Some(uow.create_blob(bytes).await?),
        None => None,
    };
    let prompt = PromptRepo::create(
        uow.conn(),
        &CreatePrompt {
            request_id,
            position,
            text: text.to_string(),
            image,
        },
    )
    .await?;
    tracing::debug!(
        request_id,
        prompt_id = prompt.id,
        has_image = image.is_some(),
        "Prompt created"
    );
    Ok(prompt)
}

/// Rewrite an existing prompt's text and apply `action` to its image.
///
/// The prompt keeps its id. `position` is left as is when `None`.
pub async fn rewrite_prompt(
    uow: &mut UnitOfWork,
    prompt_id: DbId,
    position: Option<i64>,
    text: &str,
    action: ImageAction,
) -> EngineResult<Prompt> {
    let image = match action {
        ImageAction::Untouched => None,
        ImageAction::Attach(bytes) => Some(uow.create_blob(&bytes).await?),
        ImageAction::Detach(blob_id) => {
            uow.discard_blob(blob_id);
            None
        }
        ImageAction::Replace(blob_id, bytes) => {
            uow.replace_blob(blob_id, &bytes).await?;
            Some(blob_id)
        }
    };

    let input = UpdatePrompt {
        text: text.to_string(),
        image,
        position,
    };
    let prompt = PromptRepo::update(uow.conn(), prompt_id, &input)
        .await?
        .ok_or_else(|| CoreError::not_found("Prompt", prompt_id))?;
    tracing::debug!(prompt_id, has_image = image.is_some(), "Prompt rewritten");
    Ok(prompt)
}

/// Delete a prompt row and stage its image for deletion.
pub async fn discard_prompt(uow: &mut UnitOfWork, prompt: PersistedPrompt) -> EngineResult<()> {
    if let Some(blob_id) = prompt.image {
        uow.discard_blob(blob_id);
    }
    if !PromptRepo::delete(uow.conn(), prompt.id).await? {
        return Err(CoreError::not_found("Prompt", prompt.id).into());
    }
    tracing::debug!(prompt_id = prompt.id, "Prompt deleted");
    Ok(())
}

/// Delete a request with all of its prompts, staging every blob it references.
///
/// Returns the number of prompts removed.
pub async fn discard_request(uow: &mut UnitOfWork, request: &Request) -> EngineResult<usize> {
    let prompts = PromptRepo::list_by_request(uow.conn(), request.id).await?;
    for prompt in &prompts {
        discard_prompt(uow, prompt.persisted()).await?;
    }
    if let Some(blob_id) = request.output_image {
        uow.discard_blob(blob_id);
    }
    if !RequestRepo::delete(uow.conn(), request.id).await? {
        return Err(CoreError::not_found("Request", request.id).into());
    }
    tracing::debug!(request_id = request.id, prompts = prompts.len(), "Request deleted");
    Ok(prompts.len())
}
