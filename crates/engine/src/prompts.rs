//! Single-prompt operations.
//!
//! Each write bumps the owning request's version, so a concurrent
//! reconciliation holding an older token fails with `Conflict`.

use std::sync::Arc;

use atelier_core::blob::BlobStore;
use atelier_core::error::CoreError;
use atelier_core::reconcile::{ImageAction, PromptSpec};
use atelier_core::types::DbId;
use atelier_db::models::prompt::Prompt;
use atelier_db::repositories::PromptRepo;
use atelier_db::DbPool;

use crate::children::{
    discard_prompt, insert_prompt, lock_prompt_request, lock_request, rewrite_prompt,
};
use crate::error::EngineResult;
use crate::unit_of_work::UnitOfWork;

/// Input for [`PromptService::create`].
#[derive(Debug, Clone)]
pub struct NewPrompt {
    pub request_id: DbId,
    pub text: String,
    /// Empty bytes mean no image.
    pub image: Option<Vec<u8>>,
}

#[derive(Clone)]
pub struct PromptService {
    pool: DbPool,
    blobs: Arc<dyn BlobStore>,
}

impl PromptService {
    pub fn new(pool: DbPool, blobs: Arc<dyn BlobStore>) -> Self {
        Self { pool, blobs }
    }

    pub async fn get(&self, prompt_id: DbId) -> EngineResult<Prompt> {
        let mut conn = self.pool.acquire().await?;
        let prompt = PromptRepo::find_by_id(&mut conn, prompt_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Prompt", prompt_id))?;
        Ok(prompt)
    }

    /// Append a prompt after the highest existing position of a request.
    pub async fn create(&self, input: NewPrompt) -> EngineResult<Prompt> {
        let spec = PromptSpec {
            id: None,
            text: input.text,
            image: input.image,
        }
        .validate()?;
        let request_id = input.request_id;

        let mut uow = UnitOfWork::begin(&self.pool, Arc::clone(&self.blobs)).await?;
        let result = async {
            lock_request(&mut uow, request_id, None).await?;
            let position = PromptRepo::next_position(uow.conn(), request_id).await?;
            insert_prompt(&mut uow, request_id, position, &spec.text, spec.image.as_deref()).await
        }
        .await;
        let prompt = uow.finish(result).await?;
        tracing::info!(request_id, prompt_id = prompt.id, "Prompt created");
        Ok(prompt)
    }

    /// Rewrite a prompt's text and image. `None` (or empty bytes) detaches
    /// any existing image.
    pub async fn update(
        &self,
        prompt_id: DbId,
        text: String,
        image: Option<Vec<u8>>,
    ) -> EngineResult<Prompt> {
        let spec = PromptSpec {
            id: Some(prompt_id),
            text,
            image,
        }
        .validate()?;

        let mut uow = UnitOfWork::begin(&self.pool, Arc::clone(&self.blobs)).await?;
        let result = async {
            lock_prompt_request(&mut uow, prompt_id).await?;
            let existing = find_in(&mut uow, prompt_id).await?;
            let action = ImageAction::decide(existing.image, spec.image);
            rewrite_prompt(&mut uow, prompt_id, None, &spec.text, action).await
        }
        .await;
        let prompt = uow.finish(result).await?;
        tracing::info!(prompt_id, "Prompt updated");
        Ok(prompt)
    }

    /// Delete a prompt and its image.
    pub async fn delete(&self, prompt_id: DbId) -> EngineResult<()> {
        let mut uow = UnitOfWork::begin(&self.pool, Arc::clone(&self.blobs)).await?;
        let result = async {
            lock_prompt_request(&mut uow, prompt_id).await?;
            let existing = find_in(&mut uow, prompt_id).await?;
            discard_prompt(&mut uow, existing.persisted()).await
        }
        .await;
        uow.finish(result).await?;
        tracing::info!(prompt_id, "Prompt deleted");
        Ok(())
    }
}

async fn find_in(uow: &mut UnitOfWork, prompt_id: DbId) -> EngineResult<Prompt> {
    let prompt = PromptRepo::find_by_id(uow.conn(), prompt_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Prompt", prompt_id))?;
    Ok(prompt)
}
