//! Project operations.

use std::sync::Arc;

use atelier_core::blob::BlobStore;
use atelier_core::error::CoreError;
use atelier_core::types::DbId;
use atelier_db::models::project::{CreateProject, Project, ProjectWithRequests, UpdateProject};
use atelier_db::repositories::{ProjectRepo, RequestRepo};
use atelier_db::DbPool;

use crate::cascade::{CascadeDeleter, CascadeReport};
use crate::error::EngineResult;

#[derive(Clone)]
pub struct ProjectService {
    pool: DbPool,
    cascade: CascadeDeleter,
}

fn validate_name(name: &str) -> Result<String, CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Project name must not be empty".into()));
    }
    Ok(trimmed.to_string())
}

impl ProjectService {
    pub fn new(pool: DbPool, blobs: Arc<dyn BlobStore>) -> Self {
        let cascade = CascadeDeleter::new(pool.clone(), blobs);
        Self { pool, cascade }
    }

    pub async fn create(&self, name: &str) -> EngineResult<Project> {
        let name = validate_name(name)?;
        let mut conn = self.pool.acquire().await?;
        let project = ProjectRepo::create(&mut conn, &CreateProject { name }).await?;
        tracing::info!(project_id = project.id, "Project created");
        Ok(project)
    }

    /// Load a project with its requests.
    pub async fn get(&self, project_id: DbId) -> EngineResult<ProjectWithRequests> {
        let mut conn = self.pool.acquire().await?;
        let project = ProjectRepo::find_by_id(&mut conn, project_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Project", project_id))?;
        let requests = RequestRepo::list_by_project(&mut conn, project_id).await?;
        Ok(ProjectWithRequests { project, requests })
    }

    /// All projects, newest first.
    pub async fn list(&self) -> EngineResult<Vec<Project>> {
        let mut conn = self.pool.acquire().await?;
        Ok(ProjectRepo::list(&mut conn).await?)
    }

    pub async fn rename(&self, project_id: DbId, name: &str) -> EngineResult<Project> {
        let name = validate_name(name)?;
        let mut conn = self.pool.acquire().await?;
        let input = UpdateProject { name: Some(name) };
        let project = ProjectRepo::update(&mut conn, project_id, &input)
            .await?
            .ok_or_else(|| CoreError::not_found("Project", project_id))?;
        tracing::info!(project_id, "Project renamed");
        Ok(project)
    }

    /// Delete a project with all of its requests, prompts and blobs.
    pub async fn delete(&self, project_id: DbId) -> EngineResult<CascadeReport> {
        self.cascade.delete_project(project_id).await
    }
}
