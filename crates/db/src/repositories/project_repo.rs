//! Repository for the `projects` table.

use atelier_core::types::DbId;
use chrono::Utc;
use sqlx::SqliteConnection;

use crate::models::project::{CreateProject, Project, UpdateProject};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, created_at, updated_at";

/// Provides CRUD operations for projects.
pub struct ProjectRepo;

impl ProjectRepo {
    /// Insert a new project, returning the created row.
    pub async fn create(
        conn: &mut SqliteConnection,
        input: &CreateProject,
    ) -> Result<Project, sqlx::Error> {
        let now = Utc::now();
        let query = format!(
            "INSERT INTO projects (name, created_at, updated_at)
             VALUES ($1, $2, $2)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(&input.name)
            .bind(now)
            .fetch_one(&mut *conn)
            .await
    }

    /// Find a project by its ID.
    pub async fn find_by_id(
        conn: &mut SqliteConnection,
        id: DbId,
    ) -> Result<Option<Project>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects WHERE id = $1");
        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
    }

    /// Refresh `updated_at`, returning the row, or `None` if it is missing.
    ///
    /// Used as the opening write of a unit of work that mutates the
    /// project's subtree.
    pub async fn touch(
        conn: &mut SqliteConnection,
        id: DbId,
    ) -> Result<Option<Project>, sqlx::Error> {
        let query = format!(
            "UPDATE projects SET updated_at = $2
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .bind(Utc::now())
            .fetch_optional(&mut *conn)
            .await
    }

    /// List all projects ordered by most recently created first.
    pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<Project>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects ORDER BY created_at DESC, id DESC");
        sqlx::query_as::<_, Project>(&query)
            .fetch_all(&mut *conn)
            .await
    }

    /// Update a project. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        conn: &mut SqliteConnection,
        id: DbId,
        input: &UpdateProject,
    ) -> Result<Option<Project>, sqlx::Error> {
        let query = format!(
            "UPDATE projects SET
                name = COALESCE($2, name),
                updated_at = $3
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(Utc::now())
            .fetch_optional(&mut *conn)
            .await
    }

    /// Delete a project row. Returns `true` if a row was removed.
    ///
    /// Owned requests must already be gone; callers go through the cascade
    /// deleter so their blobs are released too.
    pub async fn delete(conn: &mut SqliteConnection, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
