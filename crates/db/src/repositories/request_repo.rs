//! Repository for the `requests` table.

use atelier_core::types::{BlobId, DbId};
use chrono::Utc;
use sqlx::SqliteConnection;

use crate::models::request::{CreateRequest, Request};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, project_id, output_image, version, created_at, updated_at";

/// Provides CRUD and version-management operations for requests.
pub struct RequestRepo;

impl RequestRepo {
    // ── Standard CRUD ────────────────────────────────────────────────

    /// Insert a new request at version 1, returning the created row.
    pub async fn create(
        conn: &mut SqliteConnection,
        input: &CreateRequest,
    ) -> Result<Request, sqlx::Error> {
        let query = format!(
            "INSERT INTO requests (project_id, version, created_at, updated_at)
             VALUES ($1, 1, $2, $2)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Request>(&query)
            .bind(input.project_id)
            .bind(Utc::now())
            .fetch_one(&mut *conn)
            .await
    }

    /// Find a request by its ID.
    pub async fn find_by_id(
        conn: &mut SqliteConnection,
        id: DbId,
    ) -> Result<Option<Request>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM requests WHERE id = $1");
        sqlx::query_as::<_, Request>(&query)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
    }

    /// List the requests of a project, oldest first.
    pub async fn list_by_project(
        conn: &mut SqliteConnection,
        project_id: DbId,
    ) -> Result<Vec<Request>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM requests
             WHERE project_id = $1
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, Request>(&query)
            .bind(project_id)
            .fetch_all(&mut *conn)
            .await
    }

    /// Delete a request row. Returns `true` if a row was removed.
    pub async fn delete(conn: &mut SqliteConnection, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM requests WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ── Aggregate-level operations ───────────────────────────────────

    /// Increment the version of a request.
    ///
    /// When `expected_version` is `Some`, the row is only touched if its
    /// current version matches. Returns `None` when the row is missing or
    /// the version did not match; the caller tells the two apart with
    /// [`RequestRepo::find_by_id`].
    ///
    /// Inside a transaction this is the first write, so it also takes the
    /// database write lock before the caller reads its snapshot.
    pub async fn bump_version(
        conn: &mut SqliteConnection,
        id: DbId,
        expected_version: Option<i64>,
    ) -> Result<Option<Request>, sqlx::Error> {
        let query = format!(
            "UPDATE requests SET
                version = version + 1,
                updated_at = $3
             WHERE id = $1 AND ($2 IS NULL OR version = $2)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Request>(&query)
            .bind(id)
            .bind(expected_version)
            .bind(Utc::now())
            .fetch_optional(&mut *conn)
            .await
    }

    /// Increment the version of the request owning `prompt_id`.
    ///
    /// Lets single-prompt writes take the write lock with their first
    /// statement. Returns `None` when the prompt does not exist.
    pub async fn bump_version_for_prompt(
        conn: &mut SqliteConnection,
        prompt_id: DbId,
    ) -> Result<Option<Request>, sqlx::Error> {
        let query = format!(
            "UPDATE requests SET
                version = version + 1,
                updated_at = $2
             WHERE id = (SELECT request_id FROM prompts WHERE id = $1)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Request>(&query)
            .bind(prompt_id)
            .bind(Utc::now())
            .fetch_optional(&mut *conn)
            .await
    }

    /// Point `output_image` at a new blob (or clear it).
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn set_output_image(
        conn: &mut SqliteConnection,
        id: DbId,
        output_image: Option<BlobId>,
    ) -> Result<Option<Request>, sqlx::Error> {
        let query = format!(
            "UPDATE requests SET
                output_image = $2,
                updated_at = $3
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Request>(&query)
            .bind(id)
            .bind(output_image)
            .bind(Utc::now())
            .fetch_optional(&mut *conn)
            .await
    }
}
