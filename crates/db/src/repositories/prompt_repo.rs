//! Repository for the `prompts` table.

use atelier_core::types::DbId;
use chrono::Utc;
use sqlx::SqliteConnection;

use crate::models::prompt::{CreatePrompt, Prompt, UpdatePrompt};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, request_id, position, text, image, created_at, updated_at";

/// Provides CRUD operations for prompts.
pub struct PromptRepo;

impl PromptRepo {
    /// Insert a new prompt, returning the created row.
    pub async fn create(
        conn: &mut SqliteConnection,
        input: &CreatePrompt,
    ) -> Result<Prompt, sqlx::Error> {
        let query = format!(
            "INSERT INTO prompts (request_id, position, text, image, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Prompt>(&query)
            .bind(input.request_id)
            .bind(input.position)
            .bind(&input.text)
            .bind(input.image)
            .bind(Utc::now())
            .fetch_one(&mut *conn)
            .await
    }

    /// Find a prompt by its ID.
    pub async fn find_by_id(
        conn: &mut SqliteConnection,
        id: DbId,
    ) -> Result<Option<Prompt>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM prompts WHERE id = $1");
        sqlx::query_as::<_, Prompt>(&query)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
    }

    /// List the prompts of a request ordered by position, then id.
    pub async fn list_by_request(
        conn: &mut SqliteConnection,
        request_id: DbId,
    ) -> Result<Vec<Prompt>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM prompts
             WHERE request_id = $1
             ORDER BY position ASC, id ASC"
        );
        sqlx::query_as::<_, Prompt>(&query)
            .bind(request_id)
            .fetch_all(&mut *conn)
            .await
    }

    /// Rewrite a prompt's text and image reference (and optionally its position).
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        conn: &mut SqliteConnection,
        id: DbId,
        input: &UpdatePrompt,
    ) -> Result<Option<Prompt>, sqlx::Error> {
        let query = format!(
            "UPDATE prompts SET
                text = $2,
                image = $3,
                position = COALESCE($4, position),
                updated_at = $5
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Prompt>(&query)
            .bind(id)
            .bind(&input.text)
            .bind(input.image)
            .bind(input.position)
            .bind(Utc::now())
            .fetch_optional(&mut *conn)
            .await
    }

    /// Delete a prompt row. Returns `true` if a row was removed.
    pub async fn delete(conn: &mut SqliteConnection, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM prompts WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Position one past the highest stored for a request, `0` when it has none.
    ///
    /// Deletes leave gaps, so this is not the same as the prompt count.
    pub async fn next_position(
        conn: &mut SqliteConnection,
        request_id: DbId,
    ) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM prompts WHERE request_id = $1",
        )
        .bind(request_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(row.0)
    }
}
