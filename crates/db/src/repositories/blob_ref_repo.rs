//! Cross-table view of blob references.

use atelier_core::types::BlobId;
use sqlx::SqliteConnection;

/// Reads which blob ids the relational store currently points at.
pub struct BlobRefRepo;

impl BlobRefRepo {
    /// Every blob id referenced by a prompt image or a request output.
    pub async fn list_referenced(conn: &mut SqliteConnection) -> Result<Vec<BlobId>, sqlx::Error> {
        let rows: Vec<(BlobId,)> = sqlx::query_as(
            "SELECT image FROM prompts WHERE image IS NOT NULL
             UNION
             SELECT output_image FROM requests WHERE output_image IS NOT NULL",
        )
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
