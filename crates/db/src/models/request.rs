//! Request entity model and DTOs.

use atelier_core::types::{BlobId, DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::prompt::Prompt;

/// A request row from the `requests` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Request {
    pub id: DbId,
    /// Owning project. Never changes after insert.
    pub project_id: DbId,
    /// Generated output image, if one has been produced.
    pub output_image: Option<BlobId>,
    /// Optimistic-concurrency token, bumped by every mutation of the aggregate.
    pub version: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A request together with its prompts, ordered by position.
#[derive(Debug, Clone, Serialize)]
pub struct RequestWithPrompts {
    #[serde(flatten)]
    pub request: Request,
    pub prompts: Vec<Prompt>,
}

/// DTO for creating a new request.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRequest {
    pub project_id: DbId,
}
