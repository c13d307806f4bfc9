//! Prompt entity model and DTOs.

use atelier_core::reconcile::PersistedPrompt;
use atelier_core::types::{BlobId, DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A prompt row from the `prompts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Prompt {
    pub id: DbId,
    pub request_id: DbId,
    pub position: i64,
    pub text: String,
    /// Attached image; `None` means no image.
    pub image: Option<BlobId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Prompt {
    /// The id/image pair the reconciliation planner works from.
    pub fn persisted(&self) -> PersistedPrompt {
        PersistedPrompt {
            id: self.id,
            image: self.image,
        }
    }
}

/// DTO for creating a new prompt.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePrompt {
    pub request_id: DbId,
    pub position: i64,
    pub text: String,
    pub image: Option<BlobId>,
}

/// DTO for rewriting a prompt's content.
///
/// `text` and `image` are always written (a `None` image clears the
/// reference); `position` is kept when `None`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePrompt {
    pub text: String,
    pub image: Option<BlobId>,
    pub position: Option<i64>,
}
