//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&mut SqliteConnection` as the first argument. Pass
//! `&mut *tx` to run inside a transaction, or `&mut *pool.acquire().await?`
//! for a standalone statement.

pub mod blob_ref_repo;
pub mod project_repo;
pub mod prompt_repo;
pub mod request_repo;

pub use blob_ref_repo::BlobRefRepo;
pub use project_repo::ProjectRepo;
pub use prompt_repo::PromptRepo;
pub use request_repo::RequestRepo;
