//! Output image generation collaborator.

use std::path::Path;

use async_trait::async_trait;
use atelier_core::error::CoreError;
use atelier_db::models::request::RequestWithPrompts;

/// Produces output image bytes for a request.
///
/// The engine stores the returned bytes itself; generators never touch the
/// blob store.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, request: &RequestWithPrompts) -> Result<Vec<u8>, CoreError>;
}

/// Generator that returns the same bytes for every request.
#[derive(Debug, Clone)]
pub struct StaticImageGenerator {
    bytes: Vec<u8>,
}

impl StaticImageGenerator {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Load the sample output from disk.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            CoreError::Storage(format!("Failed to read sample output {}: {e}", path.display()))
        })?;
        Ok(Self::new(bytes))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[async_trait]
impl ImageGenerator for StaticImageGenerator {
    async fn generate(&self, request: &RequestWithPrompts) -> Result<Vec<u8>, CoreError> {
        tracing::debug!(
            request_id = request.request.id,
            prompts = request.prompts.len(),
            "Static generator invoked"
        );
        Ok(self.bytes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn from_file_reads_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample_output.jpeg");
        tokio::fs::write(&path, b"jpeg").await.unwrap();

        let generator = StaticImageGenerator::from_file(&path).await.unwrap();
        assert_eq!(generator.bytes(), b"jpeg");
    }

    #[tokio::test]
    async fn from_missing_file_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = StaticImageGenerator::from_file(dir.path().join("absent"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Storage(_)));
    }
}
