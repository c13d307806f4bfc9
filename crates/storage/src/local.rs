//! Filesystem blob backend.
//!
//! Layout: `{root}/{first-2-hex}/{uuid}.blob`. Writes go to a temp file in
//! the same shard directory and are renamed into place, so a reader never
//! observes a half-written blob.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use atelier_core::blob::{BlobError, BlobStore};
use atelier_core::types::BlobId;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

const BLOB_EXTENSION: &str = "blob";

/// Blob store backed by a local directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, BlobError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        tracing::debug!(root = %root.display(), "Local blob store ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn shard_dir(&self, id: BlobId) -> PathBuf {
        let hex = id.simple().to_string();
        self.root.join(&hex[0..2])
    }

    fn blob_path(&self, id: BlobId) -> PathBuf {
        self.shard_dir(id)
            .join(format!("{}.{BLOB_EXTENSION}", id.as_hyphenated()))
    }

    async fn write_atomic(&self, id: BlobId, content: &[u8]) -> Result<(), BlobError> {
        let dir = self.shard_dir(id);
        fs::create_dir_all(&dir).await?;

        let final_path = self.blob_path(id);
        let temp_path = dir.join(format!("{}.{}.tmp", id.as_hyphenated(), Uuid::new_v4().simple()));

        let mut file = fs::File::create(&temp_path).await?;
        if let Err(e) = write_and_sync(&mut file, content).await {
            drop(file);
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        drop(file);

        if let Err(e) = fs::rename(&temp_path, &final_path).await {
            tracing::warn!(
                from = %temp_path.display(),
                to = %final_path.display(),
                error = %e,
                "Blob rename failed"
            );
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }
}

async fn write_and_sync(file: &mut fs::File, content: &[u8]) -> std::io::Result<()> {
    file.write_all(content).await?;
    file.sync_all().await
}

/// Parse `{uuid}.blob` file names; anything else (temp files) is skipped.
fn parse_blob_file_name(name: &str) -> Option<BlobId> {
    let stem = name.strip_suffix(BLOB_EXTENSION)?.strip_suffix('.')?;
    Uuid::parse_str(stem).ok()
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    async fn create(&self, content: &[u8]) -> Result<BlobId, BlobError> {
        let id = Uuid::new_v4();
        self.write_atomic(id, content).await?;
        tracing::debug!(blob_id = %id, size = content.len(), "Blob created");
        Ok(id)
    }

    async fn read(&self, id: BlobId) -> Result<Vec<u8>, BlobError> {
        match fs::read(self.blob_path(id)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(BlobError::NotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, id: BlobId, content: &[u8]) -> Result<(), BlobError> {
        if !self.exists(id).await? {
            return Err(BlobError::NotFound(id));
        }
        self.write_atomic(id, content).await?;
        tracing::debug!(blob_id = %id, size = content.len(), "Blob updated");
        Ok(())
    }

    async fn delete(&self, id: BlobId) -> Result<(), BlobError> {
        match fs::remove_file(self.blob_path(id)).await {
            Ok(()) => {
                tracing::debug!(blob_id = %id, "Blob deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, id: BlobId) -> Result<bool, BlobError> {
        Ok(fs::try_exists(self.blob_path(id)).await?)
    }

    async fn list(&self) -> Result<Vec<BlobId>, BlobError> {
        let mut ids = Vec::new();
        let mut shards = fs::read_dir(&self.root).await?;
        while let Some(shard) = shards.next_entry().await? {
            if !shard.file_type().await?.is_dir() {
                continue;
            }
            let mut files = fs::read_dir(shard.path()).await?;
            while let Some(file) = files.next_entry().await? {
                if let Some(id) = file.file_name().to_str().and_then(parse_blob_file_name) {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }

    async fn delete_all(&self) -> Result<(), BlobError> {
        let mut shards = fs::read_dir(&self.root).await?;
        let mut removed = 0usize;
        while let Some(shard) = shards.next_entry().await? {
            if shard.file_type().await?.is_dir() {
                fs::remove_dir_all(shard.path()).await?;
                removed += 1;
            }
        }
        tracing::info!(root = %self.root.display(), shards = removed, "Blob store cleared");
        Ok(())
    }
}
