use std::path::PathBuf;

use atelier_core::error::CoreError;
use atelier_core::reconcile::StaleIdPolicy;
use atelier_storage::BlobBackend;

use crate::generation::StaticImageGenerator;

/// Engine configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// SQLite connection URL.
    pub database_url: String,
    /// Pool size (default: `5`).
    pub max_connections: u32,
    /// Blob backend to open.
    pub blob_backend: BlobBackend,
    /// How reconciliation treats target ids that match no persisted prompt.
    pub stale_id_policy: StaleIdPolicy,
    /// File whose bytes the static generator returns, if configured.
    pub sample_output_path: Option<PathBuf>,
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var              | Default                        |
    /// |----------------------|--------------------------------|
    /// | `DATABASE_URL`       | `sqlite://atelier.db?mode=rwc` |
    /// | `DB_MAX_CONNECTIONS` | `5`                            |
    /// | `BLOB_BACKEND`       | `local`                        |
    /// | `BLOB_STORAGE_PATH`  | `./storage`                    |
    /// | `STALE_ID_POLICY`    | `create`                       |
    /// | `SAMPLE_OUTPUT_PATH` | unset                          |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`] but reads values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| "sqlite://atelier.db?mode=rwc".into());

        let max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(raw) => raw.trim().parse::<u32>().ok().filter(|n| *n > 0).ok_or_else(|| {
                CoreError::Validation(format!(
                    "DB_MAX_CONNECTIONS must be a positive integer, got '{raw}'"
                ))
            })?,
            None => 5,
        };

        let storage_path = lookup("BLOB_STORAGE_PATH").unwrap_or_else(|| "./storage".into());
        let blob_backend = BlobBackend::from_name(
            &lookup("BLOB_BACKEND").unwrap_or_else(|| "local".into()),
            storage_path,
        )?;

        let stale_id_policy = match lookup("STALE_ID_POLICY") {
            Some(raw) => StaleIdPolicy::from_name(&raw)?,
            None => StaleIdPolicy::default(),
        };

        let sample_output_path = lookup("SAMPLE_OUTPUT_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            database_url,
            max_connections,
            blob_backend,
            stale_id_policy,
            sample_output_path,
        })
    }

    /// Build the static generator from `SAMPLE_OUTPUT_PATH`, `None` when unset.
    pub async fn static_generator(&self) -> Result<Option<StaticImageGenerator>, CoreError> {
        match &self.sample_output_path {
            Some(path) => Ok(Some(StaticImageGenerator::from_file(path).await?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<EngineConfig, CoreError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EngineConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.database_url, "sqlite://atelier.db?mode=rwc");
        assert_eq!(cfg.max_connections, 5);
        assert_eq!(
            cfg.blob_backend,
            BlobBackend::Local {
                root: PathBuf::from("./storage")
            }
        );
        assert_eq!(cfg.stale_id_policy, StaleIdPolicy::CreateOnStaleId);
        assert!(cfg.sample_output_path.is_none());
    }

    #[test]
    fn overrides() {
        let cfg = config(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("DB_MAX_CONNECTIONS", "2"),
            ("BLOB_BACKEND", "memory"),
            ("STALE_ID_POLICY", "reject"),
            ("SAMPLE_OUTPUT_PATH", "/tmp/sample.jpeg"),
        ])
        .unwrap();
        assert_eq!(cfg.database_url, "sqlite::memory:");
        assert_eq!(cfg.max_connections, 2);
        assert_eq!(cfg.blob_backend, BlobBackend::Memory);
        assert_eq!(cfg.stale_id_policy, StaleIdPolicy::RejectOnStaleId);
        assert_eq!(
            cfg.sample_output_path,
            Some(PathBuf::from("/tmp/sample.jpeg"))
        );
    }

    #[tokio::test]
    async fn static_generator_follows_sample_output_path() {
        assert!(config(&[]).unwrap().static_generator().await.unwrap().is_none());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample_output.jpeg");
        tokio::fs::write(&path, b"sample").await.unwrap();
        let path = path.to_string_lossy().into_owned();

        let cfg = config(&[("SAMPLE_OUTPUT_PATH", path.as_str())]).unwrap();
        let generator = cfg.static_generator().await.unwrap().unwrap();
        assert_eq!(generator.bytes(), b"sample");

        let cfg = config(&[("SAMPLE_OUTPUT_PATH", "/nonexistent/sample.jpeg")]).unwrap();
        assert!(matches!(cfg.static_generator().await, Err(CoreError::Storage(_))));
    }

    #[test]
    fn invalid_values_are_validation_errors() {
        for vars in [
            [("DB_MAX_CONNECTIONS", "many")],
            [("DB_MAX_CONNECTIONS", "0")],
            [("BLOB_BACKEND", "s3")],
            [("STALE_ID_POLICY", "ignore")],
        ] {
            assert!(matches!(config(&vars), Err(CoreError::Validation(_))));
        }
    }
}
