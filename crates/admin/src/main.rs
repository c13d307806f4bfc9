use anyhow::{bail, Context, Result};
use atelier_core::blob::BlobStore;
use atelier_engine::{Atelier, EngineConfig};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "atelier-admin",
    about = "Maintenance commands for the atelier database and blob store"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Apply pending database migrations
    Migrate,
    /// Verify the database and the blob store are reachable
    Check,
    /// Delete blobs no prompt or request references
    Sweep {
        /// Only report what would be deleted
        #[arg(long)]
        dry_run: bool,
    },
    /// Attach the configured sample output to a request
    Generate {
        /// Request to generate for
        request_id: i64,
    },
    /// Delete every blob in the store (test and reset tooling only)
    ResetBlobs {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atelier_admin=info,atelier_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::from_env().context("invalid configuration")?;

    match cli.cmd {
        Cmd::Migrate => migrate(&config).await,
        Cmd::Check => check(&config).await,
        Cmd::Sweep { dry_run } => sweep(&config, dry_run).await,
        Cmd::Generate { request_id } => generate(&config, request_id).await,
        Cmd::ResetBlobs { yes } => reset_blobs(&config, yes).await,
    }
}

async fn migrate(config: &EngineConfig) -> Result<()> {
    let pool = atelier_db::create_pool(&config.database_url, config.max_connections)
        .await
        .with_context(|| format!("connect to {}", config.database_url))?;
    atelier_db::run_migrations(&pool).await.context("run migrations")?;
    tracing::info!("Database migrations applied");
    Ok(())
}

async fn check(config: &EngineConfig) -> Result<()> {
    let atelier = Atelier::connect(config).await?;
    atelier_db::health_check(atelier.pool())
        .await
        .context("database health check")?;

    let blobs = atelier.blobs();
    let content = b"atelier-admin health check";
    let id = blobs.create(content).await.context("blob create")?;
    let read_back = blobs.read(id).await.context("blob read")?;
    blobs.delete(id).await.context("blob delete")?;
    if read_back != content {
        bail!("blob store returned different content for {id}");
    }

    tracing::info!(backend = blobs.backend_name(), "Database and blob store healthy");
    Ok(())
}

async fn sweep(config: &EngineConfig, dry_run: bool) -> Result<()> {
    let atelier = Atelier::connect(config).await?;
    let report = atelier.sweeper().sweep(dry_run).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn generate(config: &EngineConfig, request_id: i64) -> Result<()> {
    let Some(generator) = config.static_generator().await? else {
        bail!("SAMPLE_OUTPUT_PATH is not set");
    };
    let atelier = Atelier::connect(config).await?;
    let request = atelier
        .requests()
        .generate_output(request_id, &generator)
        .await
        .with_context(|| format!("generate output for request {request_id}"))?;
    println!("{}", serde_json::to_string_pretty(&request)?);
    Ok(())
}

async fn reset_blobs(config: &EngineConfig, yes: bool) -> Result<()> {
    if !yes {
        bail!("refusing to delete every blob without --yes");
    }
    let blobs = atelier_storage::open(&config.blob_backend).await?;
    blobs.delete_all().await?;
    tracing::warn!(backend = blobs.backend_name(), "All blobs deleted");
    Ok(())
}
