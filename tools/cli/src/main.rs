//! CoachSync CLI - Command line interface for the data engine.
//!
//! This tool drives the offline-first engine against a coaching backend:
//! reading through the cache, writing through the sync queue, and
//! inspecting sync status.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use url::Url;

use coachsync_common::ResourceType;
use coachsync_engine::{DataOrchestrator, EngineConfig, ReadOptions, WriteOptions};
use coachsync_storage::{default_mirror_dir, FileMirror, HttpRemote};
use coachsync_sync::Priority;

#[derive(Parser)]
#[command(name = "coachsync")]
#[command(about = "CoachSync - offline-first data engine")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Backend base URL.
    #[arg(long, env = "COACHSYNC_API_URL")]
    api_url: Url,

    /// Bearer token for authenticated requests.
    #[arg(long, env = "COACHSYNC_TOKEN")]
    token: Option<String>,

    /// Mirror directory (default: platform data dir).
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show sync status and cache diagnostics.
    Status,

    /// Read a resource through the cache.
    Read {
        /// Resource type (profile, metrics, workouts, nutrition, chat, anamnese).
        resource_type: String,

        /// Resource identifier.
        id: String,

        /// Skip the cache and fetch from the backend.
        #[arg(short, long)]
        force: bool,

        /// Serve the last local copy when the backend is unreachable.
        #[arg(short, long)]
        stale_ok: bool,
    },

    /// Write a resource (local commit, then sync).
    Write {
        /// Resource type.
        resource_type: String,

        /// Resource identifier.
        id: String,

        /// JSON payload.
        payload: String,

        /// Queue the write instead of pushing immediately.
        #[arg(short, long)]
        queue_only: bool,

        /// Delivery priority: "high", "normal", or "low".
        #[arg(short, long, default_value = "normal")]
        priority: String,
    },

    /// Drain the sync queue now.
    Sync,

    /// Invalidate cached entries of a type, or one entry by id.
    Invalidate {
        /// Resource type.
        resource_type: String,

        /// Resource identifier (omit for the whole type).
        id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mirror_dir = match cli.data_dir.clone() {
        Some(dir) => dir,
        None => default_mirror_dir().context("Could not resolve a data directory")?,
    };

    let remote = HttpRemote::new(cli.api_url.clone())?;
    if let Some(ref token) = cli.token {
        remote.set_token(token.clone());
    }
    let mirror = FileMirror::new(&mirror_dir)
        .with_context(|| format!("Failed to open mirror at {}", mirror_dir.display()))?;

    let engine = Arc::new(DataOrchestrator::new(
        Arc::new(remote),
        Arc::new(mirror),
        EngineConfig::default(),
    ));
    engine.clone().start().await?;

    let result = match cli.command {
        Commands::Status => cmd_status(&engine),

        Commands::Read {
            resource_type,
            id,
            force,
            stale_ok,
        } => cmd_read(&engine, &resource_type, &id, force, stale_ok).await,

        Commands::Write {
            resource_type,
            id,
            payload,
            queue_only,
            priority,
        } => cmd_write(&engine, &resource_type, &id, &payload, queue_only, &priority).await,

        Commands::Sync => cmd_sync(&engine).await,

        Commands::Invalidate { resource_type, id } => {
            cmd_invalidate(&engine, &resource_type, id.as_deref()).await
        }
    };

    engine.stop();
    result
}

fn parse_type(s: &str) -> Result<ResourceType> {
    s.parse::<ResourceType>()
        .with_context(|| format!("Unknown resource type '{}'", s))
}

fn parse_priority(s: &str) -> Result<Priority> {
    match s {
        "high" => Ok(Priority::High),
        "normal" => Ok(Priority::Normal),
        "low" => Ok(Priority::Low),
        other => bail!("Unknown priority '{}' (use high, normal, or low)", other),
    }
}

fn cmd_status(engine: &DataOrchestrator) -> Result<()> {
    let status = engine.sync_status();
    println!("Online:       {}", status.is_online);
    println!("Draining:     {}", status.in_progress);
    println!("Queue length: {}", status.queue_length);
    println!(
        "Last sync:    {}",
        status
            .last_sync_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string())
    );

    for op in &status.pending_operations {
        println!(
            "  [{:?}] {} (attempts: {})",
            op.priority,
            op.target(),
            op.attempts
        );
    }

    let stats = engine.cache_stats();
    println!(
        "Cache:        {} entries, ~{} bytes",
        stats.entries, stats.approx_bytes
    );
    Ok(())
}

async fn cmd_read(
    engine: &DataOrchestrator,
    resource_type: &str,
    id: &str,
    force: bool,
    stale_ok: bool,
) -> Result<()> {
    let options = ReadOptions {
        force_refresh: force,
        fallback_to_stale: stale_ok,
        timeout: None,
    };

    let result = engine.read(parse_type(resource_type)?, id, options).await?;
    if result.stale {
        eprintln!("warning: backend unreachable, showing last local copy");
    }
    println!("{}", serde_json::to_string_pretty(&result.value)?);
    Ok(())
}

async fn cmd_write(
    engine: &DataOrchestrator,
    resource_type: &str,
    id: &str,
    payload: &str,
    queue_only: bool,
    priority: &str,
) -> Result<()> {
    let value: serde_json::Value =
        serde_json::from_str(payload).context("Payload is not valid JSON")?;

    let options = WriteOptions {
        sync_immediately: !queue_only,
        priority: parse_priority(priority)?,
    };

    engine
        .write(parse_type(resource_type)?, id, value, options)
        .await?;

    let status = engine.sync_status();
    if status.queue_length > 0 {
        println!("Committed locally, {} write(s) queued", status.queue_length);
    } else {
        println!("Committed and synced");
    }
    Ok(())
}

async fn cmd_sync(engine: &DataOrchestrator) -> Result<()> {
    let report = engine.notify_foreground().await?;
    if report.skipped {
        println!("Sync skipped ({} queued)", report.remaining);
    } else {
        println!(
            "Synced: {} delivered, {} failed, {} remaining",
            report.processed, report.failed, report.remaining
        );
    }
    Ok(())
}

async fn cmd_invalidate(
    engine: &DataOrchestrator,
    resource_type: &str,
    id: Option<&str>,
) -> Result<()> {
    let removed = engine.invalidate(parse_type(resource_type)?, id).await?;
    println!("Invalidated {} entr{}", removed, if removed == 1 { "y" } else { "ies" });
    Ok(())
}
