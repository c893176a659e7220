use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use squeezenotes_pipeline::{IngestMode, IngestRequest, Pipeline, PipelineConfig, PipelineError, Ports};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "sqn", about = "SqueezeNotes compression pipeline", version)]
struct Cli {
    /// Config file (.toml or .json)
    #[arg(long, global = true, env = "SQN_CONFIG", default_value = "sqn.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run ingest → compress → retrieve → metrics against in-memory services
    Demo {
        /// Note id to use
        #[arg(long, default_value = "n1")]
        note_id: String,
        /// How many times "abcde" is repeated in the note body
        #[arg(long, default_value_t = 200)]
        repeat: usize,
    },
    /// Print the effective configuration as JSON
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Demo { note_id, repeat } => demo(config, &note_id, repeat).await,
        Command::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> Result<PipelineConfig> {
    if path.exists() {
        PipelineConfig::from_file(path)
    } else {
        tracing::warn!("Config file not found, using defaults: {}", path.display());
        Ok(PipelineConfig::default())
    }
}

async fn demo(config: PipelineConfig, note_id: &str, repeat: usize) -> Result<()> {
    let pipeline = Pipeline::new(config, Ports::in_memory())?;
    let content = "abcde".repeat(repeat);

    let receipt = pipeline
        .ingest
        .ingest(IngestRequest::new(note_id, "1", &content), IngestMode::Create)
        .await?;
    println!("{}", serde_json::to_string_pretty(&receipt)?);

    match pipeline.retrieve.retrieve(Some(note_id), Some("1")).await {
        Err(PipelineError::NotReady) => tracing::info!(note_id, "Not compressed yet, as expected"),
        Ok(_) => anyhow::bail!("note readable before compression"),
        Err(e) => return Err(e.into()),
    }

    let worker = pipeline.start_worker();
    let note = pipeline.retrieve_when_ready(note_id, "1").await?;
    if note.content != content {
        anyhow::bail!("retrieved content differs from what was ingested");
    }
    tracing::info!(note_id, bytes = note.content.len(), "Round trip verified");

    let stats = worker.shutdown().await;
    tracing::info!(compressed = stats.totals.compressed, "Worker stopped");

    let report = pipeline.metrics.collect().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
