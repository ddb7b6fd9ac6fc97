use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::config::interactive::{probe_embedding, probe_generation};
use crate::config::{Config, resolve_config_dir};
use crate::pipeline::{IngestReport, QueryResponse, RagPipeline, Upload};

/// A line typed into the chat loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Empty,
    Quit,
    Load(Vec<PathBuf>),
    Ask(String),
}

impl ChatCommand {
    #[inline]
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        if line == ":quit" || line == ":q" {
            return Self::Quit;
        }
        if let Some(rest) = line
            .strip_prefix(":load")
            .filter(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
        {
            return Self::Load(rest.split_whitespace().map(PathBuf::from).collect());
        }
        Self::Ask(line.to_string())
    }
}

/// Load configuration from `config_dir` or the per-user default
#[inline]
pub fn load_config(config_dir: Option<PathBuf>) -> Result<Config> {
    let config_dir = resolve_config_dir(config_dir)?;
    Config::load(&config_dir)
}

/// Read files from disk, naming each upload after its file name
#[inline]
pub fn read_uploads(paths: &[PathBuf]) -> Result<Vec<Upload>> {
    paths
        .iter()
        .map(|path| {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(Upload::new(upload_name(path), bytes))
        })
        .collect()
}

fn upload_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

/// Ingest `files` and answer a single question
#[inline]
pub async fn ask(config: &Config, files: &[PathBuf], question: String) -> Result<()> {
    let pipeline = Arc::new(RagPipeline::from_config(config)?);
    ingest_files(&pipeline, files).await?;

    let response = answer(&pipeline, question).await?;
    print_response(&response);
    Ok(())
}

/// Ingest `files`, then answer questions read from stdin until EOF
#[inline]
pub async fn chat(config: &Config, files: &[PathBuf]) -> Result<()> {
    let pipeline = Arc::new(RagPipeline::from_config(config)?);
    if !files.is_empty() {
        ingest_files(&pipeline, files).await?;
    }

    eprintln!(
        "{}",
        style("Ask a question, `:load <files>` to replace the documents, `:quit` to exit.").dim()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match ChatCommand::parse(&line) {
            ChatCommand::Empty => {}
            ChatCommand::Quit => break,
            ChatCommand::Load(paths) => {
                if let Err(e) = ingest_files(&pipeline, &paths).await {
                    eprintln!("{} {:#}", style("Error:").red().bold(), e);
                }
            }
            ChatCommand::Ask(question) => match answer(&pipeline, question).await {
                Ok(response) => print_response(&response),
                Err(e) => eprintln!("{} {:#}", style("Error:").red().bold(), e),
            },
        }
    }

    debug!("Chat input closed");
    Ok(())
}

/// Show configuration and whether the upstream services answer
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("📊 DocQuery Status Report");
    println!("{}", "=".repeat(50));
    println!();

    let embedding = config.embedding.clone();
    let generation = config.generation.clone();
    let (embedding_ok, generation_ok) = tokio::task::spawn_blocking(move || {
        (probe_embedding(&embedding), probe_generation(&generation))
    })
    .await
    .context("Status probe task failed")?;

    println!("🔢 Embedding Service:");
    print_probe(
        embedding_ok,
        &config.embedding.provider.to_string(),
        &config.embedding.base_url,
    );
    println!("   📋 Model: {}", config.embedding.model);
    println!("   📐 Dimension: {}", config.embedding.dimension);
    println!("   📦 Batch Size: {}", config.embedding.batch_size);
    println!();

    println!("🤖 Generation Service:");
    print_probe(
        generation_ok,
        &config.generation.provider.to_string(),
        &config.generation.base_url,
    );
    println!("   📋 Model: {}", config.generation.model);
    println!(
        "   ✍️  Max Output: {} tokens at temperature {}",
        config.generation.max_output_tokens, config.generation.temperature
    );
    println!();

    println!("🔍 Retrieval:");
    println!(
        "   Chunks: {} tokens with {} overlap",
        config.chunking.max_chunk_size, config.chunking.chunk_overlap
    );
    println!("   Top k: {}", config.retrieval.top_k);

    Ok(())
}

fn print_probe(reachable: bool, provider: &str, base_url: &str) {
    if reachable {
        println!("   ✅ {}: Reachable ({})", provider, base_url);
    } else {
        println!("   ❌ {}: Unreachable ({})", provider, base_url);
    }
}

async fn ingest_files(pipeline: &Arc<RagPipeline>, files: &[PathBuf]) -> Result<IngestReport> {
    let uploads = read_uploads(files)?;
    info!("Loaded {} files from disk", uploads.len());

    let spinner = ProgressBar::new_spinner().with_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("Indexing {} files...", uploads.len()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let worker = Arc::clone(pipeline);
    let outcome = tokio::task::spawn_blocking(move || worker.ingest(&uploads)).await;
    spinner.finish_and_clear();

    let report = outcome.context("Ingestion task failed")??;
    eprintln!(
        "{} Indexed {} chunks from {} files",
        style("✓").green(),
        report.num_chunks,
        report.num_files
    );
    for skipped in &report.skipped_files {
        eprintln!("  {} skipped {}", style("⚠").yellow(), skipped);
    }

    Ok(report)
}

async fn answer(pipeline: &Arc<RagPipeline>, question: String) -> Result<QueryResponse> {
    let worker = Arc::clone(pipeline);
    let response = tokio::task::spawn_blocking(move || worker.query(&question))
        .await
        .context("Query task failed")??;
    Ok(response)
}

fn print_response(response: &QueryResponse) {
    println!("{}", response.answer);
    if response.num_sources > 0 {
        println!();
        println!("{}", style(format!("Sources ({}):", response.num_sources)).bold());
        for source in &response.sources {
            println!("  {}", source);
        }
    }
}
