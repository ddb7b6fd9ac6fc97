
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::{Config, ConfigError, EmbeddingConfig, GenerationConfig, Provider};
use crate::http;

const PROBE_TIMEOUT_SECONDS: u64 = 5;

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 DocQuery Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir);

    eprintln!("{}", style("Embedding Service").bold().yellow());
    eprintln!("Used to embed document chunks and questions.");
    eprintln!();
    configure_embedding(&mut config.embedding)?;

    eprintln!();
    eprintln!("{}", style("Generation Service").bold().yellow());
    eprintln!("Used to write answers from the retrieved context.");
    eprintln!();
    configure_generation(&mut config.generation)?;

    eprintln!();
    let top_k: usize = Input::new()
        .with_prompt("Chunks retrieved per question (top k)")
        .default(config.retrieval.top_k)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=100).contains(input) {
                Ok(())
            } else {
                Err("top k must be between 1 and 100")
            }
        })
        .interact_text()?;
    config.retrieval.top_k = top_k;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());
    report_probe("Embedding service", probe_embedding(&config.embedding));
    report_probe("Generation service", probe_generation(&config.generation));

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config: &Config) {
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Embedding:").bold().yellow());
    eprintln!("  Provider: {}", style(config.embedding.provider).cyan());
    eprintln!("  Base URL: {}", style(&config.embedding.base_url).cyan());
    eprintln!("  Model: {}", style(&config.embedding.model).cyan());
    eprintln!("  Dimension: {}", style(config.embedding.dimension).cyan());
    eprintln!("  Batch Size: {}", style(config.embedding.batch_size).cyan());
    eprintln!(
        "  Timeout: {}s",
        style(config.embedding.timeout_seconds).cyan()
    );
    eprintln!(
        "  API key: {}",
        describe_key(&config.embedding.api_key_env, config.embedding.api_key())
    );

    eprintln!();
    eprintln!("{}", style("Generation:").bold().yellow());
    eprintln!("  Provider: {}", style(config.generation.provider).cyan());
    eprintln!("  Base URL: {}", style(&config.generation.base_url).cyan());
    eprintln!("  Model: {}", style(&config.generation.model).cyan());
    eprintln!(
        "  Max output tokens: {}",
        style(config.generation.max_output_tokens).cyan()
    );
    eprintln!(
        "  Temperature: {}",
        style(config.generation.temperature).cyan()
    );
    eprintln!(
        "  Timeout: {}s",
        style(config.generation.timeout_seconds).cyan()
    );
    eprintln!(
        "  API key: {}",
        describe_key(&config.generation.api_key_env, config.generation.api_key())
    );

    eprintln!();
    eprintln!("{}", style("Retrieval:").bold().yellow());
    eprintln!(
        "  Chunk size: {} tokens ({} overlap)",
        style(config.chunking.max_chunk_size).cyan(),
        style(config.chunking.chunk_overlap).cyan()
    );
    eprintln!("  Top k: {}", style(config.retrieval.top_k).cyan());

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );
}

fn describe_key(env_name: &str, key: Option<String>) -> String {
    match key {
        Some(_) => format!("{} (from ${})", style("set").green(), env_name),
        None => format!("{} (${} is empty)", style("missing").red(), env_name),
    }
}

fn load_existing_config(config_dir: &Path) -> Config {
    Config::load(config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Config {
                base_dir: config_dir.to_path_buf(),
                ..Config::default()
            }
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            config
        },
    )
}

fn select_provider(prompt: &str, current: Provider) -> Result<Provider> {
    let names: Vec<&str> = Provider::ALL.iter().map(|p| p.as_str()).collect();
    let default_index = Provider::ALL
        .iter()
        .position(|&p| p == current)
        .unwrap_or(0);

    let index = Select::new()
        .with_prompt(prompt)
        .default(default_index)
        .items(&names)
        .interact()?;

    Ok(Provider::ALL[index])
}

fn prompt_base_url(prompt: &str, current: &str) -> Result<String> {
    let base_url: String = Input::new()
        .with_prompt(prompt)
        .default(current.to_string())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            EmbeddingConfig::default().set_base_url(input.clone())
        })
        .interact_text()?;
    Ok(base_url)
}

fn prompt_model(prompt: &str, current: &str) -> Result<String> {
    let model: String = Input::new()
        .with_prompt(prompt)
        .default(current.to_string())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    Ok(model)
}

fn configure_embedding(embedding: &mut EmbeddingConfig) -> Result<()> {
    let provider = select_provider("Embedding provider", embedding.provider)?;
    embedding.set_provider(provider);

    let base_url = prompt_base_url("Embedding base URL", &embedding.base_url)?;
    let model = prompt_model("Embedding model", &embedding.model)?;

    let dimension: u32 = Input::new()
        .with_prompt("Embedding dimension")
        .default(embedding.dimension)
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Maximum texts per embedding request")
        .default(embedding.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 || *input > 2048 {
                Err("Batch size must be between 1 and 2048")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    embedding.set_base_url(base_url)?;
    embedding.set_model(model)?;
    embedding.set_dimension(dimension)?;
    embedding.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_generation(generation: &mut GenerationConfig) -> Result<()> {
    let provider = select_provider("Generation provider", generation.provider)?;
    generation.set_provider(provider);

    let base_url = prompt_base_url("Generation base URL", &generation.base_url)?;
    let model = prompt_model("Generation model", &generation.model)?;

    let max_output_tokens: u32 = Input::new()
        .with_prompt("Maximum answer length (tokens)")
        .default(generation.max_output_tokens)
        .interact_text()?;

    let temperature: f32 = Input::new()
        .with_prompt("Sampling temperature")
        .default(generation.temperature)
        .validate_with(|input: &f32| -> Result<(), &str> {
            if (0.0..=2.0).contains(input) {
                Ok(())
            } else {
                Err("Temperature must be between 0.0 and 2.0")
            }
        })
        .interact_text()?;

    generation.set_base_url(base_url)?;
    generation.set_model(model)?;
    generation.set_max_output_tokens(max_output_tokens)?;
    generation.set_temperature(temperature)?;

    Ok(())
}

fn report_probe(label: &str, reachable: bool) {
    if reachable {
        eprintln!("{}", style(format!("✓ {label} reachable")).green());
    } else {
        eprintln!(
            "{}",
            style(format!("⚠ Warning: could not reach {label}")).yellow()
        );
    }
}

/// Probe the embedding endpoint's host
#[inline]
pub fn probe_embedding(config: &EmbeddingConfig) -> bool {
    let agent = http::build_agent(Duration::from_secs(PROBE_TIMEOUT_SECONDS));
    config
        .probe_url()
        .is_ok_and(|url| http::probe(&agent, &url, config.api_key().as_deref()))
}

/// Probe the generation endpoint's host
#[inline]
pub fn probe_generation(config: &GenerationConfig) -> bool {
    let agent = http::build_agent(Duration::from_secs(PROBE_TIMEOUT_SECONDS));
    config
        .probe_url()
        .is_ok_and(|url| http::probe(&agent, &url, config.api_key().as_deref()))
}
