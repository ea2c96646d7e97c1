//! CLI entry point wiring: argument parsing, layered configuration, fixture-backed
//! driver construction, and dispatch into the Healer's public surface.

pub mod cli;
pub mod config_loader;
pub mod fixture;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use selfheal_core::{Driver, HealOptions, Healer, LlmBackend, OllamaClient, OllamaConfig};

pub async fn run() -> Result<()> {
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config_loader::load_config(cli.config.as_deref())?;
    let driver: Arc<dyn Driver> = Arc::new(fixture::load_fixture_driver(cli.fixture.as_deref())?);

    let llm_backend: Arc<dyn LlmBackend> = Arc::new(OllamaClient::new(OllamaConfig {
        url: config.ollama.url.clone(),
        model: config.ollama.model.clone(),
        timeout_ms: config.ollama.timeout_ms,
        ..OllamaConfig::default()
    })?);

    let healer = Healer::new(driver, llm_backend, config);

    match cli.command {
        cli::Command::Heal { selector, expected_type } => {
            let options = HealOptions { expected_type };
            let result = healer.heal(&selector, options).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        cli::Command::Health => {
            let report = healer.health_check().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        cli::Command::Flakiness => {
            let stats = healer.flakiness_stats().await;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        cli::Command::ClearCache => {
            healer.clear_cache().await;
            println!("cache cleared");
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).json().init();
}
