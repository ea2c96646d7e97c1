//! Layered configuration loading for the CLI: a YAML file over environment
//! variables over the built-in defaults, mirroring `selfheal_core::config`'s merge
//! semantics and the fallback-chain approach of `src/policy.rs::BrowserPolicy::load_with_paths`.
//! Programmatic override has no CLI surface, so the precedence realized here is
//! file > environment (the CLI's own flags are handled separately by `cli::Cli`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use selfheal_core::{HealerConfig, PartialHealerConfig};

const ENV_CONFIG_PATH: &str = "SELFHEAL_CONFIG_PATH";
const DEFAULT_CONFIG_PATHS: [&str; 2] = ["config/selfheal.yaml", "selfheal.yaml"];

/// Resolve the effective configuration: defaults, then environment variables,
/// then the config file, applied in that order so the file has the final say
/// (precedence is file > environment > defaults; programmatic override has no
/// CLI surface).
pub fn load_config(file_override: Option<&Path>) -> Result<HealerConfig> {
    let mut config = HealerConfig::default();
    config = config.merge(&env_overrides());
    if let Some(partial) = file_overrides(file_override)? {
        config = config.merge(&partial);
    }
    Ok(config)
}

fn env_overrides() -> PartialHealerConfig {
    let mut partial = PartialHealerConfig::default();
    if let Ok(v) = std::env::var("SELFHEAL_ENABLED") {
        partial.enabled = v.parse().ok();
    }
    if let Ok(v) = std::env::var("SELFHEAL_CACHE_HEALING") {
        partial.cache_healing = v.parse().ok();
    }
    if let Ok(v) = std::env::var("SELFHEAL_MAX_ATTEMPTS") {
        partial.max_attempts = v.parse().ok();
    }
    if let Ok(v) = std::env::var("SELFHEAL_OLLAMA_URL") {
        partial.ollama_url = Some(v);
    }
    if let Ok(v) = std::env::var("SELFHEAL_OLLAMA_MODEL") {
        partial.ollama_model = Some(v);
    }
    if let Ok(v) = std::env::var("SELFHEAL_OLLAMA_TIMEOUT_MS") {
        partial.ollama_timeout_ms = v.parse().ok();
    }
    if let Ok(v) = std::env::var("SELFHEAL_RETRY_MAX_RETRIES") {
        partial.retry_max_retries = v.parse().ok();
    }
    if let Ok(v) = std::env::var("SELFHEAL_RETRY_INITIAL_BACKOFF_MS") {
        partial.retry_initial_backoff_ms = v.parse().ok();
    }
    partial
}

fn file_overrides(file_override: Option<&Path>) -> Result<Option<PartialHealerConfig>> {
    match resolve_config_path(file_override) {
        Some(path) if path.exists() => {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            let partial: PartialHealerConfig = serde_yaml::from_str(&contents)
                .with_context(|| format!("parsing config file {}", path.display()))?;
            Ok(Some(partial))
        }
        _ => Ok(None),
    }
}

fn resolve_config_path(file_override: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = file_override {
        return Some(p.to_path_buf());
    }
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        return Some(PathBuf::from(p));
    }
    DEFAULT_CONFIG_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_nothing_present() {
        std::env::remove_var("SELFHEAL_CONFIG_PATH");
        std::env::remove_var("SELFHEAL_ENABLED");
        let config = load_config(Some(Path::new("/nonexistent/selfheal.yaml"))).unwrap();
        assert!(config.enabled);
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn file_override_applies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("selfheal.yaml");
        std::fs::write(&path, "max_attempts: 7\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.max_attempts, 7);
    }

    #[test]
    fn file_wins_over_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("selfheal.yaml");
        std::fs::write(&path, "max_attempts: 7\n").unwrap();
        std::env::set_var("SELFHEAL_MAX_ATTEMPTS", "9");
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.max_attempts, 7);
        std::env::remove_var("SELFHEAL_MAX_ATTEMPTS");
    }
}
