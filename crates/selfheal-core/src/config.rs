//! Configuration surface (spec §6). `HealerConfig` is captured at construction and
//! re-materialized on `update_config`, which re-instantiates all strategies.
//!
//! Struct shape follows `crates/soulbrowser-kernel/src/app_settings.rs`'s
//! serde-derived `Config`/`Default` pairing. Layered loading (environment, file,
//! programmatic) is owned by the `selfheal-cli` crate, following the fallback-chain
//! mechanics of `src/policy.rs::BrowserPolicy::load_with_paths`; this module only
//! defines the struct and the merge of a partial override over a base.

use serde::{Deserialize, Serialize};

use crate::types::StrategyTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaSettings {
    pub url: String,
    pub model: String,
    pub timeout_ms: u64,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    pub on_timeout: bool,
    pub on_flakiness: bool,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    /// Not enumerated in the configuration surface table, but required by the
    /// Retry Handler's backoff formula (spec §4.7); defaulted to the value the
    /// spec states there (10,000 ms).
    pub max_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            on_timeout: true,
            on_flakiness: true,
            max_retries: 2,
            initial_backoff_ms: 1000,
            max_backoff_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySettings {
    pub enabled: bool,
    pub log_level: LogLevel,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: LogLevel::Info,
        }
    }
}

/// Default strategy dispatch order, matching the component table in spec §2.
pub fn default_strategy_order() -> Vec<StrategyTag> {
    vec![
        StrategyTag::TestIdRecovery,
        StrategyTag::TextMatching,
        StrategyTag::CssHierarchy,
        StrategyTag::LlmAnalysis,
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealerConfig {
    pub enabled: bool,
    pub strategies: Vec<StrategyTag>,
    pub max_attempts: u32,
    pub cache_healing: bool,
    pub ollama: OllamaSettings,
    pub retry: RetrySettings,
    pub telemetry: TelemetrySettings,
}

impl Default for HealerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strategies: default_strategy_order(),
            max_attempts: 3,
            cache_healing: true,
            ollama: OllamaSettings::default(),
            retry: RetrySettings::default(),
            telemetry: TelemetrySettings::default(),
        }
    }
}

/// A sparse override of `HealerConfig`, used by file/environment/programmatic
/// layers. Every field is optional; `None` means "inherit the current value".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartialHealerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategies: Option<Vec<StrategyTag>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_healing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ollama_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ollama_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ollama_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_on_timeout: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_on_flakiness: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_initial_backoff_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_max_backoff_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry_log_level: Option<LogLevel>,
}

impl HealerConfig {
    /// Merge `partial` over `self`, field by field; `None` leaves the base value.
    pub fn merge(&self, partial: &PartialHealerConfig) -> HealerConfig {
        let mut out = self.clone();
        if let Some(v) = partial.enabled {
            out.enabled = v;
        }
        if let Some(v) = &partial.strategies {
            out.strategies = v.clone();
        }
        if let Some(v) = partial.max_attempts {
            out.max_attempts = v;
        }
        if let Some(v) = partial.cache_healing {
            out.cache_healing = v;
        }
        if let Some(v) = &partial.ollama_url {
            out.ollama.url = v.clone();
        }
        if let Some(v) = &partial.ollama_model {
            out.ollama.model = v.clone();
        }
        if let Some(v) = partial.ollama_timeout_ms {
            out.ollama.timeout_ms = v;
        }
        if let Some(v) = partial.retry_on_timeout {
            out.retry.on_timeout = v;
        }
        if let Some(v) = partial.retry_on_flakiness {
            out.retry.on_flakiness = v;
        }
        if let Some(v) = partial.retry_max_retries {
            out.retry.max_retries = v;
        }
        if let Some(v) = partial.retry_initial_backoff_ms {
            out.retry.initial_backoff_ms = v;
        }
        if let Some(v) = partial.retry_max_backoff_ms {
            out.retry.max_backoff_ms = v;
        }
        if let Some(v) = partial.telemetry_enabled {
            out.telemetry.enabled = v;
        }
        if let Some(v) = partial.telemetry_log_level {
            out.telemetry.log_level = v;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let config = HealerConfig::default();
        assert!(config.enabled);
        assert_eq!(config.max_attempts, 3);
        assert!(config.cache_healing);
        assert_eq!(config.ollama.url, "http://localhost:11434");
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.initial_backoff_ms, 1000);
        assert!(config.telemetry.enabled);
    }

    #[test]
    fn merge_only_overrides_present_fields() {
        let base = HealerConfig::default();
        let partial = PartialHealerConfig {
            max_attempts: Some(5),
            ..Default::default()
        };
        let merged = base.merge(&partial);
        assert_eq!(merged.max_attempts, 5);
        assert_eq!(merged.ollama.url, base.ollama.url);
    }
}
