//! LLM backend client (spec §6, §4.6 Security).
//!
//! The LLM backend is an external collaborator: a local or remote text-generation
//! HTTP service. `OllamaClient` is the concrete implementation, grounded on
//! `OpenAiLlmProvider` in the teacher's `llm/openai.rs` (a `reqwest::Client` built
//! with an explicit timeout, JSON request/response structs). Construction enforces
//! hostname and port allow-listing — a misconfigured endpoint fails fast rather than
//! silently leaking requests to an arbitrary host.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::HealError;

/// Default allow-listed hostnames for the LLM endpoint.
pub const DEFAULT_ALLOWED_HOSTS: [&str; 2] = ["localhost", "127.0.0.1"];
/// Default allow-listed ports for the LLM endpoint.
pub const DEFAULT_ALLOWED_PORTS: [u16; 4] = [80, 443, 8080, 11434];

const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(5);

/// An async collaborator capable of availability probing and text generation.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Availability probe; non-200 (or network failure) means unavailable.
    async fn is_available(&self) -> bool;

    /// Non-streaming text generation against `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, HealError>;
}

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub url: String,
    pub model: String,
    pub timeout_ms: u64,
    pub allowed_hosts: Vec<String>,
    pub allowed_ports: Vec<u16>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            timeout_ms: 30_000,
            allowed_hosts: DEFAULT_ALLOWED_HOSTS.iter().map(|s| s.to_string()).collect(),
            allowed_ports: DEFAULT_ALLOWED_PORTS.to_vec(),
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f64,
    top_p: f64,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct OllamaClient {
    client: reqwest::Client,
    base_url: Url,
    model: String,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Result<Self, HealError> {
        let base_url = Url::parse(&config.url)
            .map_err(|e| HealError::Config(format!("invalid ollama.url '{}': {e}", config.url)))?;

        let host = base_url
            .host_str()
            .ok_or_else(|| HealError::Config("ollama.url has no host".to_string()))?;
        if !config.allowed_hosts.iter().any(|h| h == host) {
            return Err(HealError::Config(format!(
                "host '{host}' is not in the allow-list {:?}",
                config.allowed_hosts
            )));
        }

        let port = base_url
            .port_or_known_default()
            .ok_or_else(|| HealError::Config("ollama.url has no resolvable port".to_string()))?;
        if !config.allowed_ports.contains(&port) {
            return Err(HealError::Config(format!(
                "port {port} is not in the allow-list {:?}",
                config.allowed_ports
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| HealError::Config(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            model: config.model,
        })
    }
}

#[async_trait]
impl LlmBackend for OllamaClient {
    async fn is_available(&self) -> bool {
        let Ok(url) = self.base_url.join("/api/tags") else {
            return false;
        };
        self.client
            .get(url)
            .timeout(AVAILABILITY_TIMEOUT)
            .send()
            .await
            .map(|resp| resp.status().is_success())
            .unwrap_or(false)
    }

    async fn generate(&self, prompt: &str) -> Result<String, HealError> {
        let url = self
            .base_url
            .join("/api/generate")
            .map_err(|e| HealError::Config(format!("invalid generate url: {e}")))?;

        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: 0.3,
                top_p: 0.9,
            },
        };

        let resp = self.client.post(url).json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                HealError::LlmTimeout
            } else {
                HealError::LlmUnavailable(e.to_string())
            }
        })?;

        if !resp.status().is_success() {
            return Err(HealError::LlmUnavailable(format!(
                "llm backend returned status {}",
                resp.status()
            )));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| HealError::LlmMalformed(e.to_string()))?;

        Ok(parsed.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_disallowed_host() {
        let config = OllamaConfig {
            url: "http://evil.example.com:11434".to_string(),
            ..OllamaConfig::default()
        };
        assert!(OllamaClient::new(config).is_err());
    }

    #[test]
    fn rejects_disallowed_port() {
        let config = OllamaConfig {
            url: "http://localhost:9999".to_string(),
            ..OllamaConfig::default()
        };
        assert!(OllamaClient::new(config).is_err());
    }

    #[test]
    fn accepts_default_localhost_endpoint() {
        let config = OllamaConfig::default();
        assert!(OllamaClient::new(config).is_ok());
    }
}
