//! Strategy: LLM Analysis (spec §4.6).
//!
//! Treats the LLM as a fallible, untrusted collaborator: every suggestion is parsed
//! defensively across three degrading layers and nothing is trusted until the
//! driver validates it. Grounded on `src/llm/openai.rs`'s layered response parsing
//! (`extract_json_object`) and `crates/agent-core/src/llm_provider.rs`'s
//! `MockLlmProvider` pattern for testability without a real remote call.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::driver::Driver;
use crate::errors::HealError;
use crate::introspector::introspect_for_llm;
use crate::llm_client::LlmBackend;
use crate::types::{Candidate, ElementDescriptor, HealOptions, HealingResult, StrategyTag};

use super::Strategy;

const PROMPT_ELEMENT_SLICE: usize = 30;
const MAX_SUGGESTIONS: usize = 5;

const INTERACTIVE_TAGS: [&str; 5] = ["BUTTON", "A", "INPUT", "SELECT", "TEXTAREA"];

fn prioritize(elements: &[ElementDescriptor]) -> Vec<&ElementDescriptor> {
    let mut interactive = Vec::new();
    let mut textual = Vec::new();
    let mut rest = Vec::new();

    for el in elements {
        if INTERACTIVE_TAGS.contains(&el.tag.to_uppercase().as_str()) {
            interactive.push(el);
        } else if el.visible && el.text.as_deref().is_some_and(|t| !t.is_empty()) {
            textual.push(el);
        } else {
            rest.push(el);
        }
    }

    interactive.into_iter().chain(textual).chain(rest).collect()
}

fn build_prompt(
    broken_selector: &str,
    expected_type: &Option<String>,
    url: &str,
    title: &str,
    elements: &[ElementDescriptor],
) -> String {
    let prioritized = prioritize(elements);
    let slice: Vec<&&ElementDescriptor> = prioritized.iter().take(PROMPT_ELEMENT_SLICE).collect();
    let elements_json = serde_json::to_string(&slice).unwrap_or_else(|_| "[]".to_string());

    let expected_line = expected_type
        .as_ref()
        .map(|t| format!("Expected element tag: {t}\n"))
        .unwrap_or_default();

    format!(
        "A browser test selector no longer resolves.\n\
         Broken selector: {broken_selector}\n\
         {expected_line}\
         Page URL: {url}\n\
         Page title: {title}\n\
         Visible elements (JSON): {elements_json}\n\
         \n\
         Prioritize stable test-id attributes, then ARIA roles, then visible text, \
         then semantic classes, then other stable identifiers.\n\
         Respond with ONLY a JSON object of the exact shape:\n\
         {{\"suggestions\":[{{\"selector\":\"...\",\"confidence\":0.0,\"reasoning\":\"...\"}}]}}"
    )
}

#[derive(Debug, Deserialize)]
struct Suggestion {
    selector: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    reasoning: String,
}

#[derive(Debug, Deserialize)]
struct SuggestionsPayload {
    suggestions: Vec<Suggestion>,
}

static JSON_OBJECT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[\s\S]*\}").unwrap());
static SELECTOR_FIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""selector"\s*:\s*"([^"]*)""#).unwrap());
static KNOWN_SHAPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(\[data-testid="[^"]*"\]|\[role="[^"]*"\]|text="[^"]*"|[A-Za-z0-9_.#\[\]="'-]*:has-text\([^)]*\))"#,
    )
    .unwrap()
});

/// Parse the LLM's raw text response into candidates, degrading through three
/// layers: a full JSON object with a `suggestions` array, then a scan for bare
/// `"selector": "..."` fields, then a scan for known selector-like literals.
fn parse_suggestions(raw: &str) -> Vec<(String, f64, String)> {
    if let Some(m) = JSON_OBJECT_RE.find(raw) {
        if let Ok(payload) = serde_json::from_str::<SuggestionsPayload>(m.as_str()) {
            return payload
                .suggestions
                .into_iter()
                .map(|s| (s.selector, s.confidence, s.reasoning))
                .collect();
        }
    }

    let field_matches: Vec<_> = SELECTOR_FIELD_RE
        .captures_iter(raw)
        .map(|c| (c[1].to_string(), 0.6, "quoted-field scan".to_string()))
        .collect();
    if !field_matches.is_empty() {
        return field_matches;
    }

    KNOWN_SHAPE_RE
        .find_iter(raw)
        .map(|m| (m.as_str().to_string(), 0.4, "regex shape scan".to_string()))
        .collect()
}

pub struct LlmAnalysisStrategy {
    backend: Arc<dyn LlmBackend>,
}

impl LlmAnalysisStrategy {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Strategy for LlmAnalysisStrategy {
    fn tag(&self) -> StrategyTag {
        StrategyTag::LlmAnalysis
    }

    async fn heal(
        &self,
        driver: &dyn Driver,
        broken_selector: &str,
        options: &HealOptions,
    ) -> Result<HealingResult, HealError> {
        if !self.backend.is_available().await {
            return Ok(HealingResult::failure(
                broken_selector,
                "llm backend unavailable",
            ));
        }

        let elements = introspect_for_llm(driver).await?;
        let url = driver.url().await.unwrap_or_default();
        let title = driver.title().await.unwrap_or_default();
        let prompt = build_prompt(broken_selector, &options.expected_type, &url, &title, &elements);

        let raw = match self.backend.generate(&prompt).await {
            Ok(raw) => raw,
            Err(HealError::LlmTimeout) => {
                return Ok(HealingResult::failure(broken_selector, "llm backend timed out"))
            }
            Err(e) => return Ok(HealingResult::failure(broken_selector, e.to_string())),
        };

        let mut parsed = parse_suggestions(&raw);
        parsed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut seen = HashSet::new();
        let candidates: Vec<Candidate> = parsed
            .into_iter()
            .filter(|(sel, _, _)| seen.insert(sel.clone()))
            .take(MAX_SUGGESTIONS)
            .map(|(selector, confidence, reasoning)| {
                Candidate::new(selector, confidence, StrategyTag::LlmAnalysis, reasoning)
                    .with_metadata(json!({"source": "llm"}))
            })
            .collect();

        if candidates.is_empty() {
            return Ok(HealingResult::failure(
                broken_selector,
                "llm produced no parseable suggestions",
            ));
        }

        for candidate in &candidates {
            match driver.probe(&candidate.selector).await {
                Ok(count) if count >= 1 => {
                    return Ok(HealingResult::success(
                        candidate.selector.clone(),
                        candidate.confidence,
                        Some(StrategyTag::LlmAnalysis),
                    )
                    .with_alternatives(candidates.clone()));
                }
                _ => continue,
            }
        }

        Ok(HealingResult::failure(broken_selector, "no llm suggestion resolved on the page")
            .with_alternatives(candidates))
    }
}
