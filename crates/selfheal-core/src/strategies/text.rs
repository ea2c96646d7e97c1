//! Strategy: Text Matching (spec §4.4).
//!
//! Handles selectors whose syntax indicates a text query. Scores visible elements
//! with non-empty text against the extracted literal and emits several selector
//! variants per surviving element (exact-text, has-text, tag/role-scoped, aria-label,
//! title, and a truncated wildcard form for long text).

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::driver::Driver;
use crate::errors::HealError;
use crate::introspector::introspect_default;
use crate::similarity::levenshtein_similarity;
use crate::types::{Candidate, ElementDescriptor, HealOptions, HealingResult, StrategyTag};

use super::Strategy;

const SIMILARITY_THRESHOLD: f64 = 0.80;
const MAX_CANDIDATES: usize = 10;
const WILDCARD_TEXT_LEN_THRESHOLD: usize = 20;
const WILDCARD_PREFIX_LEN: usize = 15;

static HAS_TEXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#":has-text\((?:"([^"]*)"|'([^']*)')\)"#).unwrap());
static TEXT_EQ_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"text=(?:"([^"]*)"|'([^']*)')"#).unwrap());
static GET_BY_TEXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"getByText\((?:"([^"]*)"|'([^']*)')\)"#).unwrap());
static XPATH_CONTAINS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"contains\(\s*(?:text\(\)|\.)\s*,\s*(?:"([^"]*)"|'([^']*)')\s*\)"#).unwrap());

fn first_capture(caps: &regex::Captures) -> Option<String> {
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
}

fn extract_text_literal(selector: &str) -> Option<String> {
    for re in [&*HAS_TEXT_RE, &*TEXT_EQ_RE, &*GET_BY_TEXT_RE, &*XPATH_CONTAINS_RE] {
        if let Some(caps) = re.captures(selector) {
            if let Some(text) = first_capture(&caps) {
                return Some(text);
            }
        }
    }
    // bare references with no literal to extract still indicate a text-style query,
    // but without a literal there is nothing to score against.
    None
}

fn escape_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace(['\n', '\r', '\t'], " ")
}

fn base_similarity(extracted: &str, candidate: &str) -> f64 {
    let extracted_lt = extracted.trim().to_lowercase();
    let candidate_lt = candidate.trim().to_lowercase();

    if extracted_lt == candidate_lt {
        return 1.0;
    }

    if candidate_lt.contains(&extracted_lt) || extracted_lt.contains(&candidate_lt) {
        let (shorter, longer) = if extracted_lt.len() <= candidate_lt.len() {
            (extracted_lt.len(), candidate_lt.len())
        } else {
            (candidate_lt.len(), extracted_lt.len())
        };
        return 0.85 + (shorter as f64 / longer as f64) * 0.15;
    }

    if (extracted.len() as i64 - candidate.len() as i64).abs() < 10 {
        return levenshtein_similarity(extracted, candidate);
    }

    crate::similarity::word_overlap(extracted, candidate)
}

/// Applies the exact/trim-exact confidence overrides from spec §4.4 step 4 on top
/// of the raw similarity score.
fn scored_confidence(extracted: &str, candidate: &str, expected_type: &Option<String>, tag: &str) -> Option<f64> {
    let base = base_similarity(extracted, candidate);
    if base < SIMILARITY_THRESHOLD {
        return None;
    }

    let mut confidence = if extracted == candidate {
        0.95
    } else if extracted.trim() == candidate.trim() {
        0.92
    } else {
        base
    };

    if let Some(expected) = expected_type {
        if tag.eq_ignore_ascii_case(expected) {
            confidence = (confidence + 0.05).min(1.0);
        }
    }

    Some(confidence)
}

fn emit_variants(el: &ElementDescriptor, confidence: f64) -> Vec<Candidate> {
    let text = el.text.as_deref().unwrap_or("");
    let escaped = escape_text(text);
    let mut out = Vec::new();

    out.push(Candidate::new(
        format!(r#"text="{escaped}""#),
        confidence,
        StrategyTag::TextMatching,
        "exact-text form",
    ));
    out.push(Candidate::new(
        format!(r#":has-text("{escaped}")"#),
        confidence,
        StrategyTag::TextMatching,
        "has-text form",
    ));

    if el.tag.eq_ignore_ascii_case("button") || el.tag.eq_ignore_ascii_case("a") {
        out.push(Candidate::new(
            format!(r#"{}:has-text("{escaped}")"#, el.tag.to_lowercase()),
            confidence,
            StrategyTag::TextMatching,
            "tag-scoped has-text form",
        ));
    }

    if let Some(role) = &el.role {
        out.push(Candidate::new(
            format!(r#"[role="{role}"]:has-text("{escaped}")"#),
            confidence,
            StrategyTag::TextMatching,
            "role-scoped has-text form",
        ));
    }

    if let Some(label) = &el.aria_label {
        out.push(Candidate::new(
            format!(r#"[aria-label="{label}"]"#),
            confidence,
            StrategyTag::TextMatching,
            "aria-label equality form",
        ));
    }

    if let Some(title) = &el.title {
        out.push(Candidate::new(
            format!(r#"[title="{title}"]"#),
            confidence,
            StrategyTag::TextMatching,
            "title equality form",
        ));
    }

    if text.chars().count() > WILDCARD_TEXT_LEN_THRESHOLD {
        let prefix: String = text.chars().take(WILDCARD_PREFIX_LEN).collect();
        out.push(Candidate::new(
            format!(r#":has-text("{}")"#, escape_text(&prefix)),
            confidence,
            StrategyTag::TextMatching,
            "wildcard-contains form (first 15 chars)",
        ));
    }

    out
}

pub struct TextMatchingStrategy;

impl TextMatchingStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TextMatchingStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Strategy for TextMatchingStrategy {
    fn tag(&self) -> StrategyTag {
        StrategyTag::TextMatching
    }

    async fn heal(
        &self,
        driver: &dyn Driver,
        broken_selector: &str,
        options: &HealOptions,
    ) -> Result<HealingResult, HealError> {
        let Some(extracted) = extract_text_literal(broken_selector) else {
            return Ok(HealingResult::failure(
                broken_selector,
                "no literal text could be extracted from selector",
            ));
        };

        let elements = introspect_default(driver).await?;
        let mut candidates = Vec::new();

        for el in &elements {
            let Some(text) = &el.text else { continue };
            let len = text.chars().count();
            if !(1..=999).contains(&len) {
                continue;
            }
            let Some(confidence) =
                scored_confidence(&extracted, text, &options.expected_type, &el.tag)
            else {
                continue;
            };
            candidates.extend(emit_variants(el, confidence));
        }

        candidates.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
        candidates.truncate(MAX_CANDIDATES);

        if candidates.is_empty() {
            return Ok(HealingResult::failure(
                broken_selector,
                "no element matched the extracted text closely enough",
            ));
        }

        for candidate in &candidates {
            if let Ok(count) = driver.probe(&candidate.selector).await {
                if count >= 1 {
                    return Ok(HealingResult::success(
                        candidate.selector.clone(),
                        candidate.confidence,
                        Some(StrategyTag::TextMatching),
                    )
                    .with_alternatives(candidates.clone()));
                }
            }
        }

        Ok(HealingResult::failure(broken_selector, "no text candidate resolved on the page")
            .with_alternatives(candidates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::FixtureDriver;
    use crate::types::ElementDescriptor;

    fn button(text: &str) -> ElementDescriptor {
        ElementDescriptor {
            tag: "button".to_string(),
            text: Some(text.to_string()),
            visible: true,
            ..Default::default()
        }
    }

    #[test]
    fn extracts_literal_from_text_equals_form() {
        assert_eq!(
            extract_text_literal(r#"text="Submit Form""#),
            Some("Submit Form".to_string())
        );
    }

    #[test]
    fn contains_similarity_uses_ratio_formula() {
        let sim = base_similarity("Submit", "Submit Form");
        assert!(sim > 0.85 && sim < 1.0);
    }

    #[tokio::test]
    async fn heals_fuzzy_text_scenario() {
        let driver = FixtureDriver::new(vec![button("Submit")]);
        let strategy = TextMatchingStrategy::new();
        let result = strategy
            .heal(&driver, r#"text="Submit Form""#, &HealOptions::default())
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.confidence >= 0.80);
        assert!(result.selector.contains("Submit"));
    }

    #[tokio::test]
    async fn no_signal_when_no_literal_extractable() {
        let driver = FixtureDriver::new(vec![]);
        let strategy = TextMatchingStrategy::new();
        let result = strategy
            .heal(&driver, "button.submit", &HealOptions::default())
            .await
            .unwrap();
        assert!(!result.success);
    }
}
