//! Core data model: selectors, element descriptors, candidates and results.
//!
//! `Selector` is deliberately an opaque string — the engine never parses it for
//! semantics except where a strategy's own precondition requires shallow syntactic
//! inspection (CSS Hierarchy, TestID/Text literal extraction).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An opaque query string resolvable by the driver to zero or more elements.
pub type Selector = String;

/// Snapshot of one DOM element, produced by the DOM Introspector.
///
/// Populated once per healing call; never retained across calls and never mutated
/// after construction.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ElementDescriptor {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "testId")]
    pub test_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "ariaLabel")]
    pub aria_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    pub element_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentDescriptor>,
}

/// The immediate parent of an `ElementDescriptor`, used by CSS-scoped heuristics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParentDescriptor {
    pub tag: String,
    #[serde(default)]
    pub classes: Vec<String>,
}

/// Which signal a candidate selector was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyTag {
    TestIdRecovery,
    TextMatching,
    CssHierarchy,
    LlmAnalysis,
}

impl StrategyTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyTag::TestIdRecovery => "data-testid-recovery",
            StrategyTag::TextMatching => "text-matching",
            StrategyTag::CssHierarchy => "css-hierarchy",
            StrategyTag::LlmAnalysis => "llm-analysis",
        }
    }
}

impl fmt::Display for StrategyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options threaded through a single `heal` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealOptions {
    /// Expected tag name of the healed element (e.g. `"button"`); grants a small
    /// confidence bonus to candidates whose descriptor tag matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_type: Option<String>,
}

/// A proposed replacement selector with an a-priori confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub selector: Selector,
    pub confidence: f64,
    pub strategy: StrategyTag,
    pub rationale: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Candidate {
    pub fn new(
        selector: impl Into<String>,
        confidence: f64,
        strategy: StrategyTag,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            selector: selector.into(),
            confidence: clamp_confidence(confidence),
            strategy,
            rationale: rationale.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Clamp a raw confidence score into the valid `[0, 1]` range.
pub fn clamp_confidence(confidence: f64) -> f64 {
    confidence.clamp(0.0, 1.0)
}

/// The sole return contract of all healing operations (`heal`, and by extension the
/// Retry Handler's `execute_with_healing`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealingResult {
    pub success: bool,
    pub selector: Selector,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyTag>,
    #[serde(default)]
    pub alternatives: Vec<Candidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl HealingResult {
    pub fn success(
        selector: impl Into<String>,
        confidence: f64,
        strategy: Option<StrategyTag>,
    ) -> Self {
        Self {
            success: true,
            selector: selector.into(),
            confidence: clamp_confidence(confidence),
            strategy,
            alternatives: Vec::new(),
            error: None,
            metadata: None,
        }
    }

    pub fn failure(selector: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            selector: selector.into(),
            confidence: 0.0,
            strategy: None,
            alternatives: Vec::new(),
            error: Some(error.into()),
            metadata: None,
        }
    }

    pub fn with_alternatives(mut self, alternatives: Vec<Candidate>) -> Self {
        self.alternatives = alternatives;
        self
    }

    pub fn with_metadata_flag(mut self, key: &str, value: bool) -> Self {
        let mut map = match self.metadata.take() {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        map.insert(key.to_string(), Value::Bool(value));
        self.metadata = Some(Value::Object(map));
        self
    }
}

/// Process-local record of the last successful heal for a broken selector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub healed_selector: Selector,
    pub confidence: f64,
    pub strategy: StrategyTag,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub use_count: u64,
}

/// Per-selector success/failure tally used to compute a flakiness score.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FlakinessEntry {
    pub successes: u64,
    pub failures: u64,
}

impl FlakinessEntry {
    /// `failures / (successes + failures)`; `0.0` when never observed.
    pub fn score(&self) -> f64 {
        let total = self.successes + self.failures;
        if total == 0 {
            0.0
        } else {
            self.failures as f64 / total as f64
        }
    }
}

/// A selector ranked by its flakiness score, returned by `Healer::flakiness_stats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlakinessStat {
    pub selector: Selector,
    pub successes: u64,
    pub failures: u64,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_clamped_on_construction() {
        let c = Candidate::new("#x", 1.4, StrategyTag::CssHierarchy, "test");
        assert_eq!(c.confidence, 1.0);
        let c = Candidate::new("#x", -0.2, StrategyTag::CssHierarchy, "test");
        assert_eq!(c.confidence, 0.0);
    }

    #[test]
    fn flakiness_score_is_failures_over_total() {
        let entry = FlakinessEntry {
            successes: 3,
            failures: 1,
        };
        assert_eq!(entry.score(), 0.25);
        assert_eq!(FlakinessEntry::default().score(), 0.0);
    }

    #[test]
    fn healing_result_metadata_flag_merges_into_object() {
        let result = HealingResult::success("#x", 0.9, Some(StrategyTag::TestIdRecovery))
            .with_metadata_flag("cached", true);
        assert_eq!(result.metadata.unwrap()["cached"], Value::Bool(true));
    }
}
