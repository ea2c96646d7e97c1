//! Strategy: TestID Recovery (spec §4.3).
//!
//! Handles selectors that reference a recognized stable-ID attribute. Scores every
//! page element carrying any recognized attribute against the extracted literal,
//! then emits one candidate per recognized attribute for each surviving match.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::driver::Driver;
use crate::errors::HealError;
use crate::introspector::introspect_default;
use crate::similarity::{contains_ignore_case, eq_ignore_case, levenshtein_similarity, normalize};
use crate::types::{Candidate, ElementDescriptor, HealOptions, HealingResult, StrategyTag};

use super::Strategy;

/// Attributes conventionally used to mark elements for automation.
pub const RECOGNIZED_ATTRS: [&str; 5] =
    ["data-testid", "data-test-id", "data-cy", "data-test", "testid"];

const DISCARD_BELOW: f64 = 0.5;

static EXTRACT_RES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    RECOGNIZED_ATTRS
        .iter()
        .map(|attr| {
            let pattern = format!(r#"\[{attr}=(?:"([^"]*)"|'([^']*)')\]"#);
            (*attr, Regex::new(&pattern).unwrap())
        })
        .collect()
});

#[derive(Debug, Clone, Copy)]
enum MatchKind {
    Exact,
    Normalized,
    Contains,
    ContainedBy,
    Fuzzy,
}

impl MatchKind {
    fn label(&self) -> &'static str {
        match self {
            MatchKind::Exact => "exact",
            MatchKind::Normalized => "normalized",
            MatchKind::Contains => "contains",
            MatchKind::ContainedBy => "contained-by",
            MatchKind::Fuzzy => "fuzzy",
        }
    }
}

fn extract_test_id(selector: &str) -> Option<String> {
    for (_, re) in EXTRACT_RES.iter() {
        if let Some(caps) = re.captures(selector) {
            let value = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str().to_string());
            if value.is_some() {
                return value;
            }
        }
    }
    None
}

fn score(extracted: &str, page_id: &str) -> Option<(f64, MatchKind)> {
    if eq_ignore_case(extracted, page_id) {
        return Some((0.95, MatchKind::Exact));
    }
    if normalize(extracted) == normalize(page_id) {
        return Some((0.90, MatchKind::Normalized));
    }
    if contains_ignore_case(page_id, extracted) {
        return Some((0.80, MatchKind::Contains));
    }
    if contains_ignore_case(extracted, page_id) {
        return Some((0.75, MatchKind::ContainedBy));
    }
    let similarity = levenshtein_similarity(extracted, page_id);
    if similarity <= DISCARD_BELOW {
        None
    } else {
        Some((similarity, MatchKind::Fuzzy))
    }
}

pub struct TestIdStrategy;

impl TestIdStrategy {
    pub fn new() -> Self {
        Self
    }

    fn generate_candidates(
        &self,
        extracted: &str,
        elements: &[ElementDescriptor],
        options: &HealOptions,
    ) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for el in elements {
            let Some(page_id) = el.test_id.as_deref() else {
                continue;
            };
            let Some((mut confidence, kind)) = score(extracted, page_id) else {
                continue;
            };

            if let Some(expected) = &options.expected_type {
                if el.tag.eq_ignore_ascii_case(expected) {
                    confidence = (confidence + 0.10).min(1.0);
                }
            }

            for attr in RECOGNIZED_ATTRS {
                candidates.push(Candidate::new(
                    format!(r#"[{attr}="{page_id}"]"#),
                    confidence,
                    StrategyTag::TestIdRecovery,
                    format!("test-id '{page_id}' matched via {}", kind.label()),
                ));
            }
        }

        candidates.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
        candidates
    }
}

impl Default for TestIdStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Strategy for TestIdStrategy {
    fn tag(&self) -> StrategyTag {
        StrategyTag::TestIdRecovery
    }

    async fn heal(
        &self,
        driver: &dyn Driver,
        broken_selector: &str,
        options: &HealOptions,
    ) -> Result<HealingResult, HealError> {
        let Some(extracted) = extract_test_id(broken_selector) else {
            return Ok(HealingResult::failure(
                broken_selector,
                "no recognized test-id attribute found in selector",
            ));
        };

        let elements = introspect_default(driver).await?;
        let candidates = self.generate_candidates(&extracted, &elements, options);

        if candidates.is_empty() {
            return Ok(HealingResult::failure(
                broken_selector,
                "no candidate test-id matched",
            )
            .with_alternatives(Vec::new()));
        }

        for candidate in &candidates {
            match driver.probe(&candidate.selector).await {
                Ok(count) if count >= 1 => {
                    return Ok(HealingResult::success(
                        candidate.selector.clone(),
                        candidate.confidence,
                        Some(StrategyTag::TestIdRecovery),
                    )
                    .with_alternatives(candidates.clone()));
                }
                _ => continue,
            }
        }

        Ok(HealingResult::failure(broken_selector, "no candidate test-id resolved on the page")
            .with_alternatives(candidates))
    }
}
