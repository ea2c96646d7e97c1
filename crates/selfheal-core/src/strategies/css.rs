//! Strategy: CSS Hierarchy (spec §4.5).
//!
//! Purely syntactic — no DOM similarity scoring, no LLM. Parses the broken selector
//! into structural features and emits a fixed, ordered family of transforms, each
//! carrying an a-priori confidence. De-duplicated, sorted descending, validated in
//! order against the driver; first existing candidate wins.

use std::collections::HashSet;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::driver::Driver;
use crate::errors::HealError;
use crate::types::{Candidate, HealOptions, HealingResult, StrategyTag};

use super::Strategy;

static ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"#[A-Za-z0-9_-]+").unwrap());
static CLASS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.([A-Za-z0-9_-]+)").unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Za-z][A-Za-z0-9]*)").unwrap());
static ATTR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\[[^\]]+\]"#).unwrap());
static NTH_CHILD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r":nth-child\(\d+\)").unwrap());

fn squeeze(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parts_of(selector: &str) -> Vec<&str> {
    selector
        .split_whitespace()
        .filter(|&t| t != ">")
        .collect()
}

fn tag_of(part: &str) -> Option<String> {
    TAG_RE.captures(part).map(|c| c[1].to_string())
}

fn classes_of(part: &str) -> Vec<String> {
    CLASS_RE.captures_iter(part).map(|c| c[1].to_string()).collect()
}

/// The 11 structural transforms from spec §4.5, in table order. The ordering by
/// confidence (not table position) below preserves an intentional quirk: transform 9
/// (0.62) ranks below transform 6 (0.68) even though it appears earlier in the
/// table — this is empirical tuning from the source system, not re-derived here.
fn generate_transforms(selector: &str) -> Vec<Candidate> {
    let whole = selector.trim();
    let parts = parts_of(whole);
    let depth = parts.len();

    let has_id = ID_RE.is_match(whole);
    let has_nth_child = NTH_CHILD_RE.is_match(whole);
    let all_classes: Vec<String> = {
        let mut seen = HashSet::new();
        CLASS_RE
            .captures_iter(whole)
            .map(|c| c[1].to_string())
            .filter(|c| seen.insert(c.clone()))
            .collect()
    };
    let has_class = !all_classes.is_empty();
    let has_attr = ATTR_RE.is_match(whole);
    let last_part = parts.last().copied();
    let first_part = parts.first().copied();

    let mut out: Vec<Candidate> = Vec::new();
    let mut push = |text: Option<String>, confidence: f64, rationale: &str| {
        if let Some(text) = text {
            if !text.trim().is_empty() {
                out.push(Candidate::new(text, confidence, StrategyTag::CssHierarchy, rationale));
            }
        }
    };

    // 1. Strip all #id fragments.
    if has_id && depth > 1 {
        push(
            Some(squeeze(&ID_RE.replace_all(whole, ""))),
            0.70,
            "strip id fragments",
        );
    }

    // 2. Strip :nth-child(N) fragments.
    if has_nth_child {
        push(
            Some(squeeze(&NTH_CHILD_RE.replace_all(whole, ""))),
            0.75,
            "strip nth-child fragments",
        );
    }

    // 3. Keep last two whitespace-separated parts.
    if depth > 2 {
        push(
            Some(parts[depth - 2..].join(" ")),
            0.65,
            "keep last two parts",
        );
    }

    // 4. All classes concatenated.
    if has_class {
        push(
            Some(format!(".{}", all_classes.join("."))),
            0.60,
            "all classes concatenated",
        );
    }

    // 5. Each class singly.
    if has_class {
        for class in &all_classes {
            push(Some(format!(".{class}")), 0.55, "single class");
        }
    }

    // 6. Last tag + all classes.
    if let Some(last) = last_part {
        if let Some(tag) = tag_of(last) {
            if has_class {
                push(
                    Some(format!("{tag}.{}", all_classes.join("."))),
                    0.68,
                    "last tag + all classes",
                );
            }
        }
    }

    // 7. Join parts with child combinator.
    if depth > 1 {
        push(Some(parts.join(" > ")), 0.58, "child combinator join");
    }

    // 8. Each bracketed attribute fragment alone.
    if has_attr {
        for attr_match in ATTR_RE.find_iter(whole) {
            push(
                Some(attr_match.as_str().to_string()),
                0.72,
                "bracketed attribute alone",
            );
        }
    }

    // 9. First tag + first class.
    if let Some(first) = first_part {
        if let (Some(tag), Some(class)) = (tag_of(first), classes_of(first).first().cloned()) {
            push(
                Some(format!("{tag}.{class}")),
                0.62,
                "first tag + first class",
            );
        }
    }

    // 10. Last tag alone.
    if let Some(last) = last_part {
        if let Some(tag) = tag_of(last) {
            push(Some(tag), 0.50, "last tag alone");
        }
    }

    // 11. Drop last part.
    if depth > 1 {
        push(Some(parts[..depth - 1].join(" ")), 0.45, "drop last part");
    }

    // de-duplicate by selector text, keeping the first (highest-table-priority) one
    let mut seen_selectors = HashSet::new();
    out.retain(|c| seen_selectors.insert(c.selector.clone()));

    // Purely syntactic: no expectedType bonus here, unlike TestID/Text Matching.
    // Applying one would reorder the preserved transform-confidence table.
    out.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
    out
}

pub struct CssHierarchyStrategy;

impl CssHierarchyStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CssHierarchyStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Strategy for CssHierarchyStrategy {
    fn tag(&self) -> StrategyTag {
        StrategyTag::CssHierarchy
    }

    async fn heal(
        &self,
        driver: &dyn Driver,
        broken_selector: &str,
        _options: &HealOptions,
    ) -> Result<HealingResult, HealError> {
        let candidates = generate_transforms(broken_selector);

        if candidates.is_empty() {
            return Ok(HealingResult::failure(
                broken_selector,
                "no structural transform applicable to selector",
            ));
        }

        for candidate in &candidates {
            match driver.probe(&candidate.selector).await {
                Ok(count) if count >= 1 => {
                    return Ok(HealingResult::success(
                        candidate.selector.clone(),
                        candidate.confidence,
                        Some(StrategyTag::CssHierarchy),
                    )
                    .with_alternatives(candidates.clone()));
                }
                _ => continue,
            }
        }

        Ok(HealingResult::failure(broken_selector, "no structural transform resolved on the page")
            .with_alternatives(candidates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::FixtureDriver;
    use crate::types::ElementDescriptor;

    #[test]
    fn transform_confidence_ordering_is_preserved_exactly() {
        // first part ("div.app") carries both a tag and a class, so transform 9
        // fires; last part ("button.submit-btn") also carries tag + class, so
        // transform 6 fires. Table confidence must rank 6 (0.68) above 9 (0.62).
        let candidates =
            generate_transforms(r#"div.app > main.content > section:nth-child(3) > button.submit-btn"#);
        let by_selector = |sel: &str| candidates.iter().find(|c| c.selector == sel);

        let t9 = by_selector("div.app");
        let t6 = by_selector("button.app.content.submit-btn");
        assert!(t9.is_some(), "expected first-tag+first-class candidate");
        assert!(t6.is_some(), "expected last-tag+all-classes candidate");
        assert_eq!(t9.unwrap().confidence, 0.62);
        assert_eq!(t6.unwrap().confidence, 0.68);
    }

    #[tokio::test]
    async fn heals_via_last_tag_plus_class_transform() {
        let driver = FixtureDriver::new(vec![ElementDescriptor {
            tag: "button".to_string(),
            classes: vec!["submit-btn".to_string()],
            visible: true,
            ..Default::default()
        }]);
        let strategy = CssHierarchyStrategy::new();
        let result = strategy
            .heal(
                &driver,
                "div#app > main.content > section:nth-child(3) > button.submit-btn",
                &HealOptions::default(),
            )
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.selector.contains("submit-btn"));
    }

    #[tokio::test]
    async fn no_transforms_for_bare_tag_selector_still_returns_last_tag_alone() {
        let driver = FixtureDriver::new(vec![ElementDescriptor {
            tag: "button".to_string(),
            visible: true,
            ..Default::default()
        }]);
        let strategy = CssHierarchyStrategy::new();
        let result = strategy
            .heal(&driver, "button", &HealOptions::default())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.selector, "button");
    }
}
