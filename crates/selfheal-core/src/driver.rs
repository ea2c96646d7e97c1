//! The browser automation driver — an external collaborator (spec §6).
//!
//! The real driver (CDP, Playwright, or similar) is out of scope; this module
//! defines the narrow trait the engine depends on and a `FixtureDriver` that serves a
//! static, in-memory DOM snapshot. The fixture is deliberately approximate about CSS
//! combinators (it matches against the last compound segment of a selector rather
//! than walking ancestry) — enough to exercise every strategy and the Healer without
//! a real browser, not a CSS engine.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::errors::HealError;
use crate::types::ElementDescriptor;

/// An in-page interaction verb, passed to `Driver::interact`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionAction {
    Click,
    Fill,
    Type,
    Select,
    Check,
    Uncheck,
    Screenshot,
    Goto,
}

/// Wait condition for `Driver::wait`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    Attached,
    Visible,
    Hidden,
    Detached,
}

/// Narrow interface consumed by strategies and the Healer. The sole DOM read channel
/// is `introspect`; errors raised here are consumed verbatim by the Retry Handler.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Number of elements the selector currently resolves to. `>= 1` means present.
    async fn probe(&self, selector: &str) -> Result<u32, HealError>;

    /// Wait for `selector` to reach `state`, or time out.
    async fn wait(
        &self,
        selector: &str,
        state: WaitState,
        timeout_ms: u64,
    ) -> Result<(), HealError>;

    /// In-page execution; the sole DOM read channel. `code` is opaque to the engine
    /// (the real driver interprets it as JavaScript); the fixture ignores it and
    /// always returns its full snapshot, deferring bounds/visibility filtering to
    /// the Introspector.
    async fn introspect(&self, code: &str, args: &Value) -> Result<Value, HealError>;

    /// Perform a user-facing interaction.
    async fn interact(
        &self,
        selector: &str,
        action: InteractionAction,
        options: &Value,
    ) -> Result<(), HealError>;

    /// Current page URL, used for LLM context.
    async fn url(&self) -> Result<String, HealError>;

    /// Current page title, used for LLM context.
    async fn title(&self) -> Result<String, HealError>;
}

/// A static, JSON-described DOM snapshot served to the engine in place of a live
/// browser. Used by the CLI demo surface and by the crate's own tests.
#[derive(Debug, Clone)]
pub struct FixtureDriver {
    elements: Vec<ElementDescriptor>,
    page_url: String,
    page_title: String,
}

impl FixtureDriver {
    pub fn new(elements: Vec<ElementDescriptor>) -> Self {
        Self {
            elements,
            page_url: "https://example.test/".to_string(),
            page_title: "Fixture Page".to_string(),
        }
    }

    pub fn with_page(mut self, url: impl Into<String>, title: impl Into<String>) -> Self {
        self.page_url = url.into();
        self.page_title = title.into();
        self
    }

    pub fn elements(&self) -> &[ElementDescriptor] {
        &self.elements
    }

    fn matching_count(&self, selector: &str) -> u32 {
        self.elements
            .iter()
            .filter(|el| matches_selector(el, selector))
            .count() as u32
    }
}

#[async_trait]
impl Driver for FixtureDriver {
    async fn probe(&self, selector: &str) -> Result<u32, HealError> {
        if selector.trim().is_empty() {
            return Ok(0);
        }
        Ok(self.matching_count(selector))
    }

    async fn wait(
        &self,
        selector: &str,
        _state: WaitState,
        _timeout_ms: u64,
    ) -> Result<(), HealError> {
        if self.matching_count(selector) >= 1 {
            Ok(())
        } else {
            Err(HealError::DriverError(format!(
                "waiting for selector '{selector}' exceeded timeout"
            )))
        }
    }

    async fn introspect(&self, _code: &str, _args: &Value) -> Result<Value, HealError> {
        serde_json::to_value(&self.elements)
            .map_err(|e| HealError::DriverError(format!("introspect serialization failed: {e}")))
    }

    async fn interact(
        &self,
        selector: &str,
        _action: InteractionAction,
        _options: &Value,
    ) -> Result<(), HealError> {
        if self.matching_count(selector) >= 1 {
            Ok(())
        } else {
            Err(HealError::DriverError(format!(
                "element not found for selector '{selector}'"
            )))
        }
    }

    async fn url(&self) -> Result<String, HealError> {
        Ok(self.page_url.clone())
    }

    async fn title(&self) -> Result<String, HealError> {
        Ok(self.page_title.clone())
    }
}

static ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"#([A-Za-z0-9_-]+)").unwrap());
static CLASS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.([A-Za-z0-9_-]+)").unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Za-z][A-Za-z0-9]*)").unwrap());
static ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\[([A-Za-z0-9_-]+)=(?:"([^"]*)"|'([^']*)')\]"#).unwrap());
static HAS_TEXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#":has-text\((?:"([^"]*)"|'([^']*)')\)"#).unwrap());
static TEXT_EQ_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"text=(?:"([^"]*)"|'([^']*)'|([^\s]+))"#).unwrap());
static GET_BY_TEXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"getByText\((?:"([^"]*)"|'([^']*)')\)"#).unwrap());
static CONTAINS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"contains\((?:"([^"]*)"|'([^']*)')\)"#).unwrap());

fn first_capture(caps: &regex::Captures) -> Option<String> {
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str().to_string())
}

/// Approximate CSS/text-query matcher for the fixture DOM. Matches against the last
/// whitespace/`>`-separated compound segment only — sufficient for validating
/// healing candidates against a flat fixture snapshot, not a full CSS engine.
fn matches_selector(el: &ElementDescriptor, selector: &str) -> bool {
    let selector = selector.trim();

    let text_query = HAS_TEXT_RE
        .captures(selector)
        .and_then(|c| first_capture(&c))
        .map(|t| (t, false))
        .or_else(|| {
            GET_BY_TEXT_RE
                .captures(selector)
                .and_then(|c| first_capture(&c))
                .map(|t| (t, false))
        })
        .or_else(|| {
            CONTAINS_RE
                .captures(selector)
                .and_then(|c| first_capture(&c))
                .map(|t| (t, false))
        })
        .or_else(|| {
            TEXT_EQ_RE
                .captures(selector)
                .and_then(|c| first_capture(&c))
                .map(|t| (t, true))
        });

    if let Some((needle, exact)) = &text_query {
        let haystack = el.text.as_deref().unwrap_or("");
        let matched = if *exact {
            haystack.trim().eq_ignore_ascii_case(needle.trim())
        } else {
            haystack.to_lowercase().contains(&needle.to_lowercase())
        };
        if !matched {
            return false;
        }
    }

    // Compound part is the selector with any text-pseudo stripped, then only the
    // last descendant segment is considered.
    let stripped = HAS_TEXT_RE.replace_all(selector, "");
    let stripped = GET_BY_TEXT_RE.replace_all(&stripped, "");
    let stripped = CONTAINS_RE.replace_all(&stripped, "");
    let stripped = TEXT_EQ_RE.replace_all(&stripped, "");
    let compound = stripped
        .split('>')
        .flat_map(|seg| seg.split_whitespace())
        .last()
        .unwrap_or("")
        .trim();

    if compound.is_empty() {
        return text_query.is_some();
    }

    if let Some(id_caps) = ID_RE.captures(compound) {
        let wanted = &id_caps[1];
        if el.id.as_deref() != Some(wanted) {
            return false;
        }
    }

    for class_caps in CLASS_RE.captures_iter(compound) {
        let wanted = &class_caps[1];
        if !el.classes.iter().any(|c| c == wanted) {
            return false;
        }
    }

    if let Some(tag_caps) = TAG_RE.captures(compound) {
        let wanted = tag_caps[1].to_lowercase();
        if el.tag.to_lowercase() != wanted {
            return false;
        }
    }

    for attr_caps in ATTR_RE.captures_iter(compound) {
        let name = attr_caps[1].to_lowercase();
        let value = attr_caps
            .get(2)
            .or_else(|| attr_caps.get(3))
            .map(|m| m.as_str())
            .unwrap_or_default();
        let actual = match name.as_str() {
            "data-testid" | "data-test-id" | "data-cy" | "data-test" | "testid" => {
                el.test_id.as_deref()
            }
            "role" => el.role.as_deref(),
            "aria-label" => el.aria_label.as_deref(),
            "title" => el.title.as_deref(),
            "name" => el.name.as_deref(),
            "type" => el.element_type.as_deref(),
            _ => None,
        };
        if actual != Some(value) {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el() -> ElementDescriptor {
        ElementDescriptor {
            tag: "button".to_string(),
            id: None,
            classes: vec!["submit-btn".to_string()],
            text: Some("Submit".to_string()),
            test_id: None,
            role: None,
            aria_label: None,
            element_type: None,
            name: None,
            title: None,
            visible: true,
            parent: None,
        }
    }

    #[test]
    fn matches_class_selector() {
        assert!(matches_selector(&el(), ".submit-btn"));
    }

    #[test]
    fn matches_tag_and_class() {
        assert!(matches_selector(&el(), "button.submit-btn"));
    }

    #[test]
    fn no_match_on_missing_id() {
        assert!(!matches_selector(&el(), "button#submit"));
    }

    #[test]
    fn matches_has_text() {
        assert!(matches_selector(&el(), "button:has-text(\"Submit\")"));
    }

    #[test]
    fn matches_attr_selector() {
        let mut e = el();
        e.test_id = Some("submit-btn-old".to_string());
        // ElementDescriptor has a single `test_id` field backing every recognized
        // test-id attribute name, so both forms resolve to the same value.
        assert!(matches_selector(&e, "[data-cy=\"submit-btn-old\"]"));
        assert!(matches_selector(&e, "[data-testid=\"submit-btn-old\"]"));
        assert!(!matches_selector(&e, "[data-testid=\"something-else\"]"));
    }

    #[tokio::test]
    async fn fixture_driver_probe_counts_matches() {
        let driver = FixtureDriver::new(vec![el()]);
        assert_eq!(driver.probe(".submit-btn").await.unwrap(), 1);
        assert_eq!(driver.probe("#nope").await.unwrap(), 0);
    }
}
