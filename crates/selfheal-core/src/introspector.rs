//! DOM Introspector (spec §4.2) — the only component allowed to read the live DOM.
//!
//! Executes a single extraction per strategy invocation via `Driver::introspect`,
//! then applies the bounds every strategy relies on: element count cap, non-visible
//! and non-visual-tag exclusion, and text truncation. Strategies consume only this
//! module's output; none of them call `Driver::introspect` directly.

use serde_json::json;

use crate::driver::Driver;
use crate::errors::HealError;
use crate::types::ElementDescriptor;

/// Default cap on extracted elements (spec §4.2).
pub const DEFAULT_MAX_ELEMENTS: usize = 500;
/// Cap used specifically by the LLM strategy's context assembly (spec §4.6).
pub const LLM_MAX_ELEMENTS: usize = 50;

const DEFAULT_TEXT_TRUNCATION: usize = 200;
const LLM_TEXT_TRUNCATION: usize = 100;

const NON_VISUAL_TAGS: [&str; 4] = ["SCRIPT", "STYLE", "NOSCRIPT", "HEAD"];

/// Extract up to `max_elements` visible, visual `ElementDescriptor`s from the live
/// page, with text truncated to `text_truncation` characters.
pub async fn introspect_elements(
    driver: &dyn Driver,
    max_elements: usize,
    text_truncation: usize,
) -> Result<Vec<ElementDescriptor>, HealError> {
    let raw = driver
        .introspect("return document.querySelectorAll('*')", &json!({}))
        .await?;

    let mut elements: Vec<ElementDescriptor> = serde_json::from_value(raw)
        .map_err(|e| HealError::DriverError(format!("introspect payload malformed: {e}")))?;

    elements.retain(|el| {
        el.visible && !NON_VISUAL_TAGS.contains(&el.tag.to_uppercase().as_str())
    });

    for el in elements.iter_mut() {
        if let Some(text) = el.text.as_mut() {
            truncate_in_place(text, text_truncation);
        }
    }

    elements.truncate(max_elements);
    Ok(elements)
}

/// Convenience wrapper using the default (non-LLM) bounds.
pub async fn introspect_default(driver: &dyn Driver) -> Result<Vec<ElementDescriptor>, HealError> {
    introspect_elements(driver, DEFAULT_MAX_ELEMENTS, DEFAULT_TEXT_TRUNCATION).await
}

/// Convenience wrapper using the LLM strategy's tighter bounds.
pub async fn introspect_for_llm(driver: &dyn Driver) -> Result<Vec<ElementDescriptor>, HealError> {
    introspect_elements(driver, LLM_MAX_ELEMENTS, LLM_TEXT_TRUNCATION).await
}

fn truncate_in_place(s: &mut String, max_chars: usize) {
    if s.chars().count() > max_chars {
        *s = s.chars().take(max_chars).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::FixtureDriver;
    use crate::types::ElementDescriptor;

    fn visible_el(tag: &str, text: Option<&str>) -> ElementDescriptor {
        ElementDescriptor {
            tag: tag.to_string(),
            text: text.map(|t| t.to_string()),
            visible: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn excludes_non_visible_and_non_visual_tags() {
        let mut hidden = visible_el("div", None);
        hidden.visible = false;
        let script = visible_el("SCRIPT", None);
        let button = visible_el("button", Some("Submit"));

        let driver = FixtureDriver::new(vec![hidden, script, button.clone()]);
        let result = introspect_default(&driver).await.unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].tag, "button");
    }

    #[tokio::test]
    async fn truncates_text_to_bound() {
        let long_text = "a".repeat(300);
        let el = visible_el("div", Some(&long_text));
        let driver = FixtureDriver::new(vec![el]);

        let result = introspect_default(&driver).await.unwrap();
        assert_eq!(result[0].text.as_ref().unwrap().chars().count(), 200);

        let result = introspect_for_llm(&driver).await.unwrap();
        assert_eq!(result[0].text.as_ref().unwrap().chars().count(), 100);
    }

    #[tokio::test]
    async fn caps_element_count() {
        let elements: Vec<_> = (0..10).map(|_| visible_el("div", None)).collect();
        let driver = FixtureDriver::new(elements);
        let result = introspect_elements(&driver, 3, 200).await.unwrap();
        assert_eq!(result.len(), 3);
    }
}
