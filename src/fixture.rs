//! Loads the DOM the CLI heals against: a JSON array of element descriptors from
//! disk, or a small built-in demo page when no fixture path is given.

use std::path::Path;

use anyhow::{Context, Result};
use selfheal_core::{ElementDescriptor, FixtureDriver};

pub fn load_fixture_driver(path: Option<&Path>) -> Result<FixtureDriver> {
    let elements = match path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("reading fixture file {}", path.display()))?;
            serde_json::from_str::<Vec<ElementDescriptor>>(&contents)
                .with_context(|| format!("parsing fixture file {}", path.display()))?
        }
        None => demo_elements(),
    };
    Ok(FixtureDriver::new(elements))
}

fn demo_elements() -> Vec<ElementDescriptor> {
    vec![
        ElementDescriptor {
            tag: "button".to_string(),
            classes: vec!["submit-btn".to_string()],
            test_id: Some("submit-btn-old".to_string()),
            text: Some("Submit".to_string()),
            visible: true,
            ..Default::default()
        },
        ElementDescriptor {
            tag: "input".to_string(),
            classes: vec!["email-field".to_string()],
            name: Some("email".to_string()),
            element_type: Some("email".to_string()),
            visible: true,
            ..Default::default()
        },
        ElementDescriptor {
            tag: "a".to_string(),
            classes: vec!["nav-link".to_string()],
            text: Some("Home".to_string()),
            visible: true,
            ..Default::default()
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_demo_elements_without_path() {
        let driver = load_fixture_driver(None).unwrap();
        assert_eq!(driver.elements().len(), 3);
    }

    #[test]
    fn loads_elements_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.json");
        std::fs::write(
            &path,
            r#"[{"tag":"button","classes":["ok"],"visible":true}]"#,
        )
        .unwrap();
        let driver = load_fixture_driver(Some(&path)).unwrap();
        assert_eq!(driver.elements().len(), 1);
    }
}
