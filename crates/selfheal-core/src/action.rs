//! Action Wrapper (spec §2, §4.7) — routes a user interaction through the Retry
//! Handler (and, transitively, the Healer) with a uniform contract.
//!
//! Grounded on `crates/action-locator/src/bridge.rs`'s `LocatorBackedResolver`,
//! which bridges a resolver/healer pair to a single uniform call shape. Intentionally
//! thin: the test-runner integration that would call this wrapper is out of scope
//! (spec §1).

use std::sync::Arc;

use serde_json::Value;

use crate::config::RetrySettings;
use crate::driver::{Driver, InteractionAction};
use crate::errors::HealError;
use crate::healer::Healer;
use crate::retry::RetryHandler;

pub struct ActionWrapper {
    healer: Arc<Healer>,
    driver: Arc<dyn Driver>,
}

impl ActionWrapper {
    pub fn new(healer: Arc<Healer>, driver: Arc<dyn Driver>) -> Self {
        Self { healer, driver }
    }

    /// Perform `action` against `selector`, healing and retrying transient failures
    /// per the configured retry policy.
    pub async fn interact(
        &self,
        selector: &str,
        action: InteractionAction,
        options: Value,
        retry_settings: &RetrySettings,
    ) -> Result<(), HealError> {
        let driver = self.driver.clone();
        RetryHandler::execute_with_healing(
            &self.healer,
            selector,
            move |resolved_selector| {
                let driver = driver.clone();
                let options = options.clone();
                async move { driver.interact(&resolved_selector, action, &options).await }
            },
            retry_settings,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HealerConfig;
    use crate::driver::FixtureDriver;
    use crate::llm_client::LlmBackend;
    use crate::types::ElementDescriptor;
    use async_trait::async_trait;
    use serde_json::json;

    struct UnavailableLlm;

    #[async_trait]
    impl LlmBackend for UnavailableLlm {
        async fn is_available(&self) -> bool {
            false
        }
        async fn generate(&self, _prompt: &str) -> Result<String, HealError> {
            Err(HealError::LlmUnavailable("unavailable".into()))
        }
    }

    #[tokio::test]
    async fn heals_and_replays_on_locator_failure() {
        let el = ElementDescriptor {
            tag: "button".to_string(),
            test_id: Some("submit-btn-old".to_string()),
            visible: true,
            ..Default::default()
        };
        let driver: Arc<dyn Driver> = Arc::new(FixtureDriver::new(vec![el]));
        let llm: Arc<dyn LlmBackend> = Arc::new(UnavailableLlm);
        let healer = Arc::new(Healer::new(driver.clone(), llm, HealerConfig::default()));
        let wrapper = ActionWrapper::new(healer, driver);

        let result = wrapper
            .interact(
                r#"[data-testid="submitBtnOld"]"#,
                InteractionAction::Click,
                json!({}),
                &RetrySettings::default(),
            )
            .await;

        assert!(result.is_ok());
    }
}
