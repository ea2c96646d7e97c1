//! Healer (spec §4.1) — the strategy-dispatching orchestrator.
//!
//! Grounded on `crates/action-locator/src/healer.rs`'s `DefaultSelfHealer::heal`
//! (validate → generate → filter → sort → try-in-order loop) and
//! `crates/action-locator/src/resolver.rs`'s candidate-ranking helpers, adapted from
//! a typed-anchor, one-shot-heal model to spec's opaque-string, cache-and-flakiness
//! model. A single Healer instance serializes its own calls (spec §5): state is
//! guarded by `tokio::sync::Mutex`, not for contention but to give the struct a
//! `&self`-based async API while keeping interior state consistent.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::cache::{FlakinessTracker, HealingCache};
use crate::config::{HealerConfig, PartialHealerConfig};
use crate::driver::Driver;
use crate::llm_client::LlmBackend;
use crate::strategies::{CssHierarchyStrategy, LlmAnalysisStrategy, Strategy, TestIdStrategy, TextMatchingStrategy};
use crate::types::{FlakinessStat, HealOptions, HealingResult, StrategyTag};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthState,
    pub strategy_availability: HashMap<String, bool>,
    pub cache_size: usize,
    pub cache_hit_count: u64,
}

fn build_strategy_map(llm_backend: Arc<dyn LlmBackend>) -> HashMap<StrategyTag, Arc<dyn Strategy>> {
    let mut map: HashMap<StrategyTag, Arc<dyn Strategy>> = HashMap::new();
    map.insert(StrategyTag::TestIdRecovery, Arc::new(TestIdStrategy::new()));
    map.insert(StrategyTag::TextMatching, Arc::new(TextMatchingStrategy::new()));
    map.insert(StrategyTag::CssHierarchy, Arc::new(CssHierarchyStrategy::new()));
    map.insert(StrategyTag::LlmAnalysis, Arc::new(LlmAnalysisStrategy::new(llm_backend)));
    map
}

pub struct Healer {
    driver: Arc<dyn Driver>,
    llm_backend: Arc<dyn LlmBackend>,
    config: Mutex<HealerConfig>,
    strategy_map: Mutex<HashMap<StrategyTag, Arc<dyn Strategy>>>,
    cache: Mutex<HealingCache>,
    flakiness: Mutex<FlakinessTracker>,
}

impl Healer {
    pub fn new(driver: Arc<dyn Driver>, llm_backend: Arc<dyn LlmBackend>, config: HealerConfig) -> Self {
        let strategy_map = build_strategy_map(llm_backend.clone());
        Self {
            driver,
            llm_backend,
            config: Mutex::new(config),
            strategy_map: Mutex::new(strategy_map),
            cache: Mutex::new(HealingCache::new()),
            flakiness: Mutex::new(FlakinessTracker::new()),
        }
    }

    /// Primary entry point. See spec §4.1 for the full algorithm.
    ///
    /// Caveat (open question, preserved deliberately): when the original selector is
    /// already present but the caller expected it *not* to be, this still reports
    /// success with `metadata.noHealingNeeded = true` — the source signals success
    /// in this case, and that behavior is kept here rather than special-cased away.
    pub async fn heal(&self, broken_selector: &str, options: HealOptions) -> HealingResult {
        let config = self.config.lock().await.clone();

        if !config.enabled {
            return HealingResult::failure(broken_selector, "disabled");
        }

        if let Some(result) = self.try_cache_hit(broken_selector).await {
            return result;
        }

        let original_present = if broken_selector.trim().is_empty() {
            false
        } else {
            matches!(self.driver.probe(broken_selector).await, Ok(count) if count >= 1)
        };

        if original_present {
            self.flakiness.lock().await.record_success(broken_selector);
            return HealingResult::success(broken_selector, 1.0, None)
                .with_metadata_flag("noHealingNeeded", true);
        }

        if config.strategies.is_empty() {
            return HealingResult::failure(broken_selector, "no strategies configured");
        }

        let result = self.dispatch_strategies(broken_selector, &options, &config).await;

        let mut tracker = self.flakiness.lock().await;
        if result.success {
            tracker.record_success(&result.selector);
        } else {
            tracker.record_failure(broken_selector);
        }
        result
    }

    async fn try_cache_hit(&self, broken_selector: &str) -> Option<HealingResult> {
        let entry = {
            let cache = self.cache.lock().await;
            cache.get(broken_selector).cloned()
        }?;

        match self.driver.probe(&entry.healed_selector).await {
            Ok(count) if count >= 1 => {
                self.cache.lock().await.mark_used(broken_selector);
                self.flakiness.lock().await.record_success(&entry.healed_selector);
                Some(
                    HealingResult::success(entry.healed_selector.clone(), entry.confidence, Some(entry.strategy))
                        .with_metadata_flag("cached", true),
                )
            }
            _ => {
                self.cache.lock().await.evict(broken_selector);
                None
            }
        }
    }

    async fn dispatch_strategies(
        &self,
        broken_selector: &str,
        options: &HealOptions,
        config: &HealerConfig,
    ) -> HealingResult {
        let strategy_map = self.strategy_map.lock().await;
        let mut last_result: Option<HealingResult> = None;

        for attempt in 1..=config.max_attempts {
            for tag in &config.strategies {
                let Some(strategy) = strategy_map.get(tag) else {
                    continue;
                };

                match strategy.heal(self.driver.as_ref(), broken_selector, options).await {
                    Ok(result) if result.success => {
                        if config.cache_healing {
                            if let Some(strategy_tag) = result.strategy {
                                self.cache.lock().await.insert(
                                    broken_selector.to_string(),
                                    result.selector.clone(),
                                    result.confidence,
                                    strategy_tag,
                                );
                            }
                        }
                        return result;
                    }
                    Ok(result) => {
                        last_result = Some(result);
                    }
                    Err(e) => {
                        tracing::error!(strategy = %tag, error = %e, "strategy raised an exception");
                        last_result = Some(HealingResult::failure(broken_selector, e.to_string()));
                    }
                }
            }

            if attempt < config.max_attempts.saturating_sub(1) {
                sleep(Duration::from_millis(1000 * (attempt as u64 + 1))).await;
            }
        }

        last_result.unwrap_or_else(|| {
            HealingResult::failure(broken_selector, "no strategy produced a healed selector")
        })
    }

    pub async fn health_check(&self) -> HealthReport {
        let config = self.config.lock().await.clone();
        let mut availability = HashMap::new();

        for tag in &config.strategies {
            let available = if *tag == StrategyTag::LlmAnalysis {
                tokio::time::timeout(Duration::from_secs(5), self.llm_backend.is_available())
                    .await
                    .unwrap_or(false)
            } else {
                true
            };
            availability.insert(tag.as_str().to_string(), available);
        }

        let available_count = availability.values().filter(|v| **v).count();
        let status = if config.strategies.is_empty() || available_count == 0 {
            HealthState::Offline
        } else if available_count == availability.len() {
            HealthState::Healthy
        } else {
            HealthState::Degraded
        };

        let cache = self.cache.lock().await;
        HealthReport {
            status,
            strategy_availability: availability,
            cache_size: cache.len(),
            cache_hit_count: cache.hit_count(),
        }
    }

    pub async fn flakiness_stats(&self) -> Vec<FlakinessStat> {
        self.flakiness.lock().await.stats()
    }

    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
        self.flakiness.lock().await.clear();
    }

    /// Re-merge `partial` over the current config and re-instantiate all strategies
    /// (spec §3 lifecycle note).
    pub async fn update_config(&self, partial: PartialHealerConfig) {
        let mut config = self.config.lock().await;
        *config = config.merge(&partial);
        let mut strategy_map = self.strategy_map.lock().await;
        *strategy_map = build_strategy_map(self.llm_backend.clone());
    }

    pub async fn current_config(&self) -> HealerConfig {
        self.config.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::FixtureDriver;
    use crate::llm_client::OllamaClient;
    use crate::llm_client::OllamaConfig;
    use crate::types::ElementDescriptor;
    use async_trait::async_trait;
    use std::sync::Arc as StdArc;

    struct UnavailableLlm;

    #[async_trait]
    impl LlmBackend for UnavailableLlm {
        async fn is_available(&self) -> bool {
            false
        }
        async fn generate(&self, _prompt: &str) -> Result<String, crate::errors::HealError> {
            Err(crate::errors::HealError::LlmUnavailable("unavailable".into()))
        }
    }

    fn el_with_testid(id: &str) -> ElementDescriptor {
        ElementDescriptor {
            tag: "button".to_string(),
            test_id: Some(id.to_string()),
            visible: true,
            ..Default::default()
        }
    }

    fn healer_with(elements: Vec<ElementDescriptor>) -> Healer {
        let driver = StdArc::new(FixtureDriver::new(elements));
        let llm: StdArc<dyn LlmBackend> = StdArc::new(UnavailableLlm);
        Healer::new(driver, llm, HealerConfig::default())
    }

    #[tokio::test]
    async fn disabled_engine_returns_disabled_error() {
        let healer = healer_with(vec![]);
        healer
            .update_config(PartialHealerConfig {
                enabled: Some(false),
                ..Default::default()
            })
            .await;
        let result = healer.heal("#old", HealOptions::default()).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("disabled"));
    }

    #[tokio::test]
    async fn original_selector_present_needs_no_healing() {
        let healer = healer_with(vec![el_with_testid("x")]);
        let result = healer.heal("button", HealOptions::default()).await;
        assert!(result.success);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.metadata.unwrap()["noHealingNeeded"], true);
    }

    #[tokio::test]
    async fn no_strategies_configured_fails_with_reason() {
        let healer = healer_with(vec![]);
        healer
            .update_config(PartialHealerConfig {
                strategies: Some(vec![]),
                ..Default::default()
            })
            .await;
        let result = healer.heal("#old", HealOptions::default()).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("no strategies"));
    }

    // Deliberately mismatched (camelCase) so the original selector does not
    // resolve and the Healer must dispatch TestIdStrategy (normalized match).
    const BROKEN_SELECTOR: &str = r#"[data-testid="submitBtnOld"]"#;

    #[tokio::test]
    async fn heals_and_then_serves_from_cache() {
        let healer = healer_with(vec![el_with_testid("submit-btn-old")]);
        let first = healer.heal(BROKEN_SELECTOR, HealOptions::default()).await;
        assert!(first.success);
        assert!(first.metadata.is_none() || first.metadata.unwrap()["cached"] != true);

        let second = healer.heal(BROKEN_SELECTOR, HealOptions::default()).await;
        assert!(second.success);
        assert_eq!(second.selector, first.selector);
        assert_eq!(second.metadata.unwrap()["cached"], true);
    }

    #[tokio::test]
    async fn clear_cache_removes_cached_metadata_flag() {
        let healer = healer_with(vec![el_with_testid("submit-btn-old")]);
        healer.heal(BROKEN_SELECTOR, HealOptions::default()).await;
        healer.clear_cache().await;
        let result = healer.heal(BROKEN_SELECTOR, HealOptions::default()).await;
        assert!(result.metadata.is_none() || result.metadata.unwrap()["cached"] != true);
    }

    #[tokio::test]
    async fn max_attempts_one_iterates_strategies_exactly_once() {
        let healer = healer_with(vec![]);
        healer
            .update_config(PartialHealerConfig {
                max_attempts: Some(1),
                ..Default::default()
            })
            .await;
        let result = healer.heal("#nonexistent", HealOptions::default()).await;
        assert!(!result.success);
    }

    #[test]
    fn ollama_client_construction_is_exercised_for_default_healer() {
        // Sanity check that the default Ollama config used by the CLI wiring
        // passes its own allow-list check.
        assert!(OllamaClient::new(OllamaConfig::default()).is_ok());
    }
}
