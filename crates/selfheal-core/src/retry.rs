//! Retry Handler (spec §4.7) — error classification, exponential backoff, and
//! healing escalation on locator-class failures.
//!
//! Backoff formula grounded directly on
//! `crates/action-flow/src/strategies.rs::DefaultFailureHandler::calculate_backoff`
//! (doubling each retry, capped). Classification follows the substring-hint-array
//! pattern in `src/watchdogs.rs` (`PERMISSION_HINTS`-style const arrays plus
//! `.contains(hint)` checks).

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::config::RetrySettings;
use crate::errors::HealError;
use crate::healer::Healer;
use crate::types::HealOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Timeout,
    Network,
    Flakiness,
    Locator,
    Other,
}

const TIMEOUT_HINTS: [&str; 5] = [
    "timeout",
    "timed out",
    "waiting for selector",
    "waiting for element",
    "exceeded timeout",
];
const NETWORK_HINTS: [&str; 5] = [
    "net::err",
    "network error",
    "connection refused",
    "econnrefused",
    "socket hang up",
];
const FLAKINESS_HINTS: [&str; 5] = [
    "not visible",
    "not attached",
    "not stable",
    "intercepts pointer events",
    "not actionable",
];
const LOCATOR_HINTS: [&str; 5] = [
    "locator",
    "selector",
    "element not found",
    "no element matches",
    "could not find",
];

fn any_hint_matches(message_lower: &str, hints: &[&str]) -> bool {
    hints.iter().any(|hint| message_lower.contains(hint))
}

/// Classify an error message by case-insensitive substring match (spec §4.7 table).
pub fn classify_error(message: &str) -> ErrorClass {
    let lower = message.to_lowercase();
    if any_hint_matches(&lower, &TIMEOUT_HINTS) {
        ErrorClass::Timeout
    } else if any_hint_matches(&lower, &NETWORK_HINTS) {
        ErrorClass::Network
    } else if any_hint_matches(&lower, &FLAKINESS_HINTS) {
        ErrorClass::Flakiness
    } else if any_hint_matches(&lower, &LOCATOR_HINTS) {
        ErrorClass::Locator
    } else {
        ErrorClass::Other
    }
}

fn is_retryable(class: ErrorClass, settings: &RetrySettings) -> bool {
    match class {
        ErrorClass::Timeout => settings.on_timeout,
        ErrorClass::Network => true,
        ErrorClass::Flakiness => settings.on_flakiness,
        ErrorClass::Locator => false,
        ErrorClass::Other => false,
    }
}

/// Exponential backoff starting at `initial_backoff_ms`, doubling each retry,
/// capped at `max_backoff_ms`.
pub fn calculate_backoff(attempt: u32, settings: &RetrySettings) -> Duration {
    let multiplier = 2u64.pow(attempt.saturating_sub(1));
    let total_ms = settings.initial_backoff_ms.saturating_mul(multiplier);
    let capped_ms = total_ms.min(settings.max_backoff_ms);
    Duration::from_millis(capped_ms)
}

pub struct RetryHandler;

impl RetryHandler {
    /// Run `action`; on failure, classify the error and retry with exponential
    /// backoff while attempts remain and the class is retryable.
    pub async fn with_retry<F, Fut, T>(action: F, settings: &RetrySettings) -> Result<T, HealError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, HealError>>,
    {
        let mut attempt = 1u32;
        loop {
            match action().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let class = classify_error(&err.to_string());
                    if is_retryable(class, settings) && attempt <= settings.max_retries {
                        tracing::warn!(attempt, ?class, "retrying after classified error");
                        sleep(calculate_backoff(attempt, settings)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }

    /// Like `with_retry`, but on locator-class errors first invokes the Healer and,
    /// if healing succeeds, replays `action` with the healed selector before
    /// consuming a retry attempt.
    pub async fn execute_with_healing<F, Fut, T>(
        healer: &Healer,
        selector: &str,
        action: F,
        settings: &RetrySettings,
    ) -> Result<T, HealError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, HealError>>,
    {
        let mut current = selector.to_string();
        let mut attempt = 1u32;

        loop {
            match action(current.clone()).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let class = classify_error(&err.to_string());

                    if class == ErrorClass::Locator {
                        let heal_result = healer.heal(&current, HealOptions::default()).await;
                        if heal_result.success {
                            current = heal_result.selector.clone();
                            match action(current.clone()).await {
                                Ok(value) => return Ok(value),
                                Err(replay_err) => {
                                    let replay_class = classify_error(&replay_err.to_string());
                                    if is_retryable(replay_class, settings) && attempt <= settings.max_retries {
                                        sleep(calculate_backoff(attempt, settings)).await;
                                        attempt += 1;
                                        continue;
                                    }
                                    return Err(replay_err);
                                }
                            }
                        } else {
                            return Err(err);
                        }
                    }

                    if is_retryable(class, settings) && attempt <= settings.max_retries {
                        sleep(calculate_backoff(attempt, settings)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn classifies_each_table_row() {
        assert_eq!(classify_error("Timeout waiting for selector"), ErrorClass::Timeout);
        assert_eq!(classify_error("connection refused"), ErrorClass::Network);
        assert_eq!(classify_error("element is not visible"), ErrorClass::Flakiness);
        assert_eq!(classify_error("element not found"), ErrorClass::Locator);
        assert_eq!(classify_error("something else entirely"), ErrorClass::Other);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let settings = RetrySettings::default();
        assert_eq!(calculate_backoff(1, &settings).as_millis(), 1000);
        assert_eq!(calculate_backoff(2, &settings).as_millis(), 2000);
        assert_eq!(calculate_backoff(3, &settings).as_millis(), 4000);
        assert_eq!(calculate_backoff(4, &settings).as_millis(), 8000);

        let mut tight = settings.clone();
        tight.max_backoff_ms = 3000;
        assert_eq!(calculate_backoff(3, &tight).as_millis(), 3000);
    }

    #[tokio::test]
    async fn with_retry_retries_retryable_errors_then_succeeds() {
        let settings = RetrySettings {
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            ..RetrySettings::default()
        };
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result: Result<u32, HealError> = RetryHandler::with_retry(
            || {
                let attempts = attempts_clone.clone();
                async move {
                    let n = attempts.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(HealError::DriverError("timed out waiting for selector".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            },
            &settings,
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn with_retry_does_not_retry_other_class() {
        let settings = RetrySettings::default();
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result: Result<u32, HealError> = RetryHandler::with_retry(
            || {
                let attempts = attempts_clone.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(HealError::DriverError("totally unclassifiable failure".to_string()))
                }
            },
            &settings,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
