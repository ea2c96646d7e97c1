//! Error taxonomy for the healing engine (spec §7).
//!
//! Strategy-level errors never escape a `heal` call — the Healer recovers them
//! locally and folds them into a structured `HealingResult`. `HealError` exists so
//! that internal plumbing (strategies, the LLM client, the driver adapter) has a
//! single typed error to propagate before the Healer does that folding.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HealError {
    #[error("healing disabled")]
    Disabled,

    #[error("no strategies configured")]
    NoStrategies,

    #[error("strategy '{strategy}' found no signal: {reason}")]
    NoSignal { strategy: String, reason: String },

    #[error("strategy '{strategy}' produced no validated candidate")]
    NoCandidate { strategy: String },

    #[error("strategy '{strategy}' raised an exception: {reason}")]
    StrategyException { strategy: String, reason: String },

    #[error("llm backend unavailable: {0}")]
    LlmUnavailable(String),

    #[error("llm backend timed out")]
    LlmTimeout,

    #[error("llm response malformed: {0}")]
    LlmMalformed(String),

    #[error("driver error: {0}")]
    DriverError(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl HealError {
    pub fn no_signal(strategy: impl Into<String>, reason: impl Into<String>) -> Self {
        HealError::NoSignal {
            strategy: strategy.into(),
            reason: reason.into(),
        }
    }

    pub fn no_candidate(strategy: impl Into<String>) -> Self {
        HealError::NoCandidate {
            strategy: strategy.into(),
        }
    }

    pub fn strategy_exception(strategy: impl Into<String>, reason: impl Into<String>) -> Self {
        HealError::StrategyException {
            strategy: strategy.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error aborts dispatch of the current strategy only (`true`) or
    /// represents a hard stop (`false`) — every variant here is the former; a hard
    /// stop (e.g. `Disabled`) is handled by the Healer before any strategy runs.
    pub fn is_strategy_local(&self) -> bool {
        !matches!(self, HealError::Disabled | HealError::NoStrategies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_produce_expected_messages() {
        let err = HealError::no_signal("text-matching", "no literal text found");
        assert_eq!(
            err.to_string(),
            "strategy 'text-matching' found no signal: no literal text found"
        );
    }

    #[test]
    fn disabled_and_no_strategies_are_not_strategy_local() {
        assert!(!HealError::Disabled.is_strategy_local());
        assert!(!HealError::NoStrategies.is_strategy_local());
        assert!(HealError::LlmTimeout.is_strategy_local());
    }
}
