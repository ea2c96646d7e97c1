//! Healing Strategies (spec §4.3–§4.6): pluggable candidate-generation procedures
//! dispatched by the Healer in configured order.

pub mod css;
pub mod llm;
pub mod testid;
pub mod text;

use async_trait::async_trait;

use crate::driver::Driver;
use crate::errors::HealError;
use crate::types::{HealOptions, HealingResult, StrategyTag};

/// A named candidate-generation procedure. Implementations must never panic or
/// propagate driver errors as anything but a well-formed failure `HealingResult` —
/// an `Err` here signals a genuine exception (spec's `StrategyException`), which the
/// Healer logs and treats as a failure, continuing dispatch.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn tag(&self) -> StrategyTag;

    async fn heal(
        &self,
        driver: &dyn Driver,
        broken_selector: &str,
        options: &HealOptions,
    ) -> Result<HealingResult, HealError>;
}

pub use css::CssHierarchyStrategy;
pub use llm::LlmAnalysisStrategy;
pub use testid::TestIdStrategy;
pub use text::TextMatchingStrategy;
