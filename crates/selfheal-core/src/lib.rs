//! Autonomous selector-healing engine core: strategies, cache, flakiness tracking,
//! and retry orchestration for browser end-to-end tests.

pub mod action;
pub mod cache;
pub mod config;
pub mod driver;
pub mod errors;
pub mod healer;
pub mod introspector;
pub mod llm_client;
pub mod retry;
pub mod similarity;
pub mod strategies;
pub mod types;

pub use action::ActionWrapper;
pub use config::{HealerConfig, PartialHealerConfig};
pub use driver::{Driver, FixtureDriver, InteractionAction, WaitState};
pub use errors::HealError;
pub use healer::{HealthReport, HealthState, Healer};
pub use llm_client::{LlmBackend, OllamaClient, OllamaConfig};
pub use retry::{ErrorClass, RetryHandler};
pub use types::{
    Candidate, CacheEntry, ElementDescriptor, FlakinessEntry, FlakinessStat, HealOptions,
    HealingResult, ParentDescriptor, Selector, StrategyTag,
};
