//! Conversational core for Wayfarer.
//!
//! Provides session management, intent classification, concurrent data
//! aggregation and the dialogue orchestrator that turns each user message
//! into one travel-assistant reply.

pub mod aggregator;
pub mod cache;
pub mod classifier;
pub mod error;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use aggregator::DataAggregator;
pub use cache::ProviderCache;
pub use classifier::IntentClassifier;
pub use error::{ChatError, ProviderError};
pub use orchestrator::{DialogueOrchestrator, FALLBACK_REPLY, NEED_CITY_REPLY};
pub use prompt::{PromptBuilder, PromptContext};
pub use provider::{
    EventsProvider, Generator, ProviderSet, SearchProvider, UnavailableProvider, WeatherProvider,
};
pub use store::SessionStore;
pub use types::{Intent, ModeRequest, ProviderToggles, SessionSummary, TurnOptions, TurnOutcome};
