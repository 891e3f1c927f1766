//! Provider traits consumed by the dialogue engine.
//!
//! Weather, events, search and text generation are each a capability
//! behind a small async trait. Concrete HTTP clients live in
//! `wayfarer-providers`; tests plug in stubs.

use std::sync::Arc;

use async_trait::async_trait;

use wayfarer_core::types::{EventSummary, SearchSnippet, WeatherReport};

use crate::error::ProviderError;
use crate::prompt::PromptContext;

/// Current weather for a city.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current_weather(&self, city: &str) -> Result<WeatherReport, ProviderError>;
}

/// Upcoming local events for a city, in provider order.
#[async_trait]
pub trait EventsProvider: Send + Sync {
    async fn events(&self, city: &str) -> Result<Vec<EventSummary>, ProviderError>;
}

/// Open-web search.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchSnippet>, ProviderError>;
}

/// Language generation backend.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &PromptContext) -> Result<String, ProviderError>;
}

/// Stand-in for a provider whose credentials are missing.
///
/// Every call fails with [`ProviderError::NotConfigured`], which the
/// aggregator turns into a missing field like any other failure.
#[derive(Debug, Clone)]
pub struct UnavailableProvider {
    name: String,
}

impl UnavailableProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn error(&self) -> ProviderError {
        ProviderError::NotConfigured {
            provider: self.name.clone(),
        }
    }
}

#[async_trait]
impl WeatherProvider for UnavailableProvider {
    async fn current_weather(&self, _city: &str) -> Result<WeatherReport, ProviderError> {
        Err(self.error())
    }
}

#[async_trait]
impl EventsProvider for UnavailableProvider {
    async fn events(&self, _city: &str) -> Result<Vec<EventSummary>, ProviderError> {
        Err(self.error())
    }
}

#[async_trait]
impl SearchProvider for UnavailableProvider {
    async fn search(&self, _query: &str) -> Result<Vec<SearchSnippet>, ProviderError> {
        Err(self.error())
    }
}

#[async_trait]
impl Generator for UnavailableProvider {
    async fn generate(&self, _prompt: &PromptContext) -> Result<String, ProviderError> {
        Err(self.error())
    }
}

/// The four collaborators the orchestrator is wired with.
#[derive(Clone)]
pub struct ProviderSet {
    pub weather: Arc<dyn WeatherProvider>,
    pub events: Arc<dyn EventsProvider>,
    pub search: Arc<dyn SearchProvider>,
    pub generator: Arc<dyn Generator>,
}

impl ProviderSet {
    /// A set where every provider is unconfigured.
    pub fn unavailable() -> Self {
        Self {
            weather: Arc::new(UnavailableProvider::new("weather")),
            events: Arc::new(UnavailableProvider::new("events")),
            search: Arc::new(UnavailableProvider::new("search")),
            generator: Arc::new(UnavailableProvider::new("generation")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfarer_core::types::TravelMode;

    #[tokio::test]
    async fn test_unavailable_provider_reports_not_configured() {
        let set = ProviderSet::unavailable();

        let err = set.weather.current_weather("Paris").await.unwrap_err();
        assert_eq!(
            err,
            ProviderError::NotConfigured {
                provider: "weather".to_string()
            }
        );
        assert!(set.events.events("Paris").await.is_err());
        assert!(set.search.search("Paris travel").await.is_err());

        let prompt = PromptContext::bare("system", "hello", TravelMode::Unset);
        let err = set.generator.generate(&prompt).await.unwrap_err();
        assert_eq!(err.provider(), "generation");
    }
}
