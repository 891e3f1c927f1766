//! Stub providers shared by the unit tests of this crate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use wayfarer_core::types::{EventSummary, SearchSnippet, WeatherReport};

use crate::error::ProviderError;
use crate::prompt::PromptContext;
use crate::provider::{EventsProvider, Generator, ProviderSet, SearchProvider, WeatherProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    Fail,
    /// Never completes.
    Hang,
    /// Succeeds after the given number of milliseconds.
    Slow(u64),
}

/// Counting stub that implements every provider trait.
pub struct StubProvider {
    name: &'static str,
    behavior: Behavior,
    calls: AtomicUsize,
    inputs: Mutex<Vec<String>>,
    prompts: Mutex<Vec<PromptContext>>,
    reply: Option<String>,
}

impl StubProvider {
    pub fn new(name: &'static str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            name,
            behavior,
            calls: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
            reply: None,
        })
    }

    /// Generator stub returning a fixed reply.
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            name: "generation",
            behavior: Behavior::Succeed,
            calls: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
            reply: Some(reply.to_string()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Cities or queries seen, in call order.
    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }

    pub fn last_prompt(&self) -> Option<PromptContext> {
        self.prompts.lock().unwrap().last().cloned()
    }

    async fn enter(&self, input: &str) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().unwrap().push(input.to_string());
        match self.behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Fail => Err(ProviderError::Http {
                provider: self.name.to_string(),
                status: 503,
                message: "stub failure".to_string(),
            }),
            Behavior::Hang => std::future::pending().await,
            Behavior::Slow(ms) => {
                tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl WeatherProvider for StubProvider {
    async fn current_weather(&self, city: &str) -> Result<WeatherReport, ProviderError> {
        self.enter(city).await?;
        Ok(WeatherReport {
            summary: format!("Current temperature in {city}: 22.0°C. Conditions: clear sky."),
            temperature_c: 22.0,
            feels_like_c: Some(21.5),
            conditions: "clear sky".to_string(),
            humidity: Some(50),
            wind_mps: Some(3.0),
        })
    }
}

#[async_trait]
impl EventsProvider for StubProvider {
    async fn events(&self, city: &str) -> Result<Vec<EventSummary>, ProviderError> {
        self.enter(city).await?;
        Ok((1..=10)
            .map(|i| EventSummary {
                name: format!("{city} festival {i}"),
                date: format!("Sat, Jun {i}"),
                venue: "Old Town".to_string(),
                link: None,
            })
            .collect())
    }
}

#[async_trait]
impl SearchProvider for StubProvider {
    async fn search(&self, query: &str) -> Result<Vec<SearchSnippet>, ProviderError> {
        self.enter(query).await?;
        Ok((1..=7)
            .map(|i| SearchSnippet {
                title: format!("Result {i}"),
                snippet: format!("Snippet {i} for {query}"),
                url: format!("https://example.com/{i}"),
            })
            .collect())
    }
}

#[async_trait]
impl Generator for StubProvider {
    async fn generate(&self, prompt: &PromptContext) -> Result<String, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.clone());
        self.enter(&prompt.instruction).await?;
        Ok(self.reply.clone().unwrap_or_else(|| {
            format!(
                "Plan for {} ({})",
                prompt.city.as_deref().unwrap_or("?"),
                prompt.mode
            )
        }))
    }
}

/// Handles to every stub in a provider set.
pub struct Stubs {
    pub weather: Arc<StubProvider>,
    pub events: Arc<StubProvider>,
    pub search: Arc<StubProvider>,
    pub generator: Arc<StubProvider>,
}

impl Stubs {
    pub fn all(behavior: Behavior) -> Self {
        Self::with(behavior, behavior, behavior, StubProvider::new("generation", Behavior::Succeed))
    }

    pub fn with(
        weather: Behavior,
        events: Behavior,
        search: Behavior,
        generator: Arc<StubProvider>,
    ) -> Self {
        Self {
            weather: StubProvider::new("weather", weather),
            events: StubProvider::new("events", events),
            search: StubProvider::new("search", search),
            generator,
        }
    }

    pub fn provider_set(&self) -> ProviderSet {
        ProviderSet {
            weather: self.weather.clone(),
            events: self.events.clone(),
            search: self.search.clone(),
            generator: self.generator.clone(),
        }
    }

    /// Calls across the three informational providers.
    pub fn data_calls(&self) -> usize {
        self.weather.calls() + self.events.calls() + self.search.calls()
    }
}
