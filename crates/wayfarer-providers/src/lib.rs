//! HTTP clients for the external services behind Wayfarer.
//!
//! Each client implements one provider trait from `wayfarer-chat`.
//! [`build_providers`] wires them from configuration, substituting an
//! [`wayfarer_chat::UnavailableProvider`] for any service whose API key is missing.

pub mod gemini;
pub mod http;
pub mod openweather;
pub mod serpapi;
pub mod tavily;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use wayfarer_chat::ProviderSet;
use wayfarer_core::config::{AggregatorConfig, ProvidersConfig};
use wayfarer_core::error::{Result, WayfarerError};

pub use gemini::GeminiClient;
pub use openweather::OpenWeatherClient;
pub use serpapi::SerpApiEventsClient;
pub use tavily::TavilySearchClient;

/// Transport-level ceiling; the aggregator applies tighter per-call timeouts.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the provider set from configuration and environment keys.
pub fn build_providers(providers: &ProvidersConfig, aggregator: &AggregatorConfig) -> Result<ProviderSet> {
    let http = http::build_client(HTTP_TIMEOUT).map_err(WayfarerError::from)?;
    let mut set = ProviderSet::unavailable();

    match ProvidersConfig::key_from_env(&providers.openweather_key_env) {
        Some(key) => {
            set.weather = Arc::new(OpenWeatherClient::new(
                &providers.openweather_base_url,
                key,
                http.clone(),
            ))
        }
        None => missing_key("weather", &providers.openweather_key_env),
    }

    match ProvidersConfig::key_from_env(&providers.serpapi_key_env) {
        Some(key) => {
            set.events = Arc::new(SerpApiEventsClient::new(
                &providers.serpapi_base_url,
                key,
                aggregator.max_events,
                http.clone(),
            ))
        }
        None => missing_key("events", &providers.serpapi_key_env),
    }

    match ProvidersConfig::key_from_env(&providers.tavily_key_env) {
        Some(key) => {
            set.search = Arc::new(TavilySearchClient::new(
                &providers.tavily_base_url,
                key,
                aggregator.max_search_results,
                http.clone(),
            ))
        }
        None => missing_key("search", &providers.tavily_key_env),
    }

    match ProvidersConfig::key_from_env(&providers.gemini_key_env) {
        Some(key) => {
            set.generator = Arc::new(GeminiClient::new(
                &providers.gemini_base_url,
                key,
                &providers.gemini_model,
                providers.temperature,
                http,
            ))
        }
        None => missing_key("generation", &providers.gemini_key_env),
    }

    info!(model = %providers.gemini_model, "Providers initialized");
    Ok(set)
}

fn missing_key(provider: &str, env_var: &str) {
    warn!(provider, env_var, "API key not set; provider disabled");
}
