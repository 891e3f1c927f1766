//! Concurrent fan-out to the informational providers.
//!
//! Every required provider is polled concurrently inside the caller's task,
//! each under its own timeout. A failed or slow provider only leaves its
//! field empty; the others are unaffected.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use wayfarer_core::config::AggregatorConfig;
use wayfarer_core::types::{
    EventSummary, ExternalContext, ProviderKind, SearchSnippet, TravelMode, WeatherReport,
};

use crate::cache::ProviderCache;
use crate::classifier::same_city;
use crate::error::ProviderError;
use crate::provider::{EventsProvider, ProviderSet, SearchProvider, WeatherProvider};

/// Providers consulted for a given mode.
pub fn required_providers(mode: TravelMode) -> &'static [ProviderKind] {
    match mode {
        TravelMode::OneDay | TravelMode::MultiDay { .. } => &[
            ProviderKind::Weather,
            ProviderKind::Events,
            ProviderKind::Search,
        ],
        TravelMode::Chat | TravelMode::Unset => &[ProviderKind::Weather, ProviderKind::Search],
    }
}

/// Longest slice of the user's request carried into a search query.
const MAX_REQUEST_QUERY_CHARS: usize = 300;

/// Open-web queries for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQueries {
    /// Research on what the user actually asked.
    pub research: String,
    /// Short forecast and places to visit today; single-day plans only.
    pub forecast: Option<String>,
}

/// Build the search queries for a request about `city`.
///
/// An empty request, or one naming only the city, falls back to a generic
/// query for the mode.
pub fn search_queries(city: &str, mode: TravelMode, request: &str) -> SearchQueries {
    let mut request: String = request.trim().chars().take(MAX_REQUEST_QUERY_CHARS).collect();
    if same_city(request.trim_end_matches(['.', '!', '?']), city) {
        request.clear();
    }
    let research = match (mode, request.is_empty()) {
        (TravelMode::OneDay, true) => format!("Top things to do in {city} in one day"),
        (TravelMode::OneDay, false) => format!("One-day plan in {city}: {request}"),
        (TravelMode::MultiDay { days }, true) => {
            format!("{days}-day itinerary ideas for {city}: top sights, food and neighborhoods")
        }
        (TravelMode::MultiDay { days }, false) => {
            format!("{days}-day itinerary for {city}: {request}")
        }
        (TravelMode::Chat | TravelMode::Unset, true) => {
            format!("{city} travel guide: things to do, neighborhoods, local tips")
        }
        (TravelMode::Chat | TravelMode::Unset, false) => format!("{request} in {city}"),
    };
    let forecast = matches!(mode, TravelMode::OneDay).then(|| {
        format!(
            "Short weather forecast for today in {city} (°C) and 8-12 top places to visit today"
        )
    });
    SearchQueries { research, forecast }
}

/// Gathers weather, events and search results for one turn.
pub struct DataAggregator {
    weather: Arc<dyn WeatherProvider>,
    events: Arc<dyn EventsProvider>,
    search: Arc<dyn SearchProvider>,
    cache: ProviderCache,
    config: AggregatorConfig,
    fetches: AtomicU64,
}

impl DataAggregator {
    pub fn new(providers: &ProviderSet, config: &AggregatorConfig) -> Self {
        Self {
            weather: Arc::clone(&providers.weather),
            events: Arc::clone(&providers.events),
            search: Arc::clone(&providers.search),
            cache: ProviderCache::from_config(config),
            config: config.clone(),
            fetches: AtomicU64::new(0),
        }
    }

    /// Number of `fetch` calls made so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    pub fn cache(&self) -> &ProviderCache {
        &self.cache
    }

    /// Collect live data for `city` from every provider `mode` needs.
    ///
    /// Never fails; see [`ExternalContext::partial`].
    pub async fn fetch(&self, city: &str, mode: TravelMode, request: &str) -> ExternalContext {
        self.fetch_selected(city, mode, request, required_providers(mode))
            .await
    }

    /// Like [`fetch`](Self::fetch) but only consults `providers`.
    ///
    /// Providers left out are neither called nor reported missing.
    pub async fn fetch_selected(
        &self,
        city: &str,
        mode: TravelMode,
        request: &str,
        providers: &[ProviderKind],
    ) -> ExternalContext {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let wants = |kind| providers.contains(&kind);
        let queries = search_queries(city, mode, request);

        let (weather, events, search) = tokio::join!(
            self.fetch_weather(city, wants(ProviderKind::Weather)),
            self.fetch_events(city, wants(ProviderKind::Events)),
            self.fetch_search(city, &queries, wants(ProviderKind::Search)),
        );

        let mut context = ExternalContext::empty(city);
        let weather = settle(&mut context, ProviderKind::Weather, weather);
        let events = settle(&mut context, ProviderKind::Events, events);
        let search_results = settle(&mut context, ProviderKind::Search, search);
        context.weather = weather;
        context.events = events;
        context.search_results = search_results;

        debug!(
            city,
            %mode,
            partial = context.partial,
            missing = ?context.missing,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "External context gathered"
        );
        context
    }

    /// What the cache alone holds for this turn; nothing is fetched.
    ///
    /// Providers in `providers` without a fresh entry are reported missing.
    pub fn cached(
        &self,
        city: &str,
        mode: TravelMode,
        request: &str,
        providers: &[ProviderKind],
    ) -> ExternalContext {
        let queries = search_queries(city, mode, request);
        let mut context = ExternalContext::empty(city);
        for &kind in providers {
            match kind {
                ProviderKind::Weather => context.weather = self.cache.weather(city),
                ProviderKind::Events => context.events = self.cache.events(city),
                ProviderKind::Search => {
                    let research = self.cache.search(city, &queries.research);
                    let forecast = queries
                        .forecast
                        .as_deref()
                        .and_then(|q| self.cache.search(city, q));
                    context.search_results = match (research, forecast) {
                        (Some(mut r), Some(f)) => {
                            r.extend(f);
                            Some(r)
                        }
                        (r, f) => r.or(f),
                    };
                }
            }
        }
        let absent: Vec<ProviderKind> = providers
            .iter()
            .copied()
            .filter(|kind| match kind {
                ProviderKind::Weather => context.weather.is_none(),
                ProviderKind::Events => context.events.is_none(),
                ProviderKind::Search => context.search_results.is_none(),
            })
            .collect();
        for kind in absent {
            context.mark_missing(kind);
        }
        context
    }

    async fn fetch_weather(
        &self,
        city: &str,
        required: bool,
    ) -> Option<Result<WeatherReport, ProviderError>> {
        if !required {
            return None;
        }
        if let Some(hit) = self.cache.weather(city) {
            debug!(city, provider = "weather", "Cache hit");
            return Some(Ok(hit));
        }
        let result = call_provider(
            ProviderKind::Weather,
            self.config.weather_timeout_ms,
            self.weather.current_weather(city),
        )
        .await;
        if let Ok(report) = &result {
            self.cache.put_weather(city, report.clone());
        }
        Some(result)
    }

    async fn fetch_events(
        &self,
        city: &str,
        required: bool,
    ) -> Option<Result<Vec<EventSummary>, ProviderError>> {
        if !required {
            return None;
        }
        if let Some(hit) = self.cache.events(city) {
            debug!(city, provider = "events", "Cache hit");
            return Some(Ok(hit));
        }
        let result = call_provider(
            ProviderKind::Events,
            self.config.events_timeout_ms,
            self.events.events(city),
        )
        .await
        .map(|mut events| {
            events.truncate(self.config.max_events);
            events
        });
        if let Ok(events) = &result {
            self.cache.put_events(city, events.clone());
        }
        Some(result)
    }

    /// Research and forecast queries run concurrently; either one
    /// succeeding is enough.
    async fn fetch_search(
        &self,
        city: &str,
        queries: &SearchQueries,
        required: bool,
    ) -> Option<Result<Vec<SearchSnippet>, ProviderError>> {
        if !required {
            return None;
        }
        let forecast = async {
            match queries.forecast.as_deref() {
                Some(query) => Some(self.search_one(city, query).await),
                None => None,
            }
        };
        let (research, forecast) = tokio::join!(self.search_one(city, &queries.research), forecast);

        let merged = match (research, forecast) {
            (Ok(mut research), Some(Ok(forecast))) => {
                research.extend(forecast);
                Ok(research)
            }
            (Ok(research), Some(Err(e))) => {
                warn!(city, provider = "search", error = %e, "Forecast query failed");
                Ok(research)
            }
            (Ok(research), None) => Ok(research),
            (Err(e), Some(Ok(forecast))) => {
                warn!(city, provider = "search", error = %e, "Research query failed");
                Ok(forecast)
            }
            (Err(e), _) => Err(e),
        };
        Some(merged)
    }

    async fn search_one(&self, city: &str, query: &str) -> Result<Vec<SearchSnippet>, ProviderError> {
        if let Some(hit) = self.cache.search(city, query) {
            debug!(city, provider = "search", "Cache hit");
            return Ok(hit);
        }
        let result = call_provider(
            ProviderKind::Search,
            self.config.search_timeout_ms,
            self.search.search(query),
        )
        .await
        .map(|mut results| {
            results.truncate(self.config.max_search_results);
            results
        });
        if let Ok(results) = &result {
            self.cache.put_search(city, query, results.clone());
        }
        result
    }
}

/// Run one provider call under its own timeout.
async fn call_provider<T, F>(kind: ProviderKind, timeout_ms: u64, call: F) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    let started = Instant::now();
    let outcome = tokio::time::timeout(Duration::from_millis(timeout_ms), call).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match outcome {
        Ok(Ok(value)) => {
            debug!(provider = %kind, elapsed_ms, "Provider call succeeded");
            Ok(value)
        }
        Ok(Err(e)) => Err(e),
        Err(_) => Err(ProviderError::Timeout {
            provider: kind.as_str().to_string(),
            after_ms: timeout_ms,
        }),
    }
}

/// Fold one provider result into the context, recording failures.
fn settle<T>(
    context: &mut ExternalContext,
    kind: ProviderKind,
    result: Option<Result<T, ProviderError>>,
) -> Option<T> {
    match result? {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(city = %context.city, provider = %kind, error = %e, "Provider unavailable");
            context.mark_missing(kind);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Behavior, StubProvider, Stubs};

    fn make_aggregator(stubs: &Stubs) -> DataAggregator {
        let config = AggregatorConfig {
            weather_timeout_ms: 50,
            events_timeout_ms: 50,
            search_timeout_ms: 50,
            ..AggregatorConfig::default()
        };
        DataAggregator::new(&stubs.provider_set(), &config)
    }

    // ---- Mode requirements ----

    #[test]
    fn test_required_providers_per_mode() {
        assert_eq!(
            required_providers(TravelMode::Chat),
            &[ProviderKind::Weather, ProviderKind::Search]
        );
        assert_eq!(required_providers(TravelMode::OneDay).len(), 3);
        assert_eq!(
            required_providers(TravelMode::MultiDay { days: 3 }).len(),
            3
        );
    }

    #[test]
    fn test_search_queries_carry_the_request() {
        let q = search_queries("Paris", TravelMode::Chat, "is the Louvre open Monday?");
        assert_eq!(q.research, "is the Louvre open Monday? in Paris");
        assert_eq!(q.forecast, None);

        let q = search_queries("Rome", TravelMode::MultiDay { days: 4 }, "food and art");
        assert_eq!(q.research, "4-day itinerary for Rome: food and art");
    }

    #[test]
    fn test_one_day_adds_forecast_query() {
        let q = search_queries("Jaipur", TravelMode::OneDay, "forts and markets");
        assert!(q.research.contains("forts and markets"));
        let forecast = q.forecast.unwrap();
        assert!(forecast.starts_with("Short weather forecast for today in Jaipur"));
    }

    #[test]
    fn test_empty_request_uses_generic_query() {
        for mode in [
            TravelMode::Chat,
            TravelMode::OneDay,
            TravelMode::MultiDay { days: 4 },
        ] {
            let q = search_queries("Lisbon", mode, "   ");
            assert!(q.research.contains("Lisbon"));
            assert!(!q.research.starts_with(' '));
        }
    }

    #[test]
    fn test_city_only_request_uses_generic_query() {
        let generic = search_queries("Lisbon", TravelMode::Chat, "");
        assert_eq!(search_queries("Lisbon", TravelMode::Chat, "lisbon!"), generic);
    }

    #[test]
    fn test_long_request_is_clipped_in_query() {
        let request = "museums ".repeat(100);
        let q = search_queries("Oslo", TravelMode::Chat, &request);
        assert!(q.research.chars().count() <= MAX_REQUEST_QUERY_CHARS + " in Oslo".len());
    }

    // ---- Fetch ----

    #[tokio::test]
    async fn test_fetch_all_succeed() {
        let stubs = Stubs::all(Behavior::Succeed);
        let aggregator = make_aggregator(&stubs);

        let ctx = aggregator.fetch("Paris", TravelMode::OneDay, "").await;

        assert!(!ctx.partial);
        assert!(ctx.missing.is_empty());
        assert!(ctx.weather.is_some());
        assert_eq!(ctx.events.as_ref().map(Vec::len), Some(8));
        // Research and forecast, five each
        assert_eq!(ctx.search_results.as_ref().map(Vec::len), Some(10));
        assert_eq!(stubs.search.calls(), 2);
        assert_eq!(stubs.weather.inputs(), vec!["Paris"]);
    }

    #[tokio::test]
    async fn test_user_request_reaches_search() {
        let stubs = Stubs::all(Behavior::Succeed);
        let aggregator = make_aggregator(&stubs);

        aggregator
            .fetch("Paris", TravelMode::Chat, "is the Louvre open Monday?")
            .await;

        assert_eq!(
            stubs.search.inputs(),
            vec!["is the Louvre open Monday? in Paris"]
        );
    }

    #[tokio::test]
    async fn test_chat_mode_skips_events() {
        let stubs = Stubs::all(Behavior::Succeed);
        let aggregator = make_aggregator(&stubs);

        let ctx = aggregator.fetch("Paris", TravelMode::Chat, "").await;

        assert_eq!(stubs.events.calls(), 0);
        assert_eq!(stubs.search.calls(), 1);
        assert!(ctx.events.is_none());
        assert!(!ctx.partial);
    }

    #[tokio::test]
    async fn test_fetch_selected_skips_disabled_providers() {
        let stubs = Stubs::all(Behavior::Succeed);
        let aggregator = make_aggregator(&stubs);

        let ctx = aggregator
            .fetch_selected("Paris", TravelMode::OneDay, "", &[ProviderKind::Weather])
            .await;

        assert_eq!(stubs.weather.calls(), 1);
        assert_eq!(stubs.events.calls(), 0);
        assert_eq!(stubs.search.calls(), 0);
        assert!(!ctx.partial);
        assert!(ctx.missing.is_empty());
    }

    #[tokio::test]
    async fn test_one_failure_is_partial() {
        let stubs = Stubs::with(
            Behavior::Succeed,
            Behavior::Fail,
            Behavior::Succeed,
            StubProvider::new("generation", Behavior::Succeed),
        );
        let aggregator = make_aggregator(&stubs);

        let ctx = aggregator.fetch("Rome", TravelMode::OneDay, "").await;

        assert!(ctx.partial);
        assert_eq!(ctx.missing, vec![ProviderKind::Events]);
        assert!(ctx.weather.is_some());
        assert!(ctx.search_results.is_some());
    }

    #[tokio::test]
    async fn test_all_failures_is_fully_partial() {
        let stubs = Stubs::all(Behavior::Fail);
        let aggregator = make_aggregator(&stubs);

        let ctx = aggregator
            .fetch("Rome", TravelMode::MultiDay { days: 3 }, "")
            .await;

        assert!(ctx.partial);
        assert!(ctx.is_empty());
        assert_eq!(ctx.missing.len(), 3);
    }

    #[tokio::test]
    async fn test_hung_providers_time_out() {
        let stubs = Stubs::with(
            Behavior::Hang,
            Behavior::Hang,
            Behavior::Succeed,
            StubProvider::new("generation", Behavior::Succeed),
        );
        let aggregator = make_aggregator(&stubs);

        let started = Instant::now();
        let ctx = tokio::time::timeout(
            Duration::from_secs(2),
            aggregator.fetch("Oslo", TravelMode::OneDay, ""),
        )
        .await
        .expect("fetch must finish within its timeouts");

        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(ctx.partial);
        assert!(ctx.missing.contains(&ProviderKind::Weather));
        assert!(ctx.missing.contains(&ProviderKind::Events));
        assert!(ctx.search_results.is_some());
    }

    // ---- Cache ----

    #[tokio::test]
    async fn test_second_fetch_served_from_cache() {
        let stubs = Stubs::all(Behavior::Succeed);
        let aggregator = make_aggregator(&stubs);

        aggregator.fetch("Paris", TravelMode::OneDay, "").await;
        let ctx = aggregator.fetch("paris", TravelMode::OneDay, "").await;

        assert_eq!(stubs.weather.calls(), 1);
        assert_eq!(stubs.events.calls(), 1);
        assert_eq!(stubs.search.calls(), 2);
        assert!(ctx.weather.is_some());
        assert_eq!(aggregator.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_different_request_issues_new_search() {
        let stubs = Stubs::all(Behavior::Succeed);
        let aggregator = make_aggregator(&stubs);

        aggregator.fetch("Paris", TravelMode::Chat, "museums").await;
        aggregator.fetch("Paris", TravelMode::Chat, "museums").await;
        aggregator.fetch("Paris", TravelMode::Chat, "night markets").await;

        assert_eq!(stubs.weather.calls(), 1);
        assert_eq!(stubs.search.calls(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let stubs = Stubs::all(Behavior::Fail);
        let aggregator = make_aggregator(&stubs);

        aggregator.fetch("Paris", TravelMode::Chat, "").await;
        aggregator.fetch("Paris", TravelMode::Chat, "").await;

        assert_eq!(stubs.weather.calls(), 2);
        assert!(aggregator.cache().is_empty());
    }

    #[tokio::test]
    async fn test_cached_snapshot_reports_only_absent_providers() {
        let stubs = Stubs::all(Behavior::Succeed);
        let aggregator = make_aggregator(&stubs);
        let all = required_providers(TravelMode::OneDay);

        let cold = aggregator.cached("Paris", TravelMode::OneDay, "", all);
        assert_eq!(cold.missing.len(), 3);

        aggregator
            .fetch_selected("Paris", TravelMode::OneDay, "", &[ProviderKind::Weather])
            .await;
        let warm = aggregator.cached("Paris", TravelMode::OneDay, "", all);
        assert!(warm.weather.is_some());
        assert_eq!(warm.missing, vec![ProviderKind::Events, ProviderKind::Search]);
        assert_eq!(stubs.weather.calls(), 1);
    }
}
