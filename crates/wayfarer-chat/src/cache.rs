//! Freshness cache for provider results.
//!
//! Only successful results are stored. Each provider has its own time to
//! live; a stale entry is treated as absent and replaced on the next success.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use wayfarer_core::config::AggregatorConfig;
use wayfarer_core::types::{EventSummary, SearchSnippet, WeatherReport};

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    stored_at: Instant,
}

impl<T: Clone> CacheEntry<T> {
    fn fresh(&self, ttl: Duration) -> Option<T> {
        (self.stored_at.elapsed() < ttl).then(|| self.value.clone())
    }
}

/// Last good result per provider, keyed by normalized city.
#[derive(Debug)]
pub struct ProviderCache {
    weather: DashMap<String, CacheEntry<WeatherReport>>,
    events: DashMap<String, CacheEntry<Vec<EventSummary>>>,
    search: DashMap<(String, String), CacheEntry<Vec<SearchSnippet>>>,
    weather_ttl: Duration,
    events_ttl: Duration,
    search_ttl: Duration,
}

impl ProviderCache {
    pub fn new(weather_ttl: Duration, events_ttl: Duration, search_ttl: Duration) -> Self {
        Self {
            weather: DashMap::new(),
            events: DashMap::new(),
            search: DashMap::new(),
            weather_ttl,
            events_ttl,
            search_ttl,
        }
    }

    pub fn from_config(config: &AggregatorConfig) -> Self {
        Self::new(
            Duration::from_secs(config.weather_ttl_secs),
            Duration::from_secs(config.events_ttl_secs),
            Duration::from_secs(config.search_ttl_secs),
        )
    }

    pub fn weather(&self, city: &str) -> Option<WeatherReport> {
        self.weather
            .get(&normalize_city(city))
            .and_then(|e| e.fresh(self.weather_ttl))
    }

    pub fn put_weather(&self, city: &str, report: WeatherReport) {
        self.weather.insert(normalize_city(city), entry(report));
    }

    pub fn events(&self, city: &str) -> Option<Vec<EventSummary>> {
        self.events
            .get(&normalize_city(city))
            .and_then(|e| e.fresh(self.events_ttl))
    }

    pub fn put_events(&self, city: &str, events: Vec<EventSummary>) {
        self.events.insert(normalize_city(city), entry(events));
    }

    pub fn search(&self, city: &str, query: &str) -> Option<Vec<SearchSnippet>> {
        self.search
            .get(&search_key(city, query))
            .and_then(|e| e.fresh(self.search_ttl))
    }

    pub fn put_search(&self, city: &str, query: &str, results: Vec<SearchSnippet>) {
        self.search.insert(search_key(city, query), entry(results));
    }

    /// Drop entries older than their provider's time to live.
    ///
    /// Safe to run while turns insert; only entries actually removed are
    /// counted.
    pub fn purge_stale(&self) -> usize {
        purge(&self.weather, self.weather_ttl)
            + purge(&self.events, self.events_ttl)
            + purge(&self.search, self.search_ttl)
    }

    /// Number of stored entries across all providers, fresh or not.
    pub fn len(&self) -> usize {
        self.weather.len() + self.events.len() + self.search.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ProviderCache {
    fn default() -> Self {
        Self::from_config(&AggregatorConfig::default())
    }
}

fn entry<T>(value: T) -> CacheEntry<T> {
    CacheEntry {
        value,
        stored_at: Instant::now(),
    }
}

fn purge<K, T>(map: &DashMap<K, CacheEntry<T>>, ttl: Duration) -> usize
where
    K: Eq + std::hash::Hash,
{
    let mut removed = 0;
    map.retain(|_, e| {
        let keep = e.stored_at.elapsed() < ttl;
        if !keep {
            removed += 1;
        }
        keep
    });
    removed
}

fn search_key(city: &str, query: &str) -> (String, String) {
    (normalize_city(city), query.trim().to_lowercase())
}

/// Trim, collapse inner whitespace and lowercase.
pub fn normalize_city(city: &str) -> String {
    city.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
