//! SerpAPI Google Events client.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use wayfarer_chat::{EventsProvider, ProviderError};
use wayfarer_core::types::EventSummary;

use crate::http::send_json;

const PROVIDER: &str = "events";

/// SerpAPI reports an empty result set as an error message.
const NO_RESULTS_MARKER: &str = "hasn't returned any results";

/// `GET {base}/search.json?engine=google_events`.
pub struct SerpApiEventsClient {
    base_url: String,
    api_key: String,
    max_events: usize,
    http: Client,
}

impl SerpApiEventsClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        max_events: usize,
        http: Client,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            max_events,
            http,
        }
    }
}

#[async_trait]
impl EventsProvider for SerpApiEventsClient {
    async fn events(&self, city: &str) -> Result<Vec<EventSummary>, ProviderError> {
        debug!(city, "Fetching local events");
        let query = format!("Events in {city}");
        let request = self
            .http
            .get(format!("{}/search.json", self.base_url))
            .query(&[
                ("engine", "google_events"),
                ("q", query.as_str()),
                ("api_key", self.api_key.as_str()),
            ]);
        let response: SerpResponse = send_json(PROVIDER, request).await?;
        parse_events(response, self.max_events)
    }
}

#[derive(Debug, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    events_results: Vec<SerpEvent>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SerpEvent {
    title: Option<String>,
    date: Option<SerpDate>,
    venue: Option<SerpVenue>,
    link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SerpDate {
    start_date: Option<String>,
    when: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SerpVenue {
    name: Option<String>,
}

fn parse_events(response: SerpResponse, max_events: usize) -> Result<Vec<EventSummary>, ProviderError> {
    if let Some(error) = response.error {
        if error.contains(NO_RESULTS_MARKER) {
            return Ok(Vec::new());
        }
        return Err(ProviderError::InvalidResponse {
            provider: PROVIDER.to_string(),
            message: error,
        });
    }

    Ok(response
        .events_results
        .into_iter()
        .take(max_events)
        .map(|event| {
            let date = event
                .date
                .and_then(|d| non_empty(d.when).or_else(|| non_empty(d.start_date)))
                .unwrap_or_default();
            EventSummary {
                name: non_empty(event.title).unwrap_or_else(|| "Event".to_string()),
                date,
                venue: event.venue.and_then(|v| non_empty(v.name)).unwrap_or_default(),
                link: non_empty(event.link),
            }
        })
        .collect())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value, max: usize) -> Result<Vec<EventSummary>, ProviderError> {
        parse_events(serde_json::from_value(value).unwrap(), max)
    }

    #[test]
    fn test_parse_events() {
        let events = parse(
            json!({
                "events_results": [
                    {
                        "title": "Jazz at the Lake",
                        "date": {"start_date": "Jun 14", "when": "Sat, Jun 14, 8 PM"},
                        "venue": {"name": "Lakeside Stage", "rating": 4.5},
                        "link": "https://example.com/jazz"
                    },
                    {
                        "title": "Night Market",
                        "date": {"start_date": "Jun 15"}
                    },
                    {"date": {"when": ""}}
                ]
            }),
            8,
        )
        .unwrap();

        assert_eq!(events.len(), 3);
        assert_eq!(events[0].date, "Sat, Jun 14, 8 PM");
        assert_eq!(events[0].venue, "Lakeside Stage");
        assert_eq!(events[0].link.as_deref(), Some("https://example.com/jazz"));
        assert_eq!(events[1].date, "Jun 15");
        assert_eq!(events[1].link, None);
        assert_eq!(events[2].name, "Event");
        assert_eq!(events[2].date, "");
    }

    #[test]
    fn test_parse_caps_event_count() {
        let results: Vec<_> = (0..12)
            .map(|i| json!({"title": format!("Event {i}")}))
            .collect();
        let events = parse(json!({ "events_results": results }), 8).unwrap();
        assert_eq!(events.len(), 8);
        assert_eq!(events[7].name, "Event 7");
    }

    #[test]
    fn test_no_results_is_empty() {
        let events = parse(
            json!({"error": "Google Events hasn't returned any results for this query."}),
            8,
        )
        .unwrap();
        assert!(events.is_empty());

        let events = parse(json!({"search_metadata": {}}), 8).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_api_error_is_invalid_response() {
        let err = parse(json!({"error": "Invalid API key."}), 8).unwrap_err();
        assert_eq!(
            err,
            ProviderError::InvalidResponse {
                provider: "events".to_string(),
                message: "Invalid API key.".to_string()
            }
        );
    }
}
