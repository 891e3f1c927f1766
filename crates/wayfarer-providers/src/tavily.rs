//! Tavily web search client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use wayfarer_chat::{ProviderError, SearchProvider};
use wayfarer_core::types::SearchSnippet;

use crate::http::send_json;

const PROVIDER: &str = "search";

/// `POST {base}/search` with advanced depth and a synthesized answer.
pub struct TavilySearchClient {
    base_url: String,
    api_key: String,
    max_results: usize,
    http: Client,
}

impl TavilySearchClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        max_results: usize,
        http: Client,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            max_results,
            http,
        }
    }

    fn request_body<'a>(&'a self, query: &'a str) -> TavilyRequest<'a> {
        TavilyRequest {
            api_key: &self.api_key,
            query,
            max_results: self.max_results,
            search_depth: "advanced",
            include_answer: true,
            include_raw_content: false,
        }
    }
}

#[async_trait]
impl SearchProvider for TavilySearchClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchSnippet>, ProviderError> {
        debug!(query, "Running web search");
        let request = self
            .http
            .post(format!("{}/search", self.base_url))
            .json(&self.request_body(query));
        let response: TavilyResponse = send_json(PROVIDER, request).await?;
        Ok(parse_results(response))
    }
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'static str,
    include_answer: bool,
    include_raw_content: bool,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    answer: Option<String>,
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

fn parse_results(response: TavilyResponse) -> Vec<SearchSnippet> {
    let answer = response
        .answer
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .map(|answer| SearchSnippet {
            title: "Summary".to_string(),
            snippet: answer,
            url: String::new(),
        });

    answer
        .into_iter()
        .chain(
            response
                .results
                .into_iter()
                .filter(|r| !r.content.trim().is_empty())
                .map(|r| SearchSnippet {
                    title: r.title,
                    snippet: r.content.trim().to_string(),
                    url: r.url,
                }),
        )
        .collect()
}
