//! Shared HTTP plumbing for the provider clients.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use wayfarer_chat::ProviderError;

/// Longest error body kept in an [`ProviderError::Http`] message.
const MAX_ERROR_BODY: usize = 300;

/// Build the client shared by all providers.
pub fn build_client(timeout: Duration) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("wayfarer/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ProviderError::Network {
            provider: "http".to_string(),
            message: e.to_string(),
        })
}

/// Send a request and decode a successful JSON body.
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: &str,
    request: RequestBuilder,
) -> Result<T, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|e| request_error(provider, e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        debug!(provider, status = status.as_u16(), "Provider returned an error status");
        return Err(ProviderError::Http {
            provider: provider.to_string(),
            status: status.as_u16(),
            message: clip(&body),
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| ProviderError::InvalidResponse {
            provider: provider.to_string(),
            message: e.to_string(),
        })
}

fn request_error(provider: &str, err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout {
            provider: provider.to_string(),
            after_ms: 0,
        }
    } else {
        ProviderError::Network {
            provider: provider.to_string(),
            message: err.without_url().to_string(),
        }
    }
}

fn clip(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((end, _)) => format!("{}...", &body[..end]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_long_body() {
        let body = "x".repeat(1000);
        let clipped = clip(&body);
        assert_eq!(clipped.len(), MAX_ERROR_BODY + 3);
        assert!(clipped.ends_with("..."));
    }

    #[test]
    fn test_clip_short_body() {
        assert_eq!(clip("  quota exceeded \n"), "quota exceeded");
    }

    #[test]
    fn test_build_client() {
        assert!(build_client(Duration::from_secs(5)).is_ok());
    }
}
