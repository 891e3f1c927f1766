//! Gemini `generateContent` client.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use wayfarer_chat::{Generator, PromptContext, ProviderError};
use wayfarer_core::types::Role;

use crate::http::send_json;

const PROVIDER: &str = "generation";

/// Google Gemini text generation.
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    http: Client,
}

impl GeminiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        http: Client,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature,
            http,
        }
    }

    /// Build the request body: system instruction, history, then the
    /// context block and instruction as the final user message.
    fn build_request_body(&self, prompt: &PromptContext) -> Value {
        let mut contents: Vec<Value> = prompt
            .history
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                };
                json!({"role": role, "parts": [{"text": turn.text}]})
            })
            .collect();

        let final_text = if prompt.context_block.is_empty() {
            prompt.instruction.clone()
        } else {
            format!("{}\n\n{}", prompt.context_block.trim_end(), prompt.instruction)
        };
        contents.push(json!({"role": "user", "parts": [{"text": final_text}]}));

        json!({
            "systemInstruction": {"parts": [{"text": prompt.system}]},
            "contents": contents,
            "generationConfig": {"temperature": self.temperature},
        })
    }
}

#[async_trait]
impl Generator for GeminiClient {
    async fn generate(&self, prompt: &PromptContext) -> Result<String, ProviderError> {
        debug!(model = %self.model, history = prompt.history.len(), "Requesting generation");
        let request = self
            .http
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ))
            .query(&[("key", self.api_key.as_str())])
            .json(&self.build_request_body(prompt));
        let response: GeminiResponse = send_json(PROVIDER, request).await?;
        parse_text(response)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

fn parse_text(response: GeminiResponse) -> Result<String, ProviderError> {
    let invalid = |message: String| ProviderError::InvalidResponse {
        provider: PROVIDER.to_string(),
        message,
    };

    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates".to_string());
        return Err(invalid(format!("no reply: {reason}")));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(invalid("empty reply".to_string()));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wayfarer_core::types::{TravelMode, Turn};

    fn make_client() -> GeminiClient {
        GeminiClient::new(
            "https://generativelanguage.googleapis.com",
            "key",
            "gemini-2.0-flash",
            0.3,
            Client::new(),
        )
    }

    fn make_prompt() -> PromptContext {
        let mut prompt = PromptContext::bare("Be a guide.", "Where should I eat?", TravelMode::Chat);
        prompt.city = Some("Lisbon".to_string());
        prompt.context_block = "Current city: Lisbon\nMode: chat\n".to_string();
        prompt.history = vec![
            Turn {
                role: Role::User,
                text: "Lisbon".to_string(),
                timestamp: Utc::now(),
            },
            Turn {
                role: Role::Assistant,
                text: "Great pick!".to_string(),
                timestamp: Utc::now(),
            },
        ];
        prompt
    }

    #[test]
    fn test_request_body_maps_roles() {
        let body = make_client().build_request_body(&make_prompt());

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be a guide.");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][2]["role"], "user");
        assert_eq!(
            body["contents"][2]["parts"][0]["text"],
            "Current city: Lisbon\nMode: chat\n\nWhere should I eat?"
        );
        let temperature = body["generationConfig"]["temperature"].as_f64().unwrap();
        assert!((temperature - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_bare_prompt_is_single_message() {
        let prompt = PromptContext::bare("sys", "hello", TravelMode::Unset);
        let body = make_client().build_request_body(&prompt);
        assert_eq!(body["contents"].as_array().unwrap().len(), 1);
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
    }

    #[test]
    fn test_parse_joins_parts() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Try "}, {"text": "Time Out Market."}]},
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        assert_eq!(parse_text(response).unwrap(), "Try Time Out Market.");
    }

    #[test]
    fn test_parse_blocked_prompt() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        let err = parse_text(response).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_parse_empty_reply() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": []}}]
        }))
        .unwrap();
        assert!(parse_text(response).is_err());
    }
}
