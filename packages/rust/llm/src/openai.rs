//! OpenAI-compatible chat completions client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use pagedigest_shared::{PageDigestError, ProviderConfig, Result, SummaryRequest};

use crate::CompletionProvider;

/// Talks to `{base_url}/chat/completions` with a single user message per call.
pub struct OpenAiProvider {
    client: Client,
    endpoint: String,
}

impl OpenAiProvider {
    /// Build a client for the configured endpoint.
    pub fn new(api_key: &str, config: &ProviderConfig) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(PageDigestError::config("missing API key"));
        }

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| PageDigestError::config("API key contains invalid characters"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| {
                PageDigestError::config(format!("failed to build provider HTTP client: {e}"))
            })?;

        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));

        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(&self, request: &SummaryRequest, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            frequency_penalty: request.frequency_penalty,
            presence_penalty: request.presence_penalty,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let started = Instant::now();
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| PageDigestError::provider(None, e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(PageDigestError::provider(
                Some(status.as_u16()),
                text.chars().take(500).collect::<String>(),
            ));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| PageDigestError::provider(None, format!("invalid response body: {e}")))?;

        if let Some(usage) = &parsed.usage {
            debug!(
                model = %request.model,
                tokens_in = usage.prompt_tokens,
                tokens_out = usage.completion_tokens,
                latency_ms = started.elapsed().as_millis() as u64,
                "completion received"
            );
        }

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| {
                PageDigestError::provider(Some(status.as_u16()), "response had no choices")
            })
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> SummaryRequest {
        SummaryRequest {
            model: "test-model".into(),
            max_tokens: 64,
            temperature: 0.5,
            top_p: None,
            frequency_penalty: None,
            presence_penalty: Some(-0.1),
            prompt: "ignored by the provider".into(),
        }
    }

    fn provider(server: &MockServer) -> OpenAiProvider {
        let config = ProviderConfig {
            base_url: format!("{}/v1/", server.uri()),
            ..ProviderConfig::default()
        };
        OpenAiProvider::new("sk-test", &config).unwrap()
    }

    #[test]
    fn chat_request_serializes_correctly() {
        let req = request();
        let body = ChatRequest {
            model: &req.model,
            max_tokens: req.max_tokens,
            temperature: req.temperature,
            top_p: req.top_p,
            frequency_penalty: req.frequency_penalty,
            presence_penalty: req.presence_penalty,
            messages: vec![ChatMessage {
                role: "user",
                content: "hello",
            }],
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains(r#""model":"test-model""#));
        assert!(json.contains(r#""role":"user""#));
        assert!(!json.contains("top_p"));
    }

    #[test]
    fn empty_api_key_rejected() {
        let result = OpenAiProvider::new("  ", &ProviderConfig::default());
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "test-model",
                "messages": [{ "role": "user", "content": "Summarize this" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": "A summary." } }],
                "usage": { "prompt_tokens": 10, "completion_tokens": 3 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = provider(&server)
            .complete(&request(), "Summarize this")
            .await
            .unwrap();
        assert_eq!(text, "A summary.");
    }

    #[tokio::test]
    async fn rate_limit_is_transient_provider_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let err = provider(&server)
            .complete(&request(), "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, PageDigestError::Provider { status: Some(429), .. }));
        assert!(err.is_transient());
        assert!(err.to_string().contains("slow down"));
    }

    #[tokio::test]
    async fn empty_choices_is_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let err = provider(&server)
            .complete(&request(), "hi")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no choices"));
    }
}
