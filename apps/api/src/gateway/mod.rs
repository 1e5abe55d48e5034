//! LLM Gateway — the single point of entry for all chat-completion calls.
//!
//! ARCHITECTURAL RULE: no other module may talk to a provider API directly.
//! Each supported backend gets one `ChatProvider` implementation, selected by
//! configuration, so adding a provider means adding one variant — not editing
//! every call site.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{Config, ProviderKind};

const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Gateway gave up after {retries} attempts: {message}")]
    Exhausted { retries: u32, message: String },

    #[error("Provider returned no message content")]
    EmptyContent,
}

/// The wire format sent to every chat-completion endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A chat-completion backend. One implementation per provider schema —
/// the nesting of the answer text differs between them, and this trait is
/// the only place that knows about it.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn send(
        &self,
        messages: &[ChatMessage],
        model: &str,
        temperature: f32,
    ) -> Result<String, GatewayError>;

    fn name(&self) -> &'static str;
}

/// Builds the configured provider, or `None` when its API key is absent.
/// Callers must treat `None` as a configuration error, never as a fallback.
pub fn provider_from_config(config: &Config) -> Option<Arc<dyn ChatProvider>> {
    match config.provider {
        ProviderKind::OpenRouter => config.openrouter_api_key.clone().map(|key| {
            Arc::new(OpenRouterProvider::new(
                key,
                config.openrouter_base_url.clone(),
                config.openrouter_referer.clone(),
            )) as Arc<dyn ChatProvider>
        }),
        ProviderKind::Anthropic => config.anthropic_api_key.clone().map(|key| {
            Arc::new(AnthropicProvider::new(
                key,
                config.anthropic_base_url.clone(),
            )) as Arc<dyn ChatProvider>
        }),
    }
}

fn build_client() -> Client {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .expect("Failed to build HTTP client")
}

/// Shared retry loop: retries transport errors, 429 and 5xx with exponential
/// backoff; any other non-success status is returned immediately.
async fn post_with_retry(
    client: &Client,
    build_request: impl Fn() -> reqwest::RequestBuilder,
) -> Result<serde_json::Value, GatewayError> {
    let mut last_error: Option<GatewayError> = None;

    for attempt in 0..MAX_RETRIES {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s
            let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
            warn!(
                "Gateway call attempt {} failed, retrying after {}ms...",
                attempt,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }

        let response = match build_request().send().await {
            Ok(r) => r,
            Err(e) => {
                last_error = Some(GatewayError::Http(e));
                continue;
            }
        };

        let status = response.status();

        if status.as_u16() == 429 || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            warn!("Provider returned {}: {}", status, body);
            last_error = Some(GatewayError::Api {
                status: status.as_u16(),
                message: body,
            });
            continue;
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = parse_error_message(&body).unwrap_or(body);
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        return response.json().await.map_err(GatewayError::Http);
    }

    let message = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no attempt completed".to_string());
    Err(GatewayError::Exhausted {
        retries: MAX_RETRIES,
        message,
    })
}

/// Both provider schemas nest their error text under `error.message`.
fn parse_error_message(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorEnvelope {
        error: ErrorBody,
    }
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|e| e.error.message)
}

// ────────────────────────────────────────────────────────────────────────────
// OpenRouter (OpenAI-style schema)
// ────────────────────────────────────────────────────────────────────────────

/// OpenAI-compatible provider. The answer lives at
/// `choices[0].message.content`.
pub struct OpenRouterProvider {
    client: Client,
    api_key: String,
    base_url: String,
    referer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl OpenRouterProvider {
    pub fn new(api_key: String, base_url: String, referer: Option<String>) -> Self {
        OpenRouterProvider {
            client: build_client(),
            api_key,
            base_url,
            referer,
        }
    }
}

#[async_trait]
impl ChatProvider for OpenRouterProvider {
    async fn send(
        &self,
        messages: &[ChatMessage],
        model: &str,
        temperature: f32,
    ) -> Result<String, GatewayError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = json!({
            "model": model,
            "messages": messages,
            "temperature": temperature,
        });

        let value = post_with_retry(&self.client, || {
            let mut request = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .header("content-type", "application/json")
                .json(&body);
            if let Some(referer) = &self.referer {
                request = request.header("HTTP-Referer", referer);
            }
            request
        })
        .await?;

        if let Some(actual_model) = value.get("model").and_then(|m| m.as_str()) {
            debug!("OpenRouter routed request to model {actual_model}");
        }

        let parsed: ChatCompletionResponse =
            serde_json::from_value(value).map_err(|_| GatewayError::EmptyContent)?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(GatewayError::EmptyContent)
    }

    fn name(&self) -> &'static str {
        "openrouter"
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Anthropic (Messages API schema)
// ────────────────────────────────────────────────────────────────────────────

/// Anthropic Messages API provider. System messages travel in the top-level
/// `system` field and the answer lives at `content[0].text`.
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

impl AnthropicProvider {
    pub fn new(api_key: String, base_url: String) -> Self {
        AnthropicProvider {
            client: build_client(),
            api_key,
            base_url,
        }
    }
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    async fn send(
        &self,
        messages: &[ChatMessage],
        model: &str,
        temperature: f32,
    ) -> Result<String, GatewayError> {
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));

        let system = messages
            .iter()
            .filter(|m| m.role == "system")
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let user_messages: Vec<&ChatMessage> =
            messages.iter().filter(|m| m.role != "system").collect();

        let mut body = json!({
            "model": model,
            "max_tokens": ANTHROPIC_MAX_TOKENS,
            "messages": user_messages,
            "temperature": temperature,
        });
        if !system.is_empty() {
            body["system"] = json!(system);
        }

        let value = post_with_retry(&self.client, || {
            self.client
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&body)
        })
        .await?;

        let parsed: AnthropicResponse =
            serde_json::from_value(value).map_err(|_| GatewayError::EmptyContent)?;
        parsed
            .content
            .into_iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text)
            .ok_or(GatewayError::EmptyContent)
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use serde_json::Value;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn openrouter_returns_nested_content_on_200() {
        let router = Router::new().route(
            "/chat/completions",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["model"], "qwen/qwen-max");
                assert_eq!(body["messages"][0]["role"], "user");
                Json(json!({
                    "model": "qwen/qwen-max",
                    "choices": [{"message": {"content": "## Report\nOK"}}]
                }))
            }),
        );
        let base = serve(router).await;

        let provider = OpenRouterProvider::new("test-key".to_string(), base, None);
        let content = provider
            .send(&[ChatMessage::user("hello")], "qwen/qwen-max", 0.7)
            .await
            .unwrap();
        assert_eq!(content, "## Report\nOK");
    }

    #[tokio::test]
    async fn openrouter_exhausts_retries_on_500() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async {
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "server on fire",
                )
            }),
        );
        let base = serve(router).await;

        let provider = OpenRouterProvider::new("test-key".to_string(), base, None);
        let err = provider
            .send(&[ChatMessage::user("hello")], "qwen/qwen-max", 0.7)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Exhausted { retries: 3, .. }));
    }

    #[tokio::test]
    async fn openrouter_surfaces_4xx_without_retrying() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async {
                (
                    axum::http::StatusCode::UNAUTHORIZED,
                    r#"{"error": {"message": "invalid api key"}}"#,
                )
            }),
        );
        let base = serve(router).await;

        let provider = OpenRouterProvider::new("bad-key".to_string(), base, None);
        let err = provider
            .send(&[ChatMessage::user("hello")], "qwen/qwen-max", 0.7)
            .await
            .unwrap_err();
        match err {
            GatewayError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "invalid api key");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn connection_refused_is_an_error_not_a_panic() {
        // Port 9 (discard) is closed on the loopback of any sane test host.
        let provider = OpenRouterProvider::new(
            "test-key".to_string(),
            "http://127.0.0.1:9".to_string(),
            None,
        );
        let err = provider
            .send(&[ChatMessage::user("hello")], "qwen/qwen-max", 0.7)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Exhausted { .. }));
    }

    #[tokio::test]
    async fn anthropic_extracts_first_text_block() {
        let router = Router::new().route(
            "/v1/messages",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["max_tokens"], 4096);
                assert_eq!(body["system"], "be helpful");
                Json(json!({
                    "content": [
                        {"type": "thinking", "text": null},
                        {"type": "text", "text": "analysis complete"}
                    ]
                }))
            }),
        );
        let base = serve(router).await;

        let provider = AnthropicProvider::new("test-key".to_string(), base);
        let content = provider
            .send(
                &[ChatMessage::system("be helpful"), ChatMessage::user("hi")],
                "claude-sonnet-4-5",
                0.3,
            )
            .await
            .unwrap();
        assert_eq!(content, "analysis complete");
    }

    #[tokio::test]
    async fn empty_choices_is_empty_content() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async { Json(json!({"choices": []})) }),
        );
        let base = serve(router).await;

        let provider = OpenRouterProvider::new("test-key".to_string(), base, None);
        let err = provider
            .send(&[ChatMessage::user("hello")], "qwen/qwen-max", 0.7)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::EmptyContent));
    }
}
