//! OpenAI-compatible chat-completions client (OpenRouter by default).

use async_trait::async_trait;
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use accesscms_shared::{AccessCmsError, GenerationConfig, Result};

use crate::{GenerationRequest, TextGenerator};

/// User-Agent string for generation requests.
const USER_AGENT: &str = concat!("AccessCMS/", env!("CARGO_PKG_VERSION"));

/// Maximum number of response-body bytes echoed into an error message.
const ERROR_BODY_PREVIEW: usize = 300;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageResponse,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Chat-completions client for any OpenAI-compatible endpoint.
pub struct ChatCompletionsClient {
    client: Client,
    endpoint: Url,
    api_key: String,
    model: String,
}

impl ChatCompletionsClient {
    /// Build a client from the `[generation]` config and a resolved API key.
    pub fn new(config: &GenerationConfig, api_key: impl Into<String>) -> Result<Self> {
        let endpoint = chat_completions_url(&config.base_url)?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                AccessCmsError::generation(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.into(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionsClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system_instruction,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| AccessCmsError::generation(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let preview: String = text.chars().take(ERROR_BODY_PREVIEW).collect();
            return Err(AccessCmsError::generation(format!("HTTP {status}: {preview}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AccessCmsError::generation(format!("invalid response body: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AccessCmsError::generation("response contained no message content"))?;

        debug!(chars = content.len(), "generation complete");
        Ok(content)
    }
}

/// Resolve `<base_url>/chat/completions`, keeping any path on the base.
fn chat_completions_url(base_url: &str) -> Result<Url> {
    let base = if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{base_url}/")
    };

    Url::parse(&base)
        .and_then(|u| u.join("chat/completions"))
        .map_err(|e| AccessCmsError::config(format!("invalid generation base_url '{base_url}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> GenerationRequest {
        GenerationRequest {
            system_instruction: "You are an accessibility expert.".into(),
            user_prompt: "Adapt this.".into(),
            max_tokens: 4096,
            temperature: 0.3,
        }
    }

    fn config_for(server: &MockServer) -> GenerationConfig {
        GenerationConfig {
            base_url: format!("{}/api/v1", server.uri()),
            ..GenerationConfig::default()
        }
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let url = chat_completions_url("https://openrouter.ai/api/v1").unwrap();
        assert_eq!(url.as_str(), "https://openrouter.ai/api/v1/chat/completions");

        let url = chat_completions_url("http://localhost:8000/v1/").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/v1/chat/completions");
    }

    #[test]
    fn invalid_base_url_is_config_error() {
        let err = chat_completions_url("not a url").unwrap_err();
        assert!(matches!(err, AccessCmsError::Config { .. }));
    }

    #[tokio::test]
    async fn generate_returns_first_choice() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "openai/gpt-4o-mini",
                "max_tokens": 4096,
                "messages": [
                    {"role": "system", "content": "You are an accessibility expert."},
                    {"role": "user", "content": "Adapt this."}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "{\"name\": \"Inn\"}"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatCompletionsClient::new(&config_for(&server), "test-key").unwrap();
        let text = client.generate(&request()).await.expect("generate");
        assert_eq!(text, r#"{"name": "Inn"}"#);
    }

    #[tokio::test]
    async fn http_error_is_generation_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let client = ChatCompletionsClient::new(&config_for(&server), "test-key").unwrap();
        let err = client.generate(&request()).await.unwrap_err();
        assert!(matches!(err, AccessCmsError::Generation(ref m) if m.contains("429")));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn empty_choices_is_generation_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let client = ChatCompletionsClient::new(&config_for(&server), "test-key").unwrap();
        let err = client.generate(&request()).await.unwrap_err();
        assert!(err.to_string().contains("no message content"));
    }

    #[tokio::test]
    async fn non_json_body_is_generation_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = ChatCompletionsClient::new(&config_for(&server), "test-key").unwrap();
        let err = client.generate(&request()).await.unwrap_err();
        assert!(matches!(err, AccessCmsError::Generation(_)));
    }
}
