use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::TutorConfig;
use crate::errors::{CallError, TutorError, TutorResult, ValidationError};
use crate::types::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage};

/// Generation options sent with every completion call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    temperature: f32,
    max_output_tokens: u32,
}

impl CompletionOptions {
    pub fn new(temperature: f32, max_output_tokens: u32) -> Result<Self, ValidationError> {
        if !(0.0..=1.0).contains(&temperature) {
            return Err(ValidationError::TemperatureOutOfRange(temperature));
        }
        if max_output_tokens == 0 {
            return Err(ValidationError::ZeroMaxTokens);
        }
        Ok(Self {
            temperature,
            max_output_tokens,
        })
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn max_output_tokens(&self) -> u32 {
        self.max_output_tokens
    }
}

/// Common seam for anything that turns a prompt into generated text
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Performs one completion. Implementations never retry.
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String, CallError>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;

    /// Get the model name being used
    fn model_name(&self) -> String;
}

/// Client for an OpenAI-compatible chat-completions endpoint
#[derive(Debug, Clone)]
pub struct CompletionClient {
    http_client: Client,
    api_url: String,
    api_key: Option<String>,
    model_name: String,
    system_prompt: Option<String>,
}

impl CompletionClient {
    /// Create a client from the primary credential settings.
    ///
    /// A missing key is allowed here; calls then fail with `CallError::Unconfigured`.
    pub fn new(config: &TutorConfig) -> TutorResult<Self> {
        Ok(Self {
            http_client: build_http_client(config.timeout_secs)?,
            api_url: config.api_url().to_string(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            model_name: config.model_name().to_string(),
            system_prompt: config.system_prompt.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl CompletionBackend for CompletionClient {
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String, CallError> {
        let api_key = self.api_key.as_deref().ok_or(CallError::Unconfigured)?;

        let mut messages = Vec::with_capacity(2);
        if let Some(system_prompt) = &self.system_prompt {
            messages.push(ChatMessage::system(system_prompt.clone()));
        }
        messages.push(ChatMessage::user(prompt));

        let request = ChatCompletionRequest {
            model: &self.model_name,
            messages,
            temperature: options.temperature(),
            max_tokens: options.max_output_tokens(),
        };

        debug!(
            model = %self.model_name,
            prompt_len = prompt.len(),
            temperature = options.temperature(),
            "Sending completion request"
        );

        send_chat_request(&self.http_client, &self.api_url, api_key, &request).await
    }

    fn provider_name(&self) -> &'static str {
        "openai-compatible"
    }

    fn model_name(&self) -> String {
        self.model_name.clone()
    }
}

pub(crate) fn build_http_client(timeout_secs: Option<u64>) -> TutorResult<Client> {
    let mut builder = Client::builder();
    if let Some(secs) = timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder
        .build()
        .map_err(|e| TutorError::ConfigError(format!("Failed to create HTTP client: {}", e)))
}

/// Posts one chat-completions request and extracts the first choice's text
pub(crate) async fn send_chat_request(
    http_client: &Client,
    url: &str,
    api_key: &str,
    request: &ChatCompletionRequest<'_>,
) -> Result<String, CallError> {
    let response = http_client
        .post(url)
        .bearer_auth(api_key)
        .json(request)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), "Completion endpoint returned an error");
        return Err(CallError::from_status(status.as_u16(), body));
    }

    let body = response.text().await?;
    let parsed: ChatCompletionResponse = serde_json::from_str(&body)
        .map_err(|e| CallError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

    parsed
        .first_text()
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| CallError::InvalidResponse("No text in first choice".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config_for(server: &mockito::ServerGuard, api_key: Option<&str>) -> TutorConfig {
        TutorConfig {
            api_key: api_key.map(str::to_string),
            api_url: Some(format!("{}/v1/chat/completions", server.url())),
            model_name: Some("test-model".to_string()),
            ..Default::default()
        }
    }

    fn options() -> CompletionOptions {
        CompletionOptions::new(0.2, 256).unwrap()
    }

    #[test]
    fn test_options_validation() {
        assert!(CompletionOptions::new(0.0, 1).is_ok());
        assert!(CompletionOptions::new(1.0, 1).is_ok());
        assert_eq!(
            CompletionOptions::new(1.01, 1),
            Err(ValidationError::TemperatureOutOfRange(1.01))
        );
        assert!(CompletionOptions::new(f32::NAN, 1).is_err());
        assert_eq!(
            CompletionOptions::new(0.5, 0),
            Err(ValidationError::ZeroMaxTokens)
        );
    }

    #[tokio::test]
    async fn test_complete_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer secret")
            .match_header("content-type", "application/json")
            .match_body(mockito::Matcher::PartialJson(json!({
                "model": "test-model",
                "messages": [{"role": "user", "content": "2+2=?"}],
                "max_tokens": 256
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"choices": [{"message": {"role": "assistant", "content": "GABARITO: B"}}]})
                    .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let client = CompletionClient::new(&config_for(&server, Some("secret"))).unwrap();
        let text = client.complete("2+2=?", &options()).await.unwrap();

        assert_eq!(text, "GABARITO: B");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_system_prompt_sent_first() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_body(mockito::Matcher::PartialJson(json!({
                "messages": [
                    {"role": "system", "content": "Seja breve."},
                    {"role": "user", "content": "oi"}
                ]
            })))
            .with_status(200)
            .with_body(json!({"choices": [{"message": {"content": "ok"}}]}).to_string())
            .create_async()
            .await;

        let mut config = config_for(&server, Some("secret"));
        config.system_prompt = Some("Seja breve.".to_string());
        let client = CompletionClient::new(&config).unwrap();

        assert_eq!(client.complete("oi", &options()).await.unwrap(), "ok");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_status_codes_are_classified() {
        let cases = [
            (401, CallError::Unauthenticated("denied".to_string())),
            (403, CallError::Unauthorized("denied".to_string())),
            (429, CallError::RateLimited("denied".to_string())),
            (
                500,
                CallError::ServerError {
                    status: 500,
                    body: "denied".to_string(),
                },
            ),
        ];

        for (status, expected) in cases {
            let mut server = mockito::Server::new_async().await;
            let _mock = server
                .mock("POST", "/v1/chat/completions")
                .with_status(status)
                .with_body("denied")
                .create_async()
                .await;

            let client = CompletionClient::new(&config_for(&server, Some("secret"))).unwrap();
            let err = client.complete("q", &options()).await.unwrap_err();
            assert_eq!(err, expected, "status {}", status);
        }
    }

    #[tokio::test]
    async fn test_missing_key_makes_no_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .expect(0)
            .create_async()
            .await;

        let client = CompletionClient::new(&config_for(&server, None)).unwrap();
        assert!(!client.is_configured());
        assert_eq!(
            client.complete("q", &options()).await,
            Err(CallError::Unconfigured)
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_payload_without_text_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(json!({"choices": []}).to_string())
            .create_async()
            .await;

        let client = CompletionClient::new(&config_for(&server, Some("secret"))).unwrap();
        let err = client.complete("q", &options()).await.unwrap_err();
        assert!(matches!(err, CallError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_blank_content_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(
                json!({"choices": [{"message": {"role": "assistant", "content": "  \n "}}]})
                    .to_string(),
            )
            .create_async()
            .await;

        let client = CompletionClient::new(&config_for(&server, Some("secret"))).unwrap();
        let err = client.complete("q", &options()).await.unwrap_err();
        assert!(matches!(err, CallError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_connection_failure_is_transport_error() {
        let config = TutorConfig {
            api_key: Some("secret".to_string()),
            api_url: Some("http://127.0.0.1:1/v1/chat/completions".to_string()),
            ..Default::default()
        };
        let client = CompletionClient::new(&config).unwrap();
        let err = client.complete("q", &options()).await.unwrap_err();
        assert!(matches!(err, CallError::TransportError(_)));
    }
}
