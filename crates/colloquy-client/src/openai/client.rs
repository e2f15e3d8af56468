//! OpenAI-compatible client implementation.
//!
//! Works against any endpoint that speaks the OpenAI chat completions API.
//! Transient failures (connection errors, 429s, 5xxs) are retried with
//! exponential backoff; the `Retry-After` header is honored when present.
//! API keys are held in a [`SecretString`] so they never appear in debug
//! output or logs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, warn};
use reqwest_middleware::ClientWithMiddleware;
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use reqwest_retry_after::RetryAfterMiddleware;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;
use uuid::Uuid;

use colloquy_common::chat::Message;
use colloquy_common::client::{ChatRequest, ChatResponse, Config};
use colloquy_common::tools::ToolCall;

use crate::LLMClient;
use crate::error::{ClientError, ErrorResponse};
use crate::openai::{ChatCompletionRequest, ChatCompletionResponse, OpenAIMessage};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for OpenAI-compatible chat completion endpoints.
pub struct OpenAIClient {
    client: ClientWithMiddleware,
    api_key: Arc<SecretString>,
    base_url: String,
    config: Arc<Config>,
}

impl std::fmt::Debug for OpenAIClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIClient")
            .field("base_url", &self.base_url)
            .field("model", &self.config.model)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl OpenAIClient {
    /// Creates a new client from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ConfigurationError`] if the configuration is
    /// invalid or no API key is set, and [`ClientError::NetworkError`] if
    /// the HTTP client cannot be constructed.
    pub fn new(config: Config) -> Result<Self, ClientError> {
        config
            .validate()
            .map_err(|e| ClientError::ConfigurationError(e.to_string()))?;

        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ClientError::ConfigurationError("API key is required".to_string()))?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(
                config.retry_config.initial_delay,
                config.retry_config.max_delay,
            )
            .build_with_max_retries(config.retry_config.max_retries);

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(timeout));
        }
        let http_client = builder.build()?;

        // Retry-After handling must run before the transient retry policy
        // so 429 responses wait the server-requested duration.
        let client = reqwest_middleware::ClientBuilder::new(http_client)
            .with(RetryAfterMiddleware::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            api_key: Arc::new(api_key),
            base_url,
            config: Arc::new(config),
        })
    }

    async fn make_request<T, B>(&self, endpoint: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync,
    {
        let url = Url::parse(&format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint
        ))
        .map_err(|e| ClientError::ConfigurationError(format!("invalid base URL: {e}")))?;

        debug!("sending request to {url}");

        let response = self
            .client
            .post(url)
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body_text)
                .map_or(body_text, |parsed| parsed.error.message);

            return Err(match status.as_u16() {
                401 | 403 => ClientError::AuthenticationError(message),
                429 => ClientError::RateLimitError { retry_after: None },
                503 => ClientError::ServiceUnavailable(message),
                _ => ClientError::RequestError(format!("{status}: {message}")),
            });
        }

        Ok(response.json::<T>().await?)
    }

    fn convert_message(openai_message: &OpenAIMessage) -> Message {
        let mut message = Message::new(
            Uuid::nil(),
            openai_message.role,
            openai_message.content.clone().unwrap_or_default(),
        );
        message.name = openai_message.name.clone();
        message.tool_call_id = openai_message.tool_call_id.clone();
        if let Some(tool_calls) = &openai_message.tool_calls {
            message.tool_calls = tool_calls.iter().map(ToolCall::from).collect();
        }
        message
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    fn config(&self) -> &Config {
        &self.config
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError> {
        self.validate_request(request)?;

        let wire_request = ChatCompletionRequest::from((request, self.config.as_ref()));
        let response: ChatCompletionResponse =
            self.make_request("chat/completions", &wire_request).await?;

        let choice = response.choices.first().ok_or_else(|| {
            ClientError::InvalidResponse("completion contained no choices".to_string())
        })?;

        let finish_reason = choice.finish_reason.as_deref().and_then(|reason| {
            reason
                .parse()
                .map_err(|_| warn!("unrecognized finish reason: {reason}"))
                .ok()
        });

        Ok(ChatResponse {
            message: Self::convert_message(&choice.message),
            model: response.model,
            usage: response.usage,
            finish_reason,
            created_at: Utc::now(),
            response_id: Some(response.id),
        })
    }
}
