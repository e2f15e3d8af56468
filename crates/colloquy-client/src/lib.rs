//! # colloquy-client
//!
//! LLM provider client for the colloquy chat backend.
//!
//! The [`LLMClient`] trait abstracts over chat completion providers so the
//! engines can be exercised against scripted fakes in tests. The only
//! shipped implementation is [`OpenAIClient`], which talks to any
//! OpenAI-compatible chat completions endpoint with automatic retries for
//! transient failures.
//!
//! ## Example
//!
//! ```no_run
//! use colloquy_client::{LLMClient, OpenAIClient};
//! use colloquy_common::client::{ChatRequest, Config};
//! use colloquy_common::chat::Conversation;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::new("openai", "gpt-4o-mini")
//!     .with_api_key("sk-...")
//!     .with_base_url("https://api.openai.com/v1");
//!
//! let client = OpenAIClient::new(config)?;
//!
//! let mut conversation = Conversation::new();
//! conversation.add_message(conversation.user_message("Hello!"))?;
//!
//! let request = ChatRequest::new(conversation.messages.clone());
//! let response = client.chat(&request).await?;
//! println!("{}", response.message.content);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use colloquy_common::client::{ChatRequest, ChatResponse, Config};

pub mod error;
pub mod openai;

pub use error::ClientError;
pub use openai::OpenAIClient;

/// A chat completion provider.
///
/// Implementations must be cheap to share across tasks; the daemon holds a
/// single client behind an `Arc` for its whole lifetime.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// The configuration this client was built with.
    fn config(&self) -> &Config;

    /// Sends a chat completion request and returns the model's response.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the request fails validation, the
    /// provider is unreachable, or the response cannot be used.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError>;

    /// Whether this client supports tool calling.
    fn supports_tools(&self) -> bool {
        true
    }

    /// Validates a request against this client's capabilities.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidRequest`] if the request fails local
    /// validation, or [`ClientError::ToolsNotSupported`] if tools are
    /// attached and the client cannot use them.
    fn validate_request(&self, request: &ChatRequest) -> Result<(), ClientError> {
        request
            .validate()
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;

        if request.has_tools() && !self.supports_tools() {
            return Err(ClientError::ToolsNotSupported);
        }

        Ok(())
    }
}
