//! Single-shot conversation title generation.

use std::sync::Arc;

use log::info;

use colloquy_client::LLMClient;
use colloquy_common::chat::{Conversation, Message};
use colloquy_common::client::ChatRequest;

use crate::error::EngineError;

/// Title used for conversations that have no messages yet.
pub const EMPTY_CONVERSATION_TITLE: &str = "An empty conversation";

/// Hard cap on title length, in characters. Longer titles are cut without
/// an ellipsis.
pub const MAX_TITLE_LENGTH: usize = 80;

const DEFAULT_TITLE_PROMPT: &str = "Generate a concise, descriptive title (2-6 words) that \
     summarizes the main topic of the user's question. Do not answer the question, just create \
     a brief topic summary. Examples: 'Weather in Barcelona', 'Today's Date', 'Barcelona \
     Holidays'.";

/// Generates a short title from a conversation's first user message.
///
/// Tools are never attached to title requests.
pub struct TitleEngine<C> {
    client: Arc<C>,
    prompt: String,
    model: Option<String>,
}

impl<C: LLMClient> TitleEngine<C> {
    /// Creates a title engine with the default prompt.
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            prompt: DEFAULT_TITLE_PROMPT.to_string(),
            model: None,
        }
    }

    /// Overrides the title prompt.
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Overrides the model for title requests. Defaults to the client's
    /// configured model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Generates a title for the conversation.
    ///
    /// Conversations without a user message get a fixed title without any
    /// provider call. Otherwise the first user message alone is summarized;
    /// later messages never influence the title.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Provider`] if the provider request fails, or
    /// [`EngineError::EmptyTitle`] if the model returns a blank title.
    pub async fn generate_title(
        &self,
        conversation: &Conversation,
    ) -> Result<String, EngineError> {
        let Some(first_user) = conversation.first_user_message() else {
            return Ok(EMPTY_CONVERSATION_TITLE.to_string());
        };

        info!("generating title for conversation {}", conversation.id);

        let transcript = vec![
            Message::system(conversation.id, &self.prompt),
            Message::user(conversation.id, first_user.content.clone()),
        ];

        let mut request = ChatRequest::new(transcript);
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }

        let response = self.client.chat(&request).await?;

        let title = normalize_title(&response.message.content);
        if title.is_empty() {
            return Err(EngineError::EmptyTitle);
        }

        Ok(title)
    }
}

/// Flattens newlines, strips surrounding whitespace, quotes, and dashes,
/// and cuts the result at [`MAX_TITLE_LENGTH`] characters.
fn normalize_title(raw: &str) -> String {
    let flattened = raw.replace(['\n', '\r'], " ");
    let trimmed =
        flattened.trim_matches(|c: char| c.is_whitespace() || matches!(c, '-' | '"' | '\''));
    trimmed.chars().take(MAX_TITLE_LENGTH).collect()
}
