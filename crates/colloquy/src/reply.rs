//! The tool-calling reply loop.

use std::sync::Arc;

use log::{debug, info, warn};

use colloquy_client::LLMClient;
use colloquy_common::chat::{Conversation, Message, MessageRole};
use colloquy_common::client::{ChatRequest, ToolChoice};
use colloquy_tools::ToolExecutor;

use crate::error::EngineError;

/// Maximum number of tool call iterations before giving up on a reply.
pub const MAX_TOOL_CALL_ITERATIONS: u32 = 15;

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful, concise AI assistant. Provide accurate, safe, and clear responses.";

/// Generates assistant replies by running the model against the conversation
/// transcript, executing requested tools until the model answers in text.
pub struct ReplyEngine<C> {
    client: Arc<C>,
    tool_executor: ToolExecutor,
    system_prompt: String,
    model: Option<String>,
    max_iterations: u32,
}

impl<C: LLMClient> ReplyEngine<C> {
    /// Creates a reply engine with the default system prompt and iteration
    /// limit.
    pub fn new(client: Arc<C>, tool_executor: ToolExecutor) -> Self {
        Self {
            client,
            tool_executor,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            model: None,
            max_iterations: MAX_TOOL_CALL_ITERATIONS,
        }
    }

    /// Overrides the system prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Overrides the model for reply requests. Defaults to the client's
    /// configured model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Overrides the tool call iteration limit.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Generates a reply to the conversation's latest message.
    ///
    /// The persisted user and assistant messages form the base transcript;
    /// assistant tool call requests and tool results produced during the
    /// loop extend a working copy that is not persisted here. Tool failures
    /// of any kind are fed back to the model as textual tool output and
    /// never abort the loop.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EmptyConversation`] if the conversation has no
    /// messages, [`EngineError::Provider`] if a provider request fails, or
    /// [`EngineError::ToolCallLimitExceeded`] if the model is still
    /// requesting tools after the iteration limit.
    pub async fn generate_reply(
        &self,
        conversation: &Conversation,
    ) -> Result<Message, EngineError> {
        if conversation.messages.is_empty() {
            return Err(EngineError::EmptyConversation);
        }

        info!("generating reply for conversation {}", conversation.id);

        let mut transcript = vec![Message::system(conversation.id, &self.system_prompt)];
        transcript.extend(
            conversation
                .messages
                .iter()
                .filter(|m| matches!(m.role, MessageRole::User | MessageRole::Assistant))
                .cloned(),
        );

        for iteration in 1..=self.max_iterations {
            let mut request = ChatRequest::new(transcript.clone());
            if let Some(model) = &self.model {
                request = request.with_model(model.clone());
            }
            if !self.tool_executor.is_empty() {
                request = request
                    .with_tools(self.tool_executor.definitions())
                    .with_tool_choice(ToolChoice::Auto);
            }

            let response = self.client.chat(&request).await?;

            let mut assistant = response.message;
            assistant.conversation_id = conversation.id;

            if assistant.tool_calls.is_empty() {
                debug!("reply completed after {iteration} iteration(s)");
                return Ok(assistant);
            }

            let tool_calls = assistant.tool_calls.clone();
            transcript.push(assistant);

            for call in &tool_calls {
                info!(
                    "tool call received: {} (id: {})",
                    call.function.name, call.id
                );

                let result = match self.tool_executor.execute_tool(call).await {
                    Ok(output) => output,
                    Err(e) => {
                        warn!("tool {} failed: {e}", call.function.name);
                        format!("Error executing tool: {e}")
                    }
                };

                let mut tool_message = Message::new(conversation.id, MessageRole::Tool, result);
                tool_message.tool_call_id = Some(call.id.clone());
                tool_message.name = Some(call.function.name.clone());
                transcript.push(tool_message);
            }
        }

        Err(EngineError::ToolCallLimitExceeded {
            limit: self.max_iterations,
        })
    }
}
