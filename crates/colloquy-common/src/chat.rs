//! Conversation and message management.
//!
//! A [`Conversation`] is an append-only thread of [`Message`]s. Only `user`
//! and `assistant` messages are ever persisted; `system` and `tool` messages
//! exist transiently in the transcripts sent to the LLM provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use typed_builder::TypedBuilder;
use uuid::Uuid;

use crate::tools::ToolCall;

/// Title assigned to a conversation before generation has produced one.
pub const UNTITLED_TITLE: &str = "Untitled conversation";

/// The role of a message sender.
///
/// Serialized to lowercase strings matching the OpenAI API format.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum MessageRole {
    /// System-level instructions or context. Transcript-only, never persisted.
    #[serde(rename = "system")]
    System,
    /// Input from the end user.
    #[serde(rename = "user")]
    User,
    /// Responses from the LLM, possibly carrying tool-call requests.
    #[serde(rename = "assistant")]
    Assistant,
    /// A tool execution result fed back to the model. Transcript-only.
    #[serde(rename = "tool")]
    Tool,
}

/// A single message in a conversation or transcript.
///
/// Messages are immutable once appended to a conversation. Assistant
/// messages may carry tool calls; tool messages must reference the call
/// they answer via `tool_call_id`.
#[derive(Debug, Serialize, Deserialize, Clone, TypedBuilder)]
pub struct Message {
    /// Unique identifier, generated at creation.
    #[builder(default = Uuid::new_v4())]
    pub id: Uuid,

    /// The conversation this message belongs to. Enforced by
    /// [`Conversation::add_message`].
    pub conversation_id: Uuid,

    /// Who produced this message.
    pub role: MessageRole,

    /// The text content. For tool messages, the tool's output (or an
    /// in-band error string).
    pub content: String,

    /// When this message was created.
    #[builder(default = Utc::now())]
    pub timestamp: DateTime<Utc>,

    /// Tool calls requested by an assistant message.
    ///
    /// `SmallVec` avoids heap allocation for the common one-or-two-call case.
    #[builder(default)]
    #[serde(default, skip_serializing_if = "SmallVec::is_empty")]
    pub tool_calls: SmallVec<[ToolCall; 2]>,

    /// For tool messages, the id of the tool call this result answers.
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// For tool messages, the name of the function that was called.
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    /// Creates a new message with the given role and content.
    pub fn new(conversation_id: Uuid, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            role,
            content: content.into(),
            timestamp: Utc::now(),
            tool_calls: SmallVec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    /// Creates a system message.
    pub fn system(conversation_id: Uuid, content: impl Into<String>) -> Self {
        Self::new(conversation_id, MessageRole::System, content)
    }

    /// Creates a user message.
    pub fn user(conversation_id: Uuid, content: impl Into<String>) -> Self {
        Self::new(conversation_id, MessageRole::User, content)
    }

    /// Creates an assistant message.
    pub fn assistant(conversation_id: Uuid, content: impl Into<String>) -> Self {
        Self::new(conversation_id, MessageRole::Assistant, content)
    }

    /// Creates a tool result message answering a specific tool call.
    ///
    /// # Errors
    ///
    /// Returns an error if `tool_call_id` or `function_name` is empty.
    pub fn tool(
        conversation_id: Uuid,
        content: impl Into<String>,
        tool_call_id: String,
        function_name: String,
    ) -> anyhow::Result<Self> {
        if tool_call_id.is_empty() {
            anyhow::bail!("Tool call ID cannot be empty");
        }
        if function_name.is_empty() {
            anyhow::bail!("Function name cannot be empty for tool messages");
        }
        let mut msg = Self::new(conversation_id, MessageRole::Tool, content);
        msg.tool_call_id = Some(tool_call_id);
        msg.name = Some(function_name);
        Ok(msg)
    }

    /// Attaches tool calls to this message.
    ///
    /// # Errors
    ///
    /// Returns an error if this is not an assistant message.
    pub fn with_tool_calls(
        mut self,
        tool_calls: impl Into<SmallVec<[ToolCall; 2]>>,
    ) -> anyhow::Result<Self> {
        if self.role != MessageRole::Assistant {
            anyhow::bail!(
                "Tool calls can only be added to assistant messages, found {:?}",
                self.role
            );
        }
        self.tool_calls = tool_calls.into();
        Ok(self)
    }
}

/// A persisted conversation thread.
///
/// The orchestrator appends messages and updates the title/timestamp; a
/// persisted conversation always has at least one message, and messages are
/// never reordered or removed.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Conversation {
    /// Unique identifier, assigned at creation.
    pub id: Uuid,

    /// Human-readable title. Starts as [`UNTITLED_TITLE`] and is replaced
    /// once title generation (or its fallback) resolves.
    pub title: String,

    /// When this conversation was created. Never changes.
    pub created_at: DateTime<Utc>,

    /// When this conversation was last modified.
    pub updated_at: DateTime<Utc>,

    /// Messages in append order. Only user and assistant roles appear here.
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Creates a new conversation with a generated id and placeholder title.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: UNTITLED_TITLE.to_string(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
        }
    }

    /// Sets the title, updating the modification timestamp.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.touch();
    }

    /// Updates the `updated_at` timestamp to the current time.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Appends a message to this conversation.
    ///
    /// # Errors
    ///
    /// Returns an error if the message belongs to a different conversation.
    pub fn add_message(&mut self, message: Message) -> anyhow::Result<()> {
        if message.conversation_id != self.id {
            anyhow::bail!(
                "Message conversation_id {} does not match conversation id {}",
                message.conversation_id,
                self.id
            );
        }
        self.messages.push(message);
        self.touch();
        Ok(())
    }

    /// Creates a user message linked to this conversation.
    pub fn user_message(&self, content: impl Into<String>) -> Message {
        Message::user(self.id, content)
    }

    /// Creates an assistant message linked to this conversation.
    pub fn assistant_message(&self, content: impl Into<String>) -> Message {
        Message::assistant(self.id, content)
    }

    /// Returns the first user message, if any.
    #[must_use]
    pub fn first_user_message(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.role == MessageRole::User)
    }

    /// Returns the messages-stripped summary of this conversation.
    #[must_use]
    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id,
            title: self.title.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            message_count: self.messages.len(),
        }
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// Conversation metadata without its messages, as returned by the list
/// operation.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConversationSummary {
    /// Conversation identifier.
    pub id: Uuid,
    /// Current title.
    pub title: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
    /// Number of persisted messages.
    pub message_count: usize,
}


#[cfg(test)]
mod proptests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn message_serialization_roundtrip(
            content in ".*",
            role_idx in 0usize..4,
        ) {
            let conv_id = Uuid::new_v4();
            let role = match role_idx {
                0 => MessageRole::User,
                1 => MessageRole::Assistant,
                2 => MessageRole::System,
                _ => MessageRole::Tool,
            };

            let msg = Message::new(conv_id, role, content);
            let serialized = serde_json::to_string(&msg).expect("Failed to serialize");
            let deserialized: Message = serde_json::from_str(&serialized)
                .expect("Failed to deserialize");

            assert_eq!(msg.id, deserialized.id);
            assert_eq!(msg.conversation_id, deserialized.conversation_id);
            assert_eq!(msg.role, deserialized.role);
            assert_eq!(msg.content, deserialized.content);
        }

        #[test]
        fn fuzz_message_deserialization(data in prop::collection::vec(any::<u8>(), 0..1000)) {
            // Should not panic on arbitrary bytes
            let _ = serde_json::from_slice::<Message>(&data);
        }

        #[test]
        fn fuzz_tool_message_with_arbitrary_ids(
            content in ".*",
            tool_call_id in ".*",
            func_name in ".*",
        ) {
            let conv_id = Uuid::new_v4();
            let result = Message::tool(conv_id, content.clone(), tool_call_id.clone(), func_name.clone());

            if tool_call_id.is_empty() || func_name.is_empty() {
                assert!(result.is_err());
            } else {
                let msg = result.unwrap();
                assert_eq!(msg.tool_call_id, Some(tool_call_id));
                assert_eq!(msg.name, Some(func_name));
                assert_eq!(msg.content, content);
            }
        }

        #[test]
        fn fuzz_conversation_serialization(
            title in ".*",
            num_messages in 0usize..20,
        ) {
            let mut conv = Conversation::new();
            conv.set_title(title);

            for i in 0..num_messages {
                let msg = conv.user_message(format!("Message {i}"));
                conv.add_message(msg).unwrap();
            }

            let json = serde_json::to_string(&conv).unwrap();
            let parsed: Conversation = serde_json::from_str(&json).unwrap();

            assert_eq!(conv.id, parsed.id);
            assert_eq!(conv.title, parsed.title);
            assert_eq!(conv.messages.len(), parsed.messages.len());
        }

        #[test]
        fn conversation_messages_stay_append_ordered(
            contents in prop::collection::vec("[a-z]{1,20}", 1..10),
        ) {
            let mut conv = Conversation::new();
            for content in &contents {
                conv.add_message(conv.user_message(content.clone())).unwrap();
            }

            let stored: Vec<&str> = conv.messages.iter().map(|m| m.content.as_str()).collect();
            let expected: Vec<&str> = contents.iter().map(String::as_str).collect();
            assert_eq!(stored, expected);
        }
    }
}
