//! # colloquy-common
//!
//! Shared types for the colloquy chat backend:
//! - Conversations and messages with role-based content
//! - Tool/function calling descriptors
//! - Chat request/response types and client configuration
//! - The daemon socket wire protocol
//!
//! ## Example
//!
//! ```
//! use colloquy_common::{Conversation, Message};
//!
//! let mut conv = Conversation::new();
//! let msg = Message::user(conv.id, "What time is it?");
//! conv.add_message(msg).unwrap();
//! assert_eq!(conv.messages.len(), 1);
//! ```

/// Chat conversation and message types.
pub mod chat;
/// Client configuration and chat request/response types.
pub mod client;
/// Request/response types for the daemon Unix-socket protocol.
pub mod protocol;
/// Tool calling and function descriptor types.
pub mod tools;

pub use chat::{Conversation, ConversationSummary, Message, MessageRole, UNTITLED_TITLE};
pub use client::{ChatRequest, ChatResponse, Config, FinishReason, RetryConfig, ToolChoice, Usage};
pub use protocol::{ClientRequest, ClientResponse, ErrorKind};
pub use tools::{Function, FunctionCall, Parameters, Property, Tool, ToolCall};
