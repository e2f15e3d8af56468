//! Wire protocol for daemon/client communication.
//!
//! Requests and responses are serialized as single-line JSON over a Unix
//! domain socket, one message per line.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chat::{Conversation, ConversationSummary};

/// A request sent from a client to the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ClientRequest {
    /// Start a new conversation with an opening user message.
    StartConversation {
        /// The user's opening message.
        message: String,
    },
    /// Continue an existing conversation.
    ContinueConversation {
        /// The conversation to continue. Opaque id string; anything that is
        /// not a valid id is reported as not found.
        conversation_id: String,
        /// The user's next message.
        message: String,
    },
    /// List all conversations, titles and metadata only.
    ListConversations,
    /// Fetch a single conversation with its full message history.
    DescribeConversation {
        /// The conversation to fetch.
        conversation_id: String,
    },
    /// Liveness check.
    Ping,
    /// Ask the daemon to shut down gracefully.
    Shutdown,
}

/// A response sent from the daemon to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClientResponse {
    /// A conversation was started.
    ConversationStarted {
        /// Id of the newly created conversation.
        conversation_id: Uuid,
        /// The resolved title (generated or fallback).
        title: String,
        /// The assistant's reply to the opening message.
        reply: String,
    },
    /// A reply to a continued conversation.
    Reply {
        /// The assistant's reply.
        reply: String,
    },
    /// All known conversations, messages stripped.
    Conversations {
        /// Summaries ordered newest-updated first.
        conversations: Vec<ConversationSummary>,
    },
    /// A full conversation record.
    Conversation {
        /// The conversation including its messages.
        conversation: Conversation,
    },
    /// Answer to a ping.
    Pong,
    /// The daemon acknowledged a shutdown request.
    ShuttingDown,
    /// The request failed.
    Error {
        /// Which of the closed set of status categories applies.
        kind: ErrorKind,
        /// Human-readable detail.
        message: String,
    },
}

/// The closed set of error categories exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A required input was empty or malformed.
    InvalidArgument,
    /// The referenced conversation does not exist.
    NotFound,
    /// Anything else: provider failures, persistence failures, internal bugs.
    Internal,
}
