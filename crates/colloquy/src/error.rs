use thiserror::Error;

use colloquy_client::ClientError;

/// Errors produced by the reply and title engines.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A reply was requested for a conversation with no messages.
    #[error("conversation has no messages")]
    EmptyConversation,

    /// The provider request failed. Retries for transient failures happen
    /// inside the client; by the time this surfaces, the request is dead.
    #[error("provider request failed: {0}")]
    Provider(#[from] ClientError),

    /// The provider produced a blank title.
    #[error("empty response from provider for title generation")]
    EmptyTitle,

    /// The model kept requesting tools past the iteration limit.
    #[error("too many tool calls, unable to generate reply (limit: {limit})")]
    ToolCallLimitExceeded {
        /// The iteration limit that was hit.
        limit: u32,
    },
}
