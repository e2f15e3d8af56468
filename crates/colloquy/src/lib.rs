//! # colloquy
//!
//! Reply and title generation engines for the colloquy chat backend.
//!
//! [`ReplyEngine`] drives the tool-calling loop: it sends the conversation
//! transcript to the model, executes any tools the model requests, feeds the
//! results back, and repeats until the model answers in plain text or the
//! iteration limit is reached. [`TitleEngine`] makes a single tool-free
//! request to summarize a conversation's opening message into a short title.
//!
//! Both engines are generic over [`colloquy_client::LLMClient`] so tests can
//! drive them with scripted fakes.

pub mod error;
pub mod reply;
pub mod title;

pub use error::EngineError;
pub use reply::{MAX_TOOL_CALL_ITERATIONS, ReplyEngine};
pub use title::{EMPTY_CONVERSATION_TITLE, TitleEngine};
