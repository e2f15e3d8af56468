//! Conversation orchestration.
//!
//! Coordinates the reply and title engines with persistence. Starting a
//! conversation persists it immediately with a placeholder title, then runs
//! title and reply generation concurrently under independent deadlines: the
//! reply is the critical path and its failure aborts the request (leaving
//! the conversation in its initial persisted state), while a title failure
//! of any kind degrades to a deterministic fallback derived from the
//! opening message.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{error, info, instrument};
use uuid::Uuid;

use colloquy::{ReplyEngine, TitleEngine};
use colloquy_client::LLMClient;
use colloquy_common::chat::{Conversation, ConversationSummary};

use crate::error::{DaemonError, Result};
use crate::storage::Storage;

/// Title used when the opening message yields no usable fallback.
const GENERIC_TITLE: &str = "New conversation";

/// Prefixes stripped from the opening message when deriving a fallback
/// title. Matched case-insensitively; only the first match is removed.
const FALLBACK_PREFIXES: &[&str] = &[
    "what is", "what's", "how do", "how to", "can you", "please", "tell me",
];

/// Maximum fallback title length before the ellipsis is appended.
const FALLBACK_TITLE_LIMIT: usize = 50;

/// The outcome of starting a conversation.
#[derive(Debug)]
pub struct StartedConversation {
    /// Id of the new conversation.
    pub conversation_id: Uuid,
    /// The resolved title (generated or fallback).
    pub title: String,
    /// The assistant's reply to the opening message.
    pub reply: String,
}

/// Coordinates engines and storage for the conversation operations.
pub struct Orchestrator<C> {
    reply_engine: Arc<ReplyEngine<C>>,
    title_engine: Arc<TitleEngine<C>>,
    storage: Arc<Storage>,
    reply_timeout: Duration,
    title_timeout: Duration,
    /// One lock per conversation so concurrent continues on the same
    /// conversation are serialized instead of losing each other's writes.
    turn_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl<C: LLMClient + 'static> Orchestrator<C> {
    /// Creates an orchestrator over the given engines and storage.
    pub fn new(
        reply_engine: ReplyEngine<C>,
        title_engine: TitleEngine<C>,
        storage: Arc<Storage>,
        reply_timeout: Duration,
        title_timeout: Duration,
    ) -> Self {
        Self {
            reply_engine: Arc::new(reply_engine),
            title_engine: Arc::new(title_engine),
            storage,
            reply_timeout,
            title_timeout,
            turn_locks: DashMap::new(),
        }
    }

    /// Starts a new conversation with an opening user message.
    ///
    /// The conversation is persisted with a placeholder title before any
    /// model call. Title and reply generation then run concurrently; the
    /// assistant message and final title are persisted together once the
    /// reply arrives.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::RequiredArgument`] if the message is empty or
    /// whitespace, and propagates reply-path failures. There is no rollback:
    /// on reply failure the conversation remains persisted in its initial
    /// state.
    #[instrument(skip_all)]
    pub async fn start_conversation(&self, message: &str) -> Result<StartedConversation> {
        if message.trim().is_empty() {
            return Err(DaemonError::RequiredArgument("message"));
        }

        let mut conversation = Conversation::new();
        conversation.add_message(conversation.user_message(message))?;

        // Persist early so the conversation survives a failed reply
        let initial = conversation.clone();
        self.storage
            .run(move |s| s.save_conversation(&initial))
            .await?;

        info!(conversation_id = %conversation.id, "started conversation");

        let title_handle = {
            let engine = Arc::clone(&self.title_engine);
            let snapshot = conversation.clone();
            let fallback = fallback_title(message);
            let deadline = self.title_timeout;
            tokio::spawn(async move {
                match tokio::time::timeout(deadline, engine.generate_title(&snapshot)).await {
                    Ok(Ok(title)) => title,
                    Ok(Err(e)) => {
                        error!(conversation_id = %snapshot.id, error = %e, "title generation failed, using fallback");
                        fallback
                    }
                    Err(_) => {
                        error!(conversation_id = %snapshot.id, "title generation timed out, using fallback");
                        fallback
                    }
                }
            })
        };

        let reply_handle = {
            let engine = Arc::clone(&self.reply_engine);
            let snapshot = conversation.clone();
            let deadline = self.reply_timeout;
            tokio::spawn(async move {
                match tokio::time::timeout(deadline, engine.generate_reply(&snapshot)).await {
                    Ok(result) => result.map_err(DaemonError::from),
                    Err(_) => Err(DaemonError::ReplyTimeout(deadline.as_secs())),
                }
            })
        };

        // The reply is the critical path; its failure aborts the request
        // and cancels the still-pending title work.
        let reply_message = match reply_handle.await {
            Ok(Ok(message)) => message,
            Ok(Err(e)) => {
                title_handle.abort();
                return Err(e);
            }
            Err(e) => {
                title_handle.abort();
                return Err(DaemonError::Other(format!("reply task failed: {e}")));
            }
        };

        let title = title_handle
            .await
            .map_err(|e| DaemonError::Other(format!("title task failed: {e}")))?;

        let reply = reply_message.content.clone();
        conversation.add_message(reply_message)?;
        conversation.set_title(title.clone());

        let updated = conversation.clone();
        self.storage
            .run(move |s| s.save_conversation(&updated))
            .await?;

        Ok(StartedConversation {
            conversation_id: conversation.id,
            title,
            reply,
        })
    }

    /// Continues an existing conversation with a new user message.
    ///
    /// The reply is generated synchronously; the user and assistant
    /// messages are persisted together only after the reply succeeds, so a
    /// failed turn leaves the conversation untouched.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::RequiredArgument`] if either input is empty,
    /// [`DaemonError::ConversationNotFound`] if the id is malformed or
    /// unknown, and propagates reply failures.
    #[instrument(skip_all, fields(conversation_id = %conversation_id))]
    pub async fn continue_conversation(
        &self,
        conversation_id: &str,
        message: &str,
    ) -> Result<String> {
        if conversation_id.is_empty() {
            return Err(DaemonError::RequiredArgument("conversation_id"));
        }
        if message.trim().is_empty() {
            return Err(DaemonError::RequiredArgument("message"));
        }

        let id = parse_conversation_id(conversation_id)?;

        // Serialize turns per conversation; the lock spans load through save
        let lock = self.turn_lock(id);
        let _guard = lock.lock().await;

        let mut conversation = self.storage.run(move |s| s.load_conversation(id)).await?;

        conversation.add_message(conversation.user_message(message))?;

        // Unlike start, no deadline of its own: the turn runs for as long
        // as the reply takes.
        let reply_message = self.reply_engine.generate_reply(&conversation).await?;

        let reply = reply_message.content.clone();
        conversation.add_message(reply_message)?;

        self.storage
            .run(move |s| s.save_conversation(&conversation))
            .await?;

        Ok(reply)
    }

    /// Lists all conversations as summaries, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        let conversations = self.storage.run(Storage::list_conversations).await?;
        Ok(conversations.iter().map(Conversation::summary).collect())
    }

    /// Fetches a single conversation with its full message history.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::RequiredArgument`] if the id is empty, or
    /// [`DaemonError::ConversationNotFound`] if it is malformed or unknown.
    pub async fn describe_conversation(&self, conversation_id: &str) -> Result<Conversation> {
        if conversation_id.is_empty() {
            return Err(DaemonError::RequiredArgument("conversation_id"));
        }

        let id = parse_conversation_id(conversation_id)?;
        self.storage.run(move |s| s.load_conversation(id)).await
    }

    fn turn_lock(&self, id: Uuid) -> Arc<Mutex<()>> {
        self.turn_locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// A malformed id cannot name any conversation, so it reads as not found
/// rather than as an invalid argument.
fn parse_conversation_id(conversation_id: &str) -> Result<Uuid> {
    Uuid::parse_str(conversation_id)
        .map_err(|_| DaemonError::ConversationNotFound(conversation_id.to_string()))
}

/// Derives a title from the opening message when generation fails.
fn fallback_title(message: &str) -> String {
    let mut title = message.trim().replace('\n', " ");

    for prefix in FALLBACK_PREFIXES {
        if title
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        {
            title = title[prefix.len()..].trim().to_string();
            break;
        }
    }

    let mut title = title
        .trim_matches(|c| matches!(c, '?' | '!' | '.' | ',' | ':' | ';'))
        .to_string();

    if title.chars().count() > FALLBACK_TITLE_LIMIT {
        title = title.chars().take(FALLBACK_TITLE_LIMIT).collect::<String>() + "...";
    }

    if title.trim().chars().count() < 3 {
        return GENERIC_TITLE.to_string();
    }

    title
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]
    #![allow(clippy::unreachable)]

    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use chrono::Utc;
    use colloquy_client::ClientError;
    use colloquy_common::chat::{Message, MessageRole};
    use colloquy_common::client::{ChatRequest, ChatResponse, Config};
    use colloquy_tools::{CalculatorTool, ToolExecutor, ToolRegistry};
    use tempfile::TempDir;

    use super::*;

    /// One scripted step for the fake provider.
    enum Step {
        Text(String),
        Slow(String),
        Fail,
        Hang,
    }

    /// Routes requests to separate reply and title scripts. Reply requests
    /// carry tools, title requests never do, which makes the two
    /// distinguishable even though they run concurrently.
    struct RoutedClient {
        config: Config,
        reply_script: StdMutex<VecDeque<Step>>,
        title_script: StdMutex<VecDeque<Step>>,
    }

    impl RoutedClient {
        fn new(reply: Vec<Step>, title: Vec<Step>) -> Self {
            Self {
                config: Config::new("scripted", "scripted-model"),
                reply_script: StdMutex::new(reply.into()),
                title_script: StdMutex::new(title.into()),
            }
        }
    }

    #[async_trait]
    impl LLMClient for RoutedClient {
        fn config(&self) -> &Config {
            &self.config
        }

        // The crate-local Result alias shadows the prelude here, so the
        // trait signature must be spelled out in full.
        async fn chat(
            &self,
            request: &ChatRequest,
        ) -> std::result::Result<ChatResponse, ClientError> {
            let script = if request.has_tools() {
                &self.reply_script
            } else {
                &self.title_script
            };

            let step = script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| panic!("scripted client ran out of responses"));

            let text_response = |content| {
                Ok(ChatResponse {
                    message: Message::new(Uuid::nil(), MessageRole::Assistant, content),
                    model: "scripted-model".to_string(),
                    usage: None,
                    finish_reason: None,
                    created_at: Utc::now(),
                    response_id: None,
                })
            };

            match step {
                Step::Text(content) => text_response(content),
                Step::Slow(content) => {
                    tokio::time::sleep(Duration::from_millis(150)).await;
                    text_response(content)
                }
                Step::Fail => Err(ClientError::ServiceUnavailable("scripted outage".to_string())),
                Step::Hang => {
                    futures::future::pending::<()>().await;
                    unreachable!()
                }
            }
        }
    }

    fn orchestrator(
        reply: Vec<Step>,
        title: Vec<Step>,
    ) -> (Orchestrator<RoutedClient>, Arc<Storage>, TempDir) {
        let temp = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new_test(temp.path()));

        let client = Arc::new(RoutedClient::new(reply, title));
        let registry = ToolRegistry::new();
        registry.register(Arc::new(CalculatorTool));

        let orchestrator = Orchestrator::new(
            ReplyEngine::new(Arc::clone(&client), ToolExecutor::new(registry)),
            TitleEngine::new(client),
            Arc::clone(&storage),
            Duration::from_secs(5),
            Duration::from_millis(200),
        );

        (orchestrator, storage, temp)
    }

    fn text(content: &str) -> Step {
        Step::Text(content.to_string())
    }

    #[tokio::test]
    async fn test_start_conversation() {
        let (orchestrator, storage, _temp) = orchestrator(
            vec![text("Sunny and 24°C.")],
            vec![text("Barcelona Weather")],
        );

        let started = orchestrator
            .start_conversation("What is the weather in Barcelona?")
            .await
            .unwrap();

        assert_eq!(started.title, "Barcelona Weather");
        assert_eq!(started.reply, "Sunny and 24°C.");

        let stored = storage.load_conversation(started.conversation_id).unwrap();
        assert_eq!(stored.title, "Barcelona Weather");
        assert_eq!(stored.messages.len(), 2);
        assert_eq!(stored.messages[0].role, MessageRole::User);
        assert_eq!(stored.messages[1].role, MessageRole::Assistant);
        assert_eq!(stored.messages[1].content, "Sunny and 24°C.");
    }

    #[tokio::test]
    async fn test_start_rejects_blank_message_before_persisting() {
        let (orchestrator, storage, _temp) = orchestrator(vec![], vec![]);

        let err = orchestrator.start_conversation("   \n ").await.unwrap_err();
        assert!(matches!(err, DaemonError::RequiredArgument("message")));
        assert!(storage.list_conversations().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_start_reply_failure_keeps_initial_state() {
        let (orchestrator, storage, _temp) =
            orchestrator(vec![Step::Fail], vec![text("Unused Title")]);

        let err = orchestrator
            .start_conversation("hello there")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DaemonError::Engine(colloquy::EngineError::Provider(_))
        ));

        // The conversation survives with the placeholder title and only
        // the opening message.
        let stored = storage.list_conversations().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].title, colloquy_common::UNTITLED_TITLE);
        assert_eq!(stored[0].messages.len(), 1);
    }

    #[tokio::test]
    async fn test_start_title_failure_uses_fallback() {
        let (orchestrator, _storage, _temp) =
            orchestrator(vec![text("It's sunny.")], vec![Step::Fail]);

        let started = orchestrator
            .start_conversation("What is the weather like in Barcelona?")
            .await
            .unwrap();

        assert_eq!(started.title, "the weather like in Barcelona");
        assert_eq!(started.reply, "It's sunny.");
    }

    #[tokio::test]
    async fn test_start_title_timeout_uses_fallback() {
        let (orchestrator, storage, _temp) =
            orchestrator(vec![text("Done.")], vec![Step::Hang]);

        let started = orchestrator
            .start_conversation("Tell me about Rust lifetimes")
            .await
            .unwrap();

        assert_eq!(started.title, "about Rust lifetimes");
        let stored = storage.load_conversation(started.conversation_id).unwrap();
        assert_eq!(stored.title, "about Rust lifetimes");
    }

    #[tokio::test]
    async fn test_continue_conversation() {
        let (orchestrator, storage, _temp) = orchestrator(
            vec![text("First reply"), text("Second reply")],
            vec![text("A Title")],
        );

        let started = orchestrator.start_conversation("hello").await.unwrap();

        let reply = orchestrator
            .continue_conversation(&started.conversation_id.to_string(), "and again")
            .await
            .unwrap();
        assert_eq!(reply, "Second reply");

        let stored = storage.load_conversation(started.conversation_id).unwrap();
        assert_eq!(stored.messages.len(), 4);
        assert_eq!(stored.messages[2].content, "and again");
        assert_eq!(stored.messages[3].content, "Second reply");
    }

    #[tokio::test]
    async fn test_continue_validates_arguments() {
        let (orchestrator, _storage, _temp) = orchestrator(vec![], vec![]);

        let err = orchestrator
            .continue_conversation("", "hello")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DaemonError::RequiredArgument("conversation_id")
        ));

        let err = orchestrator
            .continue_conversation(&Uuid::new_v4().to_string(), "  ")
            .await
            .unwrap_err();
        assert!(matches!(err, DaemonError::RequiredArgument("message")));
    }

    #[tokio::test]
    async fn test_continue_unknown_and_malformed_ids_are_not_found() {
        let (orchestrator, _storage, _temp) = orchestrator(vec![], vec![]);

        let err = orchestrator
            .continue_conversation(&Uuid::new_v4().to_string(), "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, DaemonError::ConversationNotFound(_)));

        let err = orchestrator
            .continue_conversation("not-a-uuid", "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, DaemonError::ConversationNotFound(_)));
    }

    #[tokio::test]
    async fn test_continue_failure_leaves_conversation_untouched() {
        let (orchestrator, storage, _temp) =
            orchestrator(vec![text("First reply"), Step::Fail], vec![text("A Title")]);

        let started = orchestrator.start_conversation("hello").await.unwrap();

        let err = orchestrator
            .continue_conversation(&started.conversation_id.to_string(), "again")
            .await
            .unwrap_err();
        assert!(matches!(err, DaemonError::Engine(_)));

        // Neither the user message nor any reply was persisted
        let stored = storage.load_conversation(started.conversation_id).unwrap();
        assert_eq!(stored.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_continue_reply_outlives_start_deadline() {
        // The reply deadline applies to starting a conversation only; a
        // continued turn is allowed to run longer.
        let temp = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new_test(temp.path()));

        let client = Arc::new(RoutedClient::new(
            vec![Step::Slow("Worth the wait.".to_string())],
            vec![],
        ));
        let registry = ToolRegistry::new();
        registry.register(Arc::new(CalculatorTool));

        let orchestrator = Orchestrator::new(
            ReplyEngine::new(Arc::clone(&client), ToolExecutor::new(registry)),
            TitleEngine::new(client),
            Arc::clone(&storage),
            Duration::from_millis(50),
            Duration::from_millis(50),
        );

        let mut conversation = Conversation::new();
        conversation
            .add_message(conversation.user_message("hello"))
            .unwrap();
        conversation
            .add_message(conversation.assistant_message("hi"))
            .unwrap();
        storage.save_conversation(&conversation).unwrap();

        let reply = orchestrator
            .continue_conversation(&conversation.id.to_string(), "take your time")
            .await
            .unwrap();
        assert_eq!(reply, "Worth the wait.");

        let stored = storage.load_conversation(conversation.id).unwrap();
        assert_eq!(stored.messages.len(), 4);
    }

    #[tokio::test]
    async fn test_list_and_describe() {
        let (orchestrator, _storage, _temp) = orchestrator(
            vec![text("reply one"), text("reply two")],
            vec![text("Title One"), text("Title Two")],
        );

        let first = orchestrator.start_conversation("first topic").await.unwrap();
        let second = orchestrator
            .start_conversation("second topic")
            .await
            .unwrap();

        let summaries = orchestrator.list_conversations().await.unwrap();
        assert_eq!(summaries.len(), 2);
        // Newest-updated first
        assert_eq!(summaries[0].id, second.conversation_id);
        assert_eq!(summaries[0].message_count, 2);

        let full = orchestrator
            .describe_conversation(&first.conversation_id.to_string())
            .await
            .unwrap();
        assert_eq!(full.messages.len(), 2);

        let err = orchestrator.describe_conversation("").await.unwrap_err();
        assert!(matches!(
            err,
            DaemonError::RequiredArgument("conversation_id")
        ));
    }

    #[test]
    fn test_fallback_title_strips_prefix_and_punctuation() {
        assert_eq!(
            fallback_title("What is the weather like in Barcelona?"),
            "the weather like in Barcelona"
        );
        assert_eq!(fallback_title("Please explain monads."), "explain monads");
        assert_eq!(
            fallback_title("how do I exit vim?!"),
            "I exit vim"
        );
    }

    #[test]
    fn test_fallback_title_strips_only_first_prefix() {
        assert_eq!(
            fallback_title("Can you please help me?"),
            "please help me"
        );
    }

    #[test]
    fn test_fallback_title_truncates_with_ellipsis() {
        let long = "a".repeat(80);
        let title = fallback_title(&long);
        assert_eq!(title.chars().count(), FALLBACK_TITLE_LIMIT + 3);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn test_fallback_title_generic_when_too_short() {
        assert_eq!(fallback_title("hi"), GENERIC_TITLE);
        assert_eq!(fallback_title("what is it?"), GENERIC_TITLE);
        assert_eq!(fallback_title("   "), GENERIC_TITLE);
    }

    #[test]
    fn test_fallback_title_flattens_newlines() {
        assert_eq!(fallback_title("rust\nlifetimes"), "rust lifetimes");
    }
}
