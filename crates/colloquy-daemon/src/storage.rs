//! Conversation storage and persistence.
//!
//! Conversations are stored as JSON files in `~/.local/share/colloquy/conversations/`.
//! Each conversation is saved to `<uuid>.json`.
//!
//! ## File Layout
//!
//! ```text
//! ~/.local/share/colloquy/
//! ├── conversations/
//! │   ├── abc12345-6789-....json
//! │   └── def67890-abcd-....json
//! ├── colloquy.sock        (Unix domain socket)
//! └── colloquy.pid
//! ```

use std::fs;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use colloquy_common::chat::Conversation;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DaemonError, Result};

/// Manages conversation storage on disk.
pub struct Storage {
    /// Conversations directory
    conversations_dir: PathBuf,

    /// Socket file path
    socket_path: PathBuf,

    /// PID file path
    pid_file: PathBuf,
}

impl Storage {
    /// Creates a new storage manager.
    ///
    /// Initializes the storage directory structure if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be determined or
    /// directory creation fails.
    pub fn new() -> Result<Self> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| DaemonError::Storage("failed to determine data directory".to_string()))?
            .join("colloquy");

        let conversations_dir = data_dir.join("conversations");
        let socket_path = data_dir.join("colloquy.sock");
        let pid_file = data_dir.join("colloquy.pid");

        // Owner-only: conversations may contain sensitive content
        fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(&conversations_dir)
            .map_err(|e| {
                DaemonError::Storage(format!("failed to create conversations directory: {e}"))
            })?;

        fs::set_permissions(&data_dir, fs::Permissions::from_mode(0o700)).map_err(|e| {
            DaemonError::Storage(format!("failed to set data directory permissions: {e}"))
        })?;

        Ok(Self {
            conversations_dir,
            socket_path,
            pid_file,
        })
    }

    /// Runs a synchronous closure on the blocking thread pool.
    ///
    /// All async callers should use this to avoid blocking tokio worker
    /// threads with file I/O.
    ///
    /// # Errors
    ///
    /// Returns an error if the blocking task panics or the closure fails.
    pub async fn run<F, T>(self: &Arc<Self>, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let this = Arc::clone(self);
        tokio::task::spawn_blocking(move || f(&this))
            .await
            .map_err(|e| DaemonError::Storage(format!("task join error: {e}")))?
    }

    /// Returns the socket path for the Unix domain socket.
    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Writes the daemon PID to the PID file.
    ///
    /// # Errors
    ///
    /// Returns an error if file writing fails.
    pub fn write_pid(&self, pid: u32) -> Result<()> {
        fs::write(&self.pid_file, pid.to_string())?;
        Ok(())
    }

    /// Removes the PID file.
    ///
    /// # Errors
    ///
    /// Returns an error if file deletion fails (unless file doesn't exist).
    pub fn remove_pid(&self) -> Result<()> {
        if self.pid_file.exists() {
            fs::remove_file(&self.pid_file)?;
        }
        Ok(())
    }

    /// Saves a conversation to disk, creating or replacing its file.
    ///
    /// Uses atomic write (write to temp file, then rename) so a crash
    /// mid-write never leaves a truncated conversation behind.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file I/O fails.
    pub fn save_conversation(&self, conversation: &Conversation) -> Result<()> {
        let path = self.conversation_path(conversation.id);
        let json = serde_json::to_string_pretty(conversation)?;

        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &json)?;
        fs::rename(&temp_path, &path)?;

        debug!(
            conversation_id = %conversation.id,
            message_count = conversation.messages.len(),
            "saved conversation"
        );

        Ok(())
    }

    /// Loads a conversation from disk.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::ConversationNotFound`] if the file doesn't
    /// exist, or an error if deserialization fails.
    pub fn load_conversation(&self, id: Uuid) -> Result<Conversation> {
        let path = self.conversation_path(id);

        if !path.exists() {
            return Err(DaemonError::ConversationNotFound(id.to_string()));
        }

        let json = fs::read_to_string(&path)?;
        let conversation: Conversation = serde_json::from_str(&json)?;

        Ok(conversation)
    }

    /// Loads all conversations, most recently updated first.
    ///
    /// Files that fail to parse are skipped with a warning rather than
    /// failing the whole listing.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let mut conversations = Vec::new();

        for entry in fs::read_dir(&self.conversations_dir)? {
            let entry = entry?;
            let path = entry.path();

            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }

            match fs::read_to_string(&path)
                .map_err(DaemonError::from)
                .and_then(|json| Ok(serde_json::from_str::<Conversation>(&json)?))
            {
                Ok(conversation) => conversations.push(conversation),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable conversation file");
                }
            }
        }

        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        Ok(conversations)
    }

    /// Returns the path to a conversation file.
    fn conversation_path(&self, id: Uuid) -> PathBuf {
        self.conversations_dir.join(format!("{id}.json"))
    }

    /// Creates a test storage instance with a temporary directory.
    ///
    /// Only available for testing within the crate.
    #[cfg(test)]
    pub(crate) fn new_test(data_dir: &Path) -> Self {
        let conversations_dir = data_dir.join("conversations");
        fs::create_dir_all(&conversations_dir).ok();

        Self {
            conversations_dir,
            socket_path: data_dir.join("colloquy.sock"),
            pid_file: data_dir.join("colloquy.pid"),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use tempfile::TempDir;

    fn setup_test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new_test(temp_dir.path());
        (storage, temp_dir)
    }

    #[test]
    fn test_save_and_load_conversation() {
        let (storage, _temp) = setup_test_storage();

        let mut conv = Conversation::new();
        conv.set_title("Test Conversation");
        conv.add_message(conv.user_message("hello")).unwrap();
        storage.save_conversation(&conv).unwrap();

        let loaded = storage.load_conversation(conv.id).unwrap();
        assert_eq!(loaded.id, conv.id);
        assert_eq!(loaded.title, "Test Conversation");
        assert_eq!(loaded.messages.len(), 1);
    }

    #[test]
    fn test_load_missing_conversation() {
        let (storage, _temp) = setup_test_storage();
        let err = storage.load_conversation(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, DaemonError::ConversationNotFound(_)));
    }

    #[test]
    fn test_save_replaces_existing_file() {
        let (storage, _temp) = setup_test_storage();

        let mut conv = Conversation::new();
        storage.save_conversation(&conv).unwrap();

        conv.set_title("Renamed");
        storage.save_conversation(&conv).unwrap();

        let loaded = storage.load_conversation(conv.id).unwrap();
        assert_eq!(loaded.title, "Renamed");
    }

    #[test]
    fn test_list_conversations_newest_first() {
        let (storage, _temp) = setup_test_storage();

        let old = Conversation::new();
        storage.save_conversation(&old).unwrap();

        let mut new = Conversation::new();
        new.touch();
        storage.save_conversation(&new).unwrap();

        let listed = storage.list_conversations().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, new.id);
        assert_eq!(listed[1].id, old.id);
    }

    #[test]
    fn test_list_skips_corrupt_files() {
        let (storage, temp) = setup_test_storage();

        let conv = Conversation::new();
        storage.save_conversation(&conv).unwrap();

        fs::write(
            temp.path()
                .join("conversations")
                .join(format!("{}.json", Uuid::new_v4())),
            "not json",
        )
        .unwrap();

        let listed = storage.list_conversations().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, conv.id);
    }

    #[test]
    fn test_pid_file_roundtrip() {
        let (storage, temp) = setup_test_storage();

        storage.write_pid(1234).unwrap();
        let contents = fs::read_to_string(temp.path().join("colloquy.pid")).unwrap();
        assert_eq!(contents, "1234");

        storage.remove_pid().unwrap();
        assert!(!temp.path().join("colloquy.pid").exists());

        // Removing again is a no-op
        storage.remove_pid().unwrap();
    }
}
