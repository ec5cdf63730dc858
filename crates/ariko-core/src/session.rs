//! Session Management
//!
//! Chat sessions, the bounded history that owns them, and history
//! persistence.
//!
//! History is ordered most-recent-first. The active session always resolves
//! to a member of the history; when the history would become empty a fresh
//! session is created in the same call.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::message::{ChatMessage, Role};

/// Name given to a session before it has any user message
pub const PLACEHOLDER_NAME: &str = "New Chat";

const NAME_MAX_CHARS: usize = 60;
const NAME_MAX_WORDS: usize = 6;

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a session's current name came from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameSource {
    /// Still the placeholder; the next user message names the session
    #[default]
    Placeholder,
    /// Derived from the first user message
    FirstMessage,
    /// Chosen by the user; never overwritten
    User,
}

/// One conversation thread
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: SessionId,
    pub name: String,
    #[serde(default)]
    pub name_source: NameSource,
    #[serde(default)]
    messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    /// Create an empty session with the placeholder name
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            name: PLACEHOLDER_NAME.into(),
            name_source: NameSource::Placeholder,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append a message, naming the session from its first user message.
    ///
    /// Returns `true` when the name changed.
    fn append(&mut self, message: ChatMessage) -> bool {
        let mut renamed = false;
        if self.name_source == NameSource::Placeholder
            && message.role == Role::User
            && !message.is_observation()
        {
            let name = derive_session_name(&message.content);
            if !name.is_empty() {
                self.name = name;
                self.name_source = NameSource::FirstMessage;
                renamed = true;
            }
        }
        self.messages.push(message);
        self.touch();
        renamed
    }

    fn rename(&mut self, name: &str) {
        self.name = name.to_string();
        self.name_source = NameSource::User;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Session name from a user message: the first six words of its first 60
/// characters, each capitalized
pub fn derive_session_name(text: &str) -> String {
    let head: String = text.trim().chars().take(NAME_MAX_CHARS).collect();
    head.split_whitespace()
        .take(NAME_MAX_WORDS)
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// State change a caller should react to after a store operation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionSignal {
    /// The transcript now shows an empty session
    Cleared,
    /// The transcript must be redrawn from the active session
    Reloaded,
    /// The session list changed (membership, order or names)
    HistoryChanged,
}

/// Load/save boundary for session history
pub trait HistoryPersistence: Send + Sync {
    /// Stored sessions, most recent first. Absence is an empty list.
    fn load(&self) -> Result<Vec<ChatSession>>;

    fn save(&self, sessions: &[ChatSession]) -> Result<()>;
}

/// History stored as a JSON array in one file
pub struct JsonHistoryFile {
    path: PathBuf,
}

impl JsonHistoryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl HistoryPersistence for JsonHistoryFile {
    fn load(&self) -> Result<Vec<ChatSession>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    /// Write to a sibling temp file, then rename over the target
    fn save(&self, sessions: &[ChatSession]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(sessions)?;
        let tmp = self.temp_path();
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            AgentError::Persistence(format!("rename to {}: {e}", self.path.display()))
        })
    }
}

/// In-memory history (for development/testing)
#[derive(Default)]
pub struct MemoryHistory {
    sessions: RwLock<Vec<ChatSession>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sessions(sessions: Vec<ChatSession>) -> Self {
        Self {
            sessions: RwLock::new(sessions),
        }
    }

    /// Sessions as last saved
    pub fn snapshot(&self) -> Vec<ChatSession> {
        self.sessions
            .read()
            .map(|sessions| sessions.clone())
            .unwrap_or_default()
    }
}

impl HistoryPersistence for MemoryHistory {
    fn load(&self) -> Result<Vec<ChatSession>> {
        self.sessions
            .read()
            .map(|sessions| sessions.clone())
            .map_err(|e| AgentError::Persistence(e.to_string()))
    }

    fn save(&self, sessions: &[ChatSession]) -> Result<()> {
        let mut stored = self
            .sessions
            .write()
            .map_err(|e| AgentError::Persistence(e.to_string()))?;
        *stored = sessions.to_vec();
        Ok(())
    }
}

/// Ordered chat sessions plus the active pointer
pub struct SessionStore {
    history: Vec<ChatSession>,
    active: usize,
    max_history_size: usize,
    persistence: Option<Arc<dyn HistoryPersistence>>,
}

impl SessionStore {
    /// In-memory store holding one fresh session. `0` means unbounded.
    pub fn new(max_history_size: usize) -> Self {
        Self {
            history: vec![ChatSession::new()],
            active: 0,
            max_history_size,
            persistence: None,
        }
    }

    /// Store backed by `persistence`; load failures start an empty history
    pub fn with_persistence(
        max_history_size: usize,
        persistence: Arc<dyn HistoryPersistence>,
    ) -> Self {
        let history = match persistence.load() {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!("Could not load chat history, starting fresh: {}", e);
                Vec::new()
            }
        };
        tracing::info!(sessions = history.len(), "Chat history loaded");

        let mut store = Self {
            history,
            active: 0,
            max_history_size,
            persistence: Some(persistence),
        };
        if store.history.is_empty() {
            store.history.push(ChatSession::new());
        }
        store.evict();
        store
    }

    pub fn active(&self) -> &ChatSession {
        &self.history[self.active]
    }

    pub fn active_id(&self) -> &SessionId {
        &self.active().id
    }

    /// Sessions, most recent first
    pub fn history(&self) -> &[ChatSession] {
        &self.history
    }

    pub fn get(&self, id: &SessionId) -> Option<&ChatSession> {
        self.position(id).map(|i| &self.history[i])
    }

    pub const fn max_history_size(&self) -> usize {
        self.max_history_size
    }

    /// Change the bound, evicting immediately if it shrank
    pub fn set_max_history_size(&mut self, max_history_size: usize) -> Vec<SessionSignal> {
        self.max_history_size = max_history_size;
        if self.evict() {
            self.persist();
            vec![SessionSignal::HistoryChanged]
        } else {
            Vec::new()
        }
    }

    /// Append to the active session
    pub fn append_message(&mut self, message: ChatMessage) -> Vec<SessionSignal> {
        let renamed = self.history[self.active].append(message);
        self.persist();
        if renamed {
            vec![SessionSignal::HistoryChanged]
        } else {
            Vec::new()
        }
    }

    /// Start a new session at the front of the history.
    ///
    /// An empty active session is reused instead of stacking another one.
    pub fn new_session(&mut self) -> Vec<SessionSignal> {
        if self.active().is_empty() {
            return vec![SessionSignal::Cleared];
        }

        self.history.insert(0, ChatSession::new());
        self.active = 0;
        self.evict();
        self.persist();
        tracing::info!(session = %self.active_id(), "New chat session");
        vec![SessionSignal::Cleared, SessionSignal::HistoryChanged]
    }

    /// Make `id` the active session; no-op if already active or unknown
    pub fn switch_to(&mut self, id: &SessionId) -> Vec<SessionSignal> {
        match self.position(id) {
            Some(index) if index != self.active => {
                self.active = index;
                tracing::info!(session = %id, "Switched chat session");
                vec![SessionSignal::Reloaded, SessionSignal::HistoryChanged]
            }
            _ => Vec::new(),
        }
    }

    /// Remove a session; deleting the active one moves to the new head
    pub fn delete(&mut self, id: &SessionId) -> Vec<SessionSignal> {
        let Some(index) = self.position(id) else {
            return Vec::new();
        };

        self.history.remove(index);
        tracing::info!(session = %id, "Deleted chat session");

        let signals = if self.history.is_empty() {
            self.history.push(ChatSession::new());
            self.active = 0;
            vec![SessionSignal::Cleared, SessionSignal::HistoryChanged]
        } else if index == self.active {
            self.active = 0;
            vec![SessionSignal::Reloaded, SessionSignal::HistoryChanged]
        } else {
            if index < self.active {
                self.active -= 1;
            }
            vec![SessionSignal::HistoryChanged]
        };

        self.persist();
        signals
    }

    /// Drop every session and start over with a fresh one
    pub fn clear_all(&mut self) -> Vec<SessionSignal> {
        self.history.clear();
        self.history.push(ChatSession::new());
        self.active = 0;
        self.persist();
        tracing::info!("Chat history cleared");
        vec![SessionSignal::Cleared, SessionSignal::HistoryChanged]
    }

    /// Give a session a user-chosen name that auto-naming never overrides
    pub fn rename(&mut self, id: &SessionId, name: &str) -> Vec<SessionSignal> {
        let name = name.trim();
        if name.is_empty() {
            return Vec::new();
        }
        let Some(index) = self.position(id) else {
            return Vec::new();
        };

        self.history[index].rename(name);
        self.persist();
        vec![SessionSignal::HistoryChanged]
    }

    fn position(&self, id: &SessionId) -> Option<usize> {
        self.history.iter().position(|s| &s.id == id)
    }

    /// Drop the oldest non-active sessions beyond the bound
    fn evict(&mut self) -> bool {
        if self.max_history_size == 0 {
            return false;
        }

        let mut evicted = false;
        while self.history.len() > self.max_history_size {
            let Some(oldest) = (0..self.history.len()).rev().find(|&i| i != self.active) else {
                break;
            };
            let session = self.history.remove(oldest);
            if oldest < self.active {
                self.active -= 1;
            }
            tracing::debug!(session = %session.id, "Evicted chat session");
            evicted = true;
        }
        evicted
    }

    fn persist(&self) {
        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.save(&self.history) {
                tracing::warn!("Could not save chat history: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_sessions(max: usize, count: usize) -> SessionStore {
        let mut store = SessionStore::new(max);
        for i in 0..count {
            if i > 0 {
                store.new_session();
            }
            store.append_message(ChatMessage::user(format!("question {i}")));
        }
        store
    }

    #[test]
    fn test_session_naming_from_first_user_message() {
        let mut store = SessionStore::new(0);
        assert_eq!(store.active().name, PLACEHOLDER_NAME);

        let signals = store.append_message(ChatMessage::user(
            "how do i make the player jump higher when holding space",
        ));
        assert_eq!(signals, [SessionSignal::HistoryChanged]);
        assert_eq!(store.active().name, "How Do I Make The Player");

        store.append_message(ChatMessage::user("something else entirely"));
        assert_eq!(store.active().name, "How Do I Make The Player");
    }

    #[test]
    fn test_derive_name_limits() {
        let long_word = "x".repeat(80);
        assert_eq!(derive_session_name(&long_word).chars().count(), NAME_MAX_CHARS);
        assert_eq!(derive_session_name("  fix   the  bug "), "Fix The Bug");
        assert_eq!(derive_session_name("   "), "");
    }

    #[test]
    fn test_user_rename_is_kept() {
        let mut store = SessionStore::new(0);
        let id = store.active_id().clone();
        store.rename(&id, "Physics");
        store.append_message(ChatMessage::user("why does my rigidbody fall through"));

        assert_eq!(store.active().name, "Physics");
        assert_eq!(store.active().name_source, NameSource::User);
        assert!(store.rename(&id, "  ").is_empty());
    }

    #[test]
    fn test_observation_does_not_name_session() {
        let mut store = SessionStore::new(0);
        store.append_message(ChatMessage::observation("file content"));
        assert_eq!(store.active().name, PLACEHOLDER_NAME);
    }

    #[test]
    fn test_new_session_reuses_empty_active() {
        let mut store = SessionStore::new(0);
        assert_eq!(store.new_session(), [SessionSignal::Cleared]);
        assert_eq!(store.history().len(), 1);

        store.append_message(ChatMessage::user("hi"));
        assert_eq!(
            store.new_session(),
            [SessionSignal::Cleared, SessionSignal::HistoryChanged]
        );
        assert_eq!(store.history().len(), 2);
        assert!(store.active().is_empty());
        assert_eq!(store.active_id(), &store.history()[0].id);
    }

    #[test]
    fn test_bounded_history_evicts_oldest() {
        let store = store_with_sessions(5, 7);
        assert_eq!(store.history().len(), 5);
        assert_eq!(store.active().messages()[0].content, "question 6");
        let oldest = store.history().last().unwrap();
        assert_eq!(oldest.messages()[0].content, "question 2");
    }

    #[test]
    fn test_eviction_never_drops_active() {
        let mut store = store_with_sessions(5, 5);
        let oldest = store.history()[4].id.clone();
        store.switch_to(&oldest);

        store.set_max_history_size(2);
        assert_eq!(store.history().len(), 2);
        assert_eq!(store.active_id(), &oldest);
        assert!(store.get(&oldest).is_some());
    }

    #[test]
    fn test_unbounded_history() {
        let store = store_with_sessions(0, 8);
        assert_eq!(store.history().len(), 8);
    }

    #[test]
    fn test_switch_to() {
        let mut store = store_with_sessions(0, 2);
        let older = store.history()[1].id.clone();
        let current = store.active_id().clone();

        assert!(store.switch_to(&current).is_empty());
        assert!(store.switch_to(&SessionId::new()).is_empty());
        assert_eq!(
            store.switch_to(&older),
            [SessionSignal::Reloaded, SessionSignal::HistoryChanged]
        );
        assert_eq!(store.active_id(), &older);
    }

    #[test]
    fn test_delete_active_moves_to_head() {
        let mut store = store_with_sessions(0, 3);
        let head = store.history()[0].id.clone();
        let middle = store.history()[1].id.clone();
        store.switch_to(&middle);

        let signals = store.delete(&middle);
        assert_eq!(signals, [SessionSignal::Reloaded, SessionSignal::HistoryChanged]);
        assert_eq!(store.active_id(), &head);
        assert_eq!(store.history().len(), 2);
    }

    #[test]
    fn test_delete_keeps_active_pointer() {
        let mut store = store_with_sessions(0, 3);
        let last = store.history()[2].id.clone();
        store.switch_to(&last);
        let head = store.history()[0].id.clone();

        assert_eq!(store.delete(&head), [SessionSignal::HistoryChanged]);
        assert_eq!(store.active_id(), &last);
    }

    #[test]
    fn test_delete_last_session_creates_fresh() {
        let mut store = store_with_sessions(0, 1);
        let only = store.active_id().clone();

        let signals = store.delete(&only);
        assert_eq!(signals, [SessionSignal::Cleared, SessionSignal::HistoryChanged]);
        assert_eq!(store.history().len(), 1);
        assert_ne!(store.active_id(), &only);
        assert!(store.active().is_empty());
    }

    #[test]
    fn test_clear_all() {
        let mut store = store_with_sessions(0, 4);
        let signals = store.clear_all();
        assert_eq!(signals, [SessionSignal::Cleared, SessionSignal::HistoryChanged]);
        assert_eq!(store.history().len(), 1);
        assert!(store.active().is_empty());
    }

    #[test]
    fn test_persistence_saves_every_mutation() {
        let memory = Arc::new(MemoryHistory::new());
        let mut store = SessionStore::with_persistence(0, memory.clone());
        store.append_message(ChatMessage::user("remember me"));

        let saved = memory.snapshot();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].messages()[0].content, "remember me");

        let reloaded = SessionStore::with_persistence(0, memory);
        assert_eq!(reloaded.active().name, "Remember Me");
    }

    #[test]
    fn test_json_history_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = Arc::new(JsonHistoryFile::new(dir.path().join("history/chats.json")));

        let mut store = SessionStore::with_persistence(0, file.clone());
        store.append_message(ChatMessage::user("first"));
        store.new_session();
        store.append_message(ChatMessage::user("second"));

        let loaded = file.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].messages()[0].content, "second");
        assert!(!file.temp_path().exists());
    }

    #[test]
    fn test_corrupt_history_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chats.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = SessionStore::with_persistence(5, Arc::new(JsonHistoryFile::new(&path)));
        assert_eq!(store.history().len(), 1);
        assert!(store.active().is_empty());
    }

    #[test]
    fn test_missing_history_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = JsonHistoryFile::new(dir.path().join("absent.json"));
        assert!(file.load().unwrap().is_empty());
    }
}
