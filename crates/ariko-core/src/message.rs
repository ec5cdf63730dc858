//! Conversation Messages
//!
//! Provider-agnostic message format. Each provider strategy maps [`Role`]
//! onto its own role vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix marking a tool observation fed back as a user turn
pub const OBSERVATION_PREFIX: &str = "Observation:";

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt/instructions
    System,
    /// User input (and tool observations)
    User,
    /// Assistant (LLM) response
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single message in a conversation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role
    pub role: Role,

    /// Text content
    pub content: String,

    /// Rendered with the error style in the transcript
    #[serde(default)]
    pub is_error: bool,

    /// Timestamp
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a new message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            is_error: false,
            timestamp: Utc::now(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create an error-flagged assistant message
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::assistant(content)
        }
    }

    /// Create a tool observation, sent back to the model as a user turn
    pub fn observation(content: impl AsRef<str>) -> Self {
        Self::user(format!("{OBSERVATION_PREFIX}\n{}", content.as_ref()))
    }

    /// Whether this message carries a tool observation
    pub fn is_observation(&self) -> bool {
        self.role == Role::User && self.content.starts_with(OBSERVATION_PREFIX)
    }
}
