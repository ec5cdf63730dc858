//! Error Types
//!
//! Two layers of errors live here:
//!
//! - [`RequestError`] is the tagged failure returned by every provider/client
//!   call. It never escapes as a panic; callers inspect its [`ErrorKind`].
//! - [`AgentError`] covers orchestrator, registry and persistence failures.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Result of a provider request: exactly one of data or error
pub type RequestResult<T> = std::result::Result<T, RequestError>;

/// Failure class of a provider request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Missing or rejected credential
    Auth,
    /// Transport-level failure (connect, timeout, broken stream)
    Network,
    /// Non-2xx response with a body
    Http,
    /// Response shape mismatch
    Parsing,
    /// Aborted while in flight
    Cancellation,
    /// Anything else, including precondition violations
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auth => "auth",
            Self::Network => "network",
            Self::Http => "http",
            Self::Parsing => "parsing",
            Self::Cancellation => "cancellation",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Tagged failure of a provider request
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{kind} error: {message}")]
pub struct RequestError {
    pub kind: ErrorKind,
    pub message: String,
}

impl RequestError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Auth, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn http(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Http, message)
    }

    pub fn parsing(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parsing, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancellation, "Request was cancelled")
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    pub fn is_cancellation(&self) -> bool {
        self.kind == ErrorKind::Cancellation
    }

    /// Transcript wording, distinct per kind
    pub fn user_message(&self) -> String {
        match self.kind {
            ErrorKind::Auth => format!(
                "Authentication failed: {}. Check your API key in the settings.",
                self.message
            ),
            ErrorKind::Network => format!(
                "Could not reach the AI service: {}. Check your connection and try again.",
                self.message
            ),
            ErrorKind::Http => format!("The AI service returned an error: {}", self.message),
            ErrorKind::Parsing => format!(
                "The AI service sent a response that could not be read: {}",
                self.message
            ),
            ErrorKind::Cancellation => "Request cancelled.".into(),
            ErrorKind::Unknown => format!("Something went wrong: {}", self.message),
        }
    }
}

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// Tool not found in registry
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool arguments did not match the schema
    #[error("Error: {0}")]
    ToolValidation(String),

    /// Maximum tool-call iterations reached for one user turn
    #[error("Maximum iterations ({0}) reached")]
    MaxIterations(usize),

    /// Session history could not be loaded or saved
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::ToolNotFound(name) => format!("The tool '{name}' is not available."),
            Self::ToolValidation(msg) => format!("Invalid tool input: {msg}"),
            Self::MaxIterations(max) => format!(
                "The agent stopped after {max} tool calls without reaching an answer. Try a more specific request."
            ),
            Self::Persistence(_) => "Chat history could not be saved.".into(),
            Self::Config(msg) => format!("Configuration problem: {msg}"),
            _ => "An unexpected error occurred.".into(),
        }
    }
}
