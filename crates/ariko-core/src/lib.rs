//! # ariko-core
//!
//! Agent orchestration for an in-editor AI assistant: sessions, tools and the
//! confirm-execute-continue loop, written against a provider-agnostic chat
//! client.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     AgentOrchestrator                        │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────────┐  │
//! │  │ SessionStore │  │ ToolRegistry │──│ ChatClient (seam)  │  │
//! │  └──────────────┘  └──────────────┘  └────────────────────┘  │
//! │          │                 │                   │             │
//! │   HistoryPersistence    ToolHost          ariko-runtime      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `ChatClient` trait keeps this crate free of HTTP: the runtime crate
//! provides the OpenAI, Gemini and Ollama implementation.

pub mod config;
pub mod context;
pub mod error;
pub mod message;
pub mod orchestrator;
pub mod parser;
pub mod provider;
pub mod session;
pub mod tool;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ApiKeys, ProviderKind, Settings, SettingsFile, WorkMode};
pub use context::{ConsoleLog, ContextItem, ContextProvider, LogEntry, StaticContext};
pub use error::{AgentError, ErrorKind, RequestError, RequestResult, Result};
pub use message::{ChatMessage, Role};
pub use orchestrator::{AgentOrchestrator, Canceller, ChatEvent, ResponseStatus};
pub use provider::{ChatClient, ChatRequest};
pub use session::{ChatSession, JsonHistoryFile, SessionId, SessionStore};
pub use tool::{Tool, ToolCall, ToolRegistry};
pub use tools::{InMemorySceneGraph, ProjectLayout, ToolHost};
