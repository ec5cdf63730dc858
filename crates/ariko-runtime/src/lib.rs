//! # ariko-runtime
//!
//! HTTP side of the Ariko assistant: provider strategies, stream decoding
//! and the [`LlmClient`] that implements `ariko_core::ChatClient`.
//!
//! ## Providers
//!
//! - **OpenAI**: chat completions with bearer auth
//! - **Gemini**: `generateContent` with the key in the query string
//! - **Ollama**: local `/api/chat`, no credentials
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ariko_runtime::LlmClient;
//!
//! let client = Arc::new(LlmClient::with_reqwest()?);
//! let orchestrator = AgentOrchestrator::builder()
//!     .client(client)
//!     .host(host)
//!     .build(events_tx)?;
//! ```

pub mod client;
pub mod providers;
pub mod stream;
pub mod transport;

pub use client::LlmClient;
pub use providers::{Provider, ProviderStrategy};
pub use stream::StreamDecoder;
pub use transport::{HttpTransport, ReqwestTransport, TransportError};
