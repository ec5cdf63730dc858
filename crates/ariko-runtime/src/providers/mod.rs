//! Provider Strategies
//!
//! Each supported backend speaks its own REST dialect. A strategy turns the
//! provider-agnostic request into that dialect and reads the answers back.
//! The set of providers is closed, so [`Provider`] is an enum that
//! dispatches statically to the per-provider strategy.

mod gemini;
mod ollama;
mod openai;

use ariko_core::{ApiKeys, ChatMessage, ProviderKind, RequestResult, Settings};
use serde_json::Value;

pub use gemini::GeminiStrategy;
pub use ollama::OllamaStrategy;
pub use openai::OpenAiStrategy;

/// Placeholder returned when a response parses but carries no text
pub const NO_CONTENT: &str = "No content found";

/// Header carrying the credential for header-authenticated providers
#[derive(Clone, PartialEq, Eq)]
pub struct AuthHeader {
    pub name: &'static str,
    pub value: String,
}

impl AuthHeader {
    pub fn bearer(key: &str) -> Self {
        Self {
            name: "Authorization",
            value: format!("Bearer {key}"),
        }
    }
}

impl std::fmt::Debug for AuthHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthHeader")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// How a provider frames streamed records
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamFormat {
    /// Server-sent events: `data: {...}` lines
    Sse,
    /// One JSON object per line
    Ndjson,
}

/// Request/response translation for one provider
pub trait ProviderStrategy {
    fn kind(&self) -> ProviderKind;

    /// URL listing the provider's models. Key-gated providers fail with
    /// `Auth` when the key is empty.
    fn resolve_models_url(&self, settings: &Settings, keys: &ApiKeys) -> RequestResult<String>;

    fn resolve_chat_url(
        &self,
        model: &str,
        settings: &Settings,
        keys: &ApiKeys,
    ) -> RequestResult<String>;

    /// `None` when the provider authenticates another way (or not at all)
    fn resolve_auth_header(
        &self,
        settings: &Settings,
        keys: &ApiKeys,
    ) -> RequestResult<Option<AuthHeader>>;

    /// Non-streaming request body
    fn build_chat_body(&self, messages: &[ChatMessage], model: &str) -> Value;

    /// Assistant text of a complete response; [`NO_CONTENT`] when the
    /// shape is valid JSON but the text is missing
    fn parse_chat_response(&self, body: &str) -> RequestResult<String>;

    /// Framing of streamed records, removed before `parse_stream_record`
    fn stream_format(&self) -> StreamFormat;

    /// Text increment carried by one record's JSON payload, if any
    fn parse_stream_record(&self, record: &str) -> Option<String>;

    /// Allow-listed model ids, in the order the provider lists them
    fn parse_models_response(&self, body: &str) -> RequestResult<Vec<String>>;
}

/// The closed set of provider strategies
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    OpenAi(OpenAiStrategy),
    Gemini(GeminiStrategy),
    Ollama(OllamaStrategy),
}

impl Provider {
    pub const fn for_kind(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::OpenAi => Self::OpenAi(OpenAiStrategy),
            ProviderKind::Gemini => Self::Gemini(GeminiStrategy),
            ProviderKind::Ollama => Self::Ollama(OllamaStrategy),
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $strategy:ident => $call:expr) => {
        match $self {
            Provider::OpenAi($strategy) => $call,
            Provider::Gemini($strategy) => $call,
            Provider::Ollama($strategy) => $call,
        }
    };
}

impl ProviderStrategy for Provider {
    fn kind(&self) -> ProviderKind {
        dispatch!(self, s => s.kind())
    }

    fn resolve_models_url(&self, settings: &Settings, keys: &ApiKeys) -> RequestResult<String> {
        dispatch!(self, s => s.resolve_models_url(settings, keys))
    }

    fn resolve_chat_url(
        &self,
        model: &str,
        settings: &Settings,
        keys: &ApiKeys,
    ) -> RequestResult<String> {
        dispatch!(self, s => s.resolve_chat_url(model, settings, keys))
    }

    fn resolve_auth_header(
        &self,
        settings: &Settings,
        keys: &ApiKeys,
    ) -> RequestResult<Option<AuthHeader>> {
        dispatch!(self, s => s.resolve_auth_header(settings, keys))
    }

    fn build_chat_body(&self, messages: &[ChatMessage], model: &str) -> Value {
        dispatch!(self, s => s.build_chat_body(messages, model))
    }

    fn parse_chat_response(&self, body: &str) -> RequestResult<String> {
        dispatch!(self, s => s.parse_chat_response(body))
    }

    fn stream_format(&self) -> StreamFormat {
        dispatch!(self, s => s.stream_format())
    }

    fn parse_stream_record(&self, record: &str) -> Option<String> {
        dispatch!(self, s => s.parse_stream_record(record))
    }

    fn parse_models_response(&self, body: &str) -> RequestResult<Vec<String>> {
        dispatch!(self, s => s.parse_models_response(body))
    }
}

/// Join a base URL and a path with exactly one slash
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

pub(crate) fn parse_json(body: &str) -> RequestResult<Value> {
    serde_json::from_str(body)
        .map_err(|e| ariko_core::RequestError::parsing(format!("invalid JSON response: {e}")))
}
