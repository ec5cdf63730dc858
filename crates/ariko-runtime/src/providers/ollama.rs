//! Ollama `/api/chat`

use ariko_core::{ApiKeys, ChatMessage, ProviderKind, RequestError, RequestResult, Settings};
use serde_json::{Value, json};

use super::{AuthHeader, NO_CONTENT, ProviderStrategy, StreamFormat, join_url, parse_json};

/// Local models are matched by family, since tags vary per install
const ALLOWED_FAMILIES: &[&str] = &[
    "llama",
    "mistral",
    "qwen",
    "gemma",
    "phi",
    "deepseek",
    "codellama",
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OllamaStrategy;

impl ProviderStrategy for OllamaStrategy {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn resolve_models_url(&self, settings: &Settings, _keys: &ApiKeys) -> RequestResult<String> {
        Ok(join_url(&settings.ollama_url, "api/tags"))
    }

    fn resolve_chat_url(
        &self,
        _model: &str,
        settings: &Settings,
        _keys: &ApiKeys,
    ) -> RequestResult<String> {
        Ok(join_url(&settings.ollama_url, "api/chat"))
    }

    fn resolve_auth_header(
        &self,
        _settings: &Settings,
        _keys: &ApiKeys,
    ) -> RequestResult<Option<AuthHeader>> {
        Ok(None)
    }

    /// Ollama streams unless told otherwise, so the plain body opts out
    fn build_chat_body(&self, messages: &[ChatMessage], model: &str) -> Value {
        let messages: Vec<Value> = messages
            .iter()
            .map(|m| json!({ "role": m.role.to_string(), "content": m.content }))
            .collect();
        json!({ "model": model, "messages": messages, "stream": false })
    }

    fn parse_chat_response(&self, body: &str) -> RequestResult<String> {
        let value = parse_json(body)?;
        Ok(value["message"]["content"]
            .as_str()
            .map_or_else(|| NO_CONTENT.to_string(), str::to_string))
    }

    fn stream_format(&self) -> StreamFormat {
        StreamFormat::Ndjson
    }

    fn parse_stream_record(&self, record: &str) -> Option<String> {
        let value: Value = serde_json::from_str(record.trim()).ok()?;
        value["message"]["content"]
            .as_str()
            .filter(|delta| !delta.is_empty())
            .map(str::to_string)
    }

    fn parse_models_response(&self, body: &str) -> RequestResult<Vec<String>> {
        let value = parse_json(body)?;
        let Some(models) = value["models"].as_array() else {
            return Err(RequestError::parsing("model list has no 'models' array"));
        };
        Ok(models
            .iter()
            .filter_map(|m| m["name"].as_str())
            .filter(|name| {
                let family = name.split(':').next().unwrap_or(name);
                ALLOWED_FAMILIES.iter().any(|f| family.starts_with(f))
            })
            .map(str::to_string)
            .collect())
    }
}
