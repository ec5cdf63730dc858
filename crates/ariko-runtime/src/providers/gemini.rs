//! Gemini `generateContent`
//!
//! Gemini has no system role and calls the assistant `model`. System text
//! opens the conversation: it is folded into a leading user turn, or sent as
//! one when the history starts with the model. Consecutive turns of the same
//! role are merged into one multi-part turn. The API key travels in the
//! query string.

use ariko_core::{ApiKeys, ChatMessage, ProviderKind, RequestError, RequestResult, Role, Settings};
use reqwest::Url;
use serde_json::{Value, json};

use super::{AuthHeader, NO_CONTENT, ProviderStrategy, StreamFormat, parse_json};

const ALLOWED_MODELS: &[&str] = &[
    "gemini-2.5-pro",
    "gemini-2.5-flash",
    "gemini-2.0-flash",
    "gemini-2.0-flash-lite",
    "gemini-1.5-pro",
    "gemini-1.5-flash",
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GeminiStrategy;

impl GeminiStrategy {
    fn require_key(keys: &ApiKeys) -> RequestResult<&str> {
        let key = keys.google.trim();
        if key.is_empty() {
            return Err(RequestError::auth("Google API key is not set"));
        }
        Ok(key)
    }

    /// `<base>/models[/<segment>]?key=<key>`, percent-encoding the segment
    /// and the key
    fn keyed_url(base: &str, segment: Option<&str>, key: &str) -> RequestResult<String> {
        let invalid =
            |detail: &str| RequestError::unknown(format!("invalid Gemini base URL '{base}': {detail}"));
        let mut url = Url::parse(base).map_err(|e| invalid(&e.to_string()))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| invalid("it cannot carry a path"))?;
            segments.pop_if_empty().push("models");
            if let Some(segment) = segment {
                segments.push(segment);
            }
        }
        url.query_pairs_mut().append_pair("key", key);
        Ok(url.into())
    }

    /// Concatenated text parts of the first candidate
    fn candidate_text(value: &Value) -> Option<String> {
        let parts = value["candidates"][0]["content"]["parts"].as_array()?;
        let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
        Some(text)
    }
}

impl ProviderStrategy for GeminiStrategy {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn resolve_models_url(&self, settings: &Settings, keys: &ApiKeys) -> RequestResult<String> {
        let key = Self::require_key(keys)?;
        Self::keyed_url(&settings.gemini_base_url, None, key)
    }

    fn resolve_chat_url(
        &self,
        model: &str,
        settings: &Settings,
        keys: &ApiKeys,
    ) -> RequestResult<String> {
        let key = Self::require_key(keys)?;
        let method = format!("{model}:generateContent");
        Self::keyed_url(&settings.gemini_base_url, Some(&method), key)
    }

    fn resolve_auth_header(
        &self,
        _settings: &Settings,
        _keys: &ApiKeys,
    ) -> RequestResult<Option<AuthHeader>> {
        Ok(None)
    }

    fn build_chat_body(&self, messages: &[ChatMessage], _model: &str) -> Value {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        let mut contents: Vec<(&'static str, Vec<String>)> = Vec::new();
        for message in messages.iter().filter(|m| m.role != Role::System) {
            let role = if message.role == Role::Assistant { "model" } else { "user" };
            let text = message.content.clone();
            match contents.last_mut() {
                Some((last_role, parts)) if *last_role == role => parts.push(text),
                _ => contents.push((role, vec![text])),
            }
        }

        if !system.is_empty() {
            let system = system.join("\n\n");
            match contents.first_mut() {
                Some((role, parts)) if *role == "user" => {
                    if let Some(first) = parts.first_mut() {
                        *first = format!("{system}\n\n{first}");
                    }
                }
                _ => contents.insert(0, ("user", vec![system])),
            }
        }

        let contents: Vec<Value> = contents
            .into_iter()
            .map(|(role, parts)| {
                let parts: Vec<Value> = parts.into_iter().map(|text| json!({ "text": text })).collect();
                json!({ "role": role, "parts": parts })
            })
            .collect();
        json!({ "contents": contents })
    }

    fn parse_chat_response(&self, body: &str) -> RequestResult<String> {
        let value = parse_json(body)?;
        Ok(Self::candidate_text(&value)
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| NO_CONTENT.to_string()))
    }

    fn stream_format(&self) -> StreamFormat {
        StreamFormat::Sse
    }

    fn parse_stream_record(&self, record: &str) -> Option<String> {
        let value: Value = serde_json::from_str(record).ok()?;
        Self::candidate_text(&value).filter(|text| !text.is_empty())
    }

    fn parse_models_response(&self, body: &str) -> RequestResult<Vec<String>> {
        let value = parse_json(body)?;
        let Some(models) = value["models"].as_array() else {
            return Err(RequestError::parsing("model list has no 'models' array"));
        };
        Ok(models
            .iter()
            .filter_map(|m| m["name"].as_str())
            .map(|name| name.strip_prefix("models/").unwrap_or(name))
            .filter(|id| ALLOWED_MODELS.contains(id))
            .map(str::to_string)
            .collect())
    }
}
