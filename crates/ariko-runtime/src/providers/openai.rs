//! OpenAI-compatible chat completions

use ariko_core::{ApiKeys, ChatMessage, ProviderKind, RequestError, RequestResult, Settings};
use serde_json::{Value, json};

use super::{AuthHeader, NO_CONTENT, ProviderStrategy, StreamFormat, join_url, parse_json};

const ALLOWED_MODELS: &[&str] = &[
    "gpt-4o",
    "gpt-4o-mini",
    "gpt-4.1",
    "gpt-4.1-mini",
    "gpt-4-turbo",
    "gpt-4",
    "gpt-3.5-turbo",
    "o1",
    "o1-mini",
    "o3-mini",
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpenAiStrategy;

impl OpenAiStrategy {
    fn require_key(keys: &ApiKeys) -> RequestResult<&str> {
        let key = keys.openai.trim();
        if key.is_empty() {
            return Err(RequestError::auth("OpenAI API key is not set"));
        }
        Ok(key)
    }
}

impl ProviderStrategy for OpenAiStrategy {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn resolve_models_url(&self, settings: &Settings, keys: &ApiKeys) -> RequestResult<String> {
        Self::require_key(keys)?;
        Ok(join_url(&settings.openai_base_url, "models"))
    }

    fn resolve_chat_url(
        &self,
        _model: &str,
        settings: &Settings,
        keys: &ApiKeys,
    ) -> RequestResult<String> {
        Self::require_key(keys)?;
        Ok(join_url(&settings.openai_base_url, "chat/completions"))
    }

    fn resolve_auth_header(
        &self,
        _settings: &Settings,
        keys: &ApiKeys,
    ) -> RequestResult<Option<AuthHeader>> {
        Self::require_key(keys).map(|key| Some(AuthHeader::bearer(key)))
    }

    fn build_chat_body(&self, messages: &[ChatMessage], model: &str) -> Value {
        let messages: Vec<Value> = messages
            .iter()
            .map(|m| json!({ "role": m.role.to_string(), "content": m.content }))
            .collect();
        json!({ "model": model, "messages": messages })
    }

    fn parse_chat_response(&self, body: &str) -> RequestResult<String> {
        let value = parse_json(body)?;
        Ok(value["choices"][0]["message"]["content"]
            .as_str()
            .map_or_else(|| NO_CONTENT.to_string(), str::to_string))
    }

    fn stream_format(&self) -> StreamFormat {
        StreamFormat::Sse
    }

    fn parse_stream_record(&self, record: &str) -> Option<String> {
        let value: Value = serde_json::from_str(record).ok()?;
        value["choices"][0]["delta"]["content"]
            .as_str()
            .filter(|delta| !delta.is_empty())
            .map(str::to_string)
    }

    fn parse_models_response(&self, body: &str) -> RequestResult<Vec<String>> {
        let value = parse_json(body)?;
        let Some(data) = value["data"].as_array() else {
            return Err(RequestError::parsing("model list has no 'data' array"));
        };
        Ok(data
            .iter()
            .filter_map(|m| m["id"].as_str())
            .filter(|id| ALLOWED_MODELS.contains(id))
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ariko_core::ErrorKind;

    fn keys() -> ApiKeys {
        ApiKeys {
            openai: "sk-test".into(),
            ..ApiKeys::default()
        }
    }

    #[test]
    fn test_missing_key_is_auth_error() {
        let settings = Settings::default();
        let err = OpenAiStrategy
            .resolve_chat_url("gpt-4o", &settings, &ApiKeys::default())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Auth);
        assert_eq!(
            OpenAiStrategy
                .resolve_models_url(&settings, &ApiKeys::default())
                .unwrap_err()
                .kind,
            ErrorKind::Auth
        );
    }

    #[test]
    fn test_urls_and_auth() {
        let settings = Settings::default();
        assert_eq!(
            OpenAiStrategy.resolve_chat_url("gpt-4o", &settings, &keys()).unwrap(),
            "https://api.openai.com/v1/chat/completions"
        );
        let header = OpenAiStrategy
            .resolve_auth_header(&settings, &keys())
            .unwrap()
            .unwrap();
        assert_eq!(header.value, "Bearer sk-test");
    }

    #[test]
    fn test_body_round_trip() {
        let messages = [
            ChatMessage::system("Be brief."),
            ChatMessage::user("Hi"),
            ChatMessage::assistant("Hello!"),
        ];
        let body = OpenAiStrategy.build_chat_body(&messages, "gpt-4o");
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][2]["role"], "assistant");

        let reply = body["messages"][2]["content"].as_str().unwrap();
        let response = json!({
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": reply } }]
        });
        assert_eq!(
            OpenAiStrategy.parse_chat_response(&response.to_string()).unwrap(),
            "Hello!"
        );
    }

    #[test]
    fn test_partial_shape_yields_placeholder() {
        assert_eq!(
            OpenAiStrategy.parse_chat_response(r#"{"choices": []}"#).unwrap(),
            NO_CONTENT
        );
        assert_eq!(
            OpenAiStrategy.parse_chat_response("not json").unwrap_err().kind,
            ErrorKind::Parsing
        );
    }

    #[test]
    fn test_stream_records() {
        let record = r#"{"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(OpenAiStrategy.parse_stream_record(record).as_deref(), Some("Hel"));
        assert!(OpenAiStrategy.parse_stream_record("not json").is_none());
        assert!(
            OpenAiStrategy
                .parse_stream_record(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#)
                .is_none()
        );
    }

    #[test]
    fn test_models_allowlist() {
        let body = json!({
            "data": [
                { "id": "gpt-4o" },
                { "id": "whisper-1" },
                { "id": "gpt-4o-mini" },
                { "id": "dall-e-3" }
            ]
        });
        assert_eq!(
            OpenAiStrategy.parse_models_response(&body.to_string()).unwrap(),
            ["gpt-4o", "gpt-4o-mini"]
        );
    }
}
