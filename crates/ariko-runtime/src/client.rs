//! LLM Client
//!
//! HTTP implementation of [`ChatClient`]. A client runs one chat request at
//! a time: starting a request cancels the previous one, and a cancelled
//! request resolves exactly once, with a `Cancellation` error.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use ariko_core::provider::DeltaSink;
use ariko_core::{
    ApiKeys, ChatClient, ChatRequest, ProviderKind, RequestError, RequestResult, Settings,
};
use async_trait::async_trait;
use serde_json::Value;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::providers::{AuthHeader, NO_CONTENT, Provider, ProviderStrategy};
use crate::stream::StreamDecoder;
use crate::transport::{HttpTransport, ReqwestTransport, TransportError};

/// URL, credentials and body of one chat request
struct PreparedChat {
    provider: Provider,
    url: String,
    auth: Option<AuthHeader>,
    body: String,
}

/// Chat client over an [`HttpTransport`]
pub struct LlmClient {
    transport: Arc<dyn HttpTransport>,
    active: Mutex<Option<(u64, CancellationToken)>>,
    next_id: AtomicU64,
}

impl LlmClient {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            active: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Client on a default `reqwest` transport
    pub fn with_reqwest() -> Result<Self, TransportError> {
        Ok(Self::new(Arc::new(ReqwestTransport::new()?)))
    }

    /// Validate inputs and resolve everything the provider needs, before
    /// any network traffic
    fn prepare(request: &ChatRequest<'_>, stream: bool) -> RequestResult<PreparedChat> {
        if request.model.trim().is_empty() {
            return Err(RequestError::unknown("No model selected"));
        }
        if request.messages.is_empty() {
            return Err(RequestError::unknown("No messages to send"));
        }

        let provider = Provider::for_kind(request.provider);
        let mut url = provider.resolve_chat_url(request.model, request.settings, request.keys)?;
        let auth = provider.resolve_auth_header(request.settings, request.keys)?;
        let mut body = provider.build_chat_body(request.messages, request.model);

        if stream {
            enable_streaming(request.provider, &mut url, &mut body);
        }

        Ok(PreparedChat {
            provider,
            url,
            auth,
            body: body.to_string(),
        })
    }

    /// Register a new in-flight request, cancelling the previous one
    fn begin(&self) -> (u64, CancellationToken) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let previous = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace((id, token.clone()));
        if let Some((previous_id, previous_token)) = previous {
            tracing::debug!(request = previous_id, "Superseding in-flight request");
            previous_token.cancel();
        }
        (id, token)
    }

    fn end(&self, id: u64) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.as_ref().is_some_and(|(active_id, _)| *active_id == id) {
            *active = None;
        }
    }

    /// Run `work` as the client's single in-flight request
    async fn run_exclusive<F>(&self, work: F) -> RequestResult<String>
    where
        F: Future<Output = RequestResult<String>> + Send,
    {
        let (id, token) = self.begin();
        let result = tokio::select! {
            biased;
            () = token.cancelled() => Err(RequestError::cancelled()),
            result = work => result,
        };
        self.end(id);
        result
    }

    async fn post_chat(&self, prepared: PreparedChat, limit: Duration) -> RequestResult<String> {
        let body = with_timeout(
            limit,
            self.transport
                .post_json(&prepared.url, prepared.auth.as_ref(), prepared.body),
        )
        .await?;
        prepared.provider.parse_chat_response(&body)
    }

    async fn stream_chat(
        &self,
        prepared: PreparedChat,
        limit: Duration,
        on_delta: &mut DeltaSink<'_>,
    ) -> RequestResult<String> {
        let mut stream = with_timeout(
            limit,
            self.transport
                .post_json_stream(&prepared.url, prepared.auth.as_ref(), prepared.body),
        )
        .await?;

        let mut decoder = StreamDecoder::new(prepared.provider);
        let mut text = String::new();

        // The timeout bounds the gap between chunks, not the whole answer
        while let Some(chunk) = tokio::time::timeout(limit, stream.next())
            .await
            .map_err(|_| RequestError::network("stream stalled"))?
        {
            for delta in decoder.feed(&chunk?) {
                on_delta(&delta);
                text.push_str(&delta);
            }
        }
        if let Some(delta) = decoder.finish() {
            on_delta(&delta);
            text.push_str(&delta);
        }

        tracing::debug!(chars = text.len(), "Stream finished");
        if text.is_empty() {
            Ok(NO_CONTENT.to_string())
        } else {
            Ok(text)
        }
    }
}

/// Turn a plain chat request into its streaming form
fn enable_streaming(provider: ProviderKind, url: &mut String, body: &mut Value) {
    match provider {
        ProviderKind::OpenAi | ProviderKind::Ollama => {
            if let Some(object) = body.as_object_mut() {
                object.insert("stream".into(), Value::Bool(true));
            }
        }
        ProviderKind::Gemini => {
            *url = url.replacen(":generateContent", ":streamGenerateContent", 1);
            url.push_str(if url.contains('?') { "&alt=sse" } else { "?alt=sse" });
        }
    }
}

async fn with_timeout<T, F>(limit: Duration, work: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    tokio::time::timeout(limit, work)
        .await
        .unwrap_or(Err(TransportError::Timeout))
}

#[async_trait]
impl ChatClient for LlmClient {
    async fn send_chat(&self, request: ChatRequest<'_>) -> RequestResult<String> {
        let prepared = Self::prepare(&request, false)?;
        tracing::debug!(provider = %request.provider, model = request.model, messages = request.messages.len(), "Sending chat request");

        self.run_exclusive(self.post_chat(prepared, request.settings.request_timeout()))
            .await
    }

    async fn send_chat_streamed(
        &self,
        request: ChatRequest<'_>,
        on_delta: &mut DeltaSink<'_>,
    ) -> RequestResult<String> {
        let prepared = Self::prepare(&request, true)?;
        tracing::debug!(provider = %request.provider, model = request.model, messages = request.messages.len(), "Sending streamed chat request");

        self.run_exclusive(self.stream_chat(prepared, request.settings.request_timeout(), on_delta))
            .await
    }

    async fn fetch_models(
        &self,
        provider: ProviderKind,
        settings: &Settings,
        keys: &ApiKeys,
    ) -> RequestResult<Vec<String>> {
        let strategy = Provider::for_kind(provider);
        let url = strategy.resolve_models_url(settings, keys)?;
        let auth = strategy.resolve_auth_header(settings, keys)?;

        tracing::debug!(provider = %provider, "Fetching models");
        let body = with_timeout(
            settings.request_timeout(),
            self.transport.get(&url, auth.as_ref()),
        )
        .await?;
        strategy.parse_models_response(&body)
    }

    fn cancel(&self) {
        let active = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some((id, token)) = active {
            tracing::debug!(request = id, "Cancelling in-flight request");
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ByteStream;
    use ariko_core::{ChatMessage, ErrorKind};
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    /// Scripted transport counting calls
    #[derive(Default)]
    struct FakeTransport {
        calls: AtomicUsize,
        response: Option<String>,
        chunks: Vec<&'static str>,
        hang: bool,
        started: Notify,
        last_url: Mutex<Option<String>>,
        last_body: Mutex<Option<String>>,
    }

    impl FakeTransport {
        fn replying(body: &str) -> Self {
            Self {
                response: Some(body.to_string()),
                ..Self::default()
            }
        }

        fn streaming(chunks: Vec<&'static str>) -> Self {
            Self {
                chunks,
                ..Self::default()
            }
        }

        fn hanging() -> Self {
            Self {
                hang: true,
                ..Self::default()
            }
        }

        async fn record(&self, url: &str, body: Option<String>) -> Result<(), TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_url.lock().unwrap() = Some(url.to_string());
            *self.last_body.lock().unwrap() = body;
            self.started.notify_one();
            if self.hang {
                std::future::pending::<()>().await;
            }
            Ok(())
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HttpTransport for FakeTransport {
        async fn get(&self, url: &str, _auth: Option<&AuthHeader>) -> Result<String, TransportError> {
            self.record(url, None).await?;
            self.response.clone().ok_or(TransportError::Timeout)
        }

        async fn post_json(
            &self,
            url: &str,
            _auth: Option<&AuthHeader>,
            body: String,
        ) -> Result<String, TransportError> {
            self.record(url, Some(body)).await?;
            self.response.clone().ok_or(TransportError::Timeout)
        }

        async fn post_json_stream(
            &self,
            url: &str,
            _auth: Option<&AuthHeader>,
            body: String,
        ) -> Result<ByteStream, TransportError> {
            self.record(url, Some(body)).await?;
            let chunks: Vec<Result<Vec<u8>, TransportError>> = self
                .chunks
                .iter()
                .map(|c| Ok(c.as_bytes().to_vec()))
                .collect();
            Ok(Box::pin(tokio_stream::iter(chunks)))
        }
    }

    fn keys() -> ApiKeys {
        ApiKeys {
            openai: "sk-test".into(),
            google: "g-key".into(),
        }
    }

    fn request<'a>(
        messages: &'a [ChatMessage],
        provider: ProviderKind,
        model: &'a str,
        settings: &'a Settings,
        keys: &'a ApiKeys,
    ) -> ChatRequest<'a> {
        ChatRequest {
            messages,
            provider,
            model,
            settings,
            keys,
        }
    }

    #[tokio::test]
    async fn test_empty_model_makes_no_call() {
        let transport = Arc::new(FakeTransport::replying("{}"));
        let client = LlmClient::new(transport.clone());
        let (settings, keys) = (Settings::default(), keys());
        let messages = [ChatMessage::user("hi")];

        let err = client
            .send_chat(request(&messages, ProviderKind::OpenAi, "", &settings, &keys))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_messages_make_no_call() {
        let transport = Arc::new(FakeTransport::replying("{}"));
        let client = LlmClient::new(transport.clone());
        let (settings, keys) = (Settings::default(), keys());

        let err = client
            .send_chat(request(&[], ProviderKind::Ollama, "llama3", &settings, &keys))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_key_short_circuits() {
        let transport = Arc::new(FakeTransport::replying("{}"));
        let client = LlmClient::new(transport.clone());
        let settings = Settings::default();
        let messages = [ChatMessage::user("hi")];

        let err = client
            .send_chat(request(
                &messages,
                ProviderKind::Gemini,
                "gemini-2.0-flash",
                &settings,
                &ApiKeys::default(),
            ))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Auth);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_send_chat_parses_response() {
        let transport = Arc::new(FakeTransport::replying(
            r#"{"choices":[{"message":{"role":"assistant","content":"Hi!"}}]}"#,
        ));
        let client = LlmClient::new(transport.clone());
        let (settings, keys) = (Settings::default(), keys());
        let messages = [ChatMessage::user("hi")];

        let text = client
            .send_chat(request(&messages, ProviderKind::OpenAi, "gpt-4o", &settings, &keys))
            .await
            .unwrap();
        assert_eq!(text, "Hi!");
        assert_eq!(transport.calls(), 1);

        let body: Value =
            serde_json::from_str(transport.last_body.lock().unwrap().as_ref().unwrap()).unwrap();
        assert!(body.get("stream").is_none());
    }

    #[tokio::test]
    async fn test_invalid_json_is_parsing_error() {
        let transport = Arc::new(FakeTransport::replying("<html>oops</html>"));
        let client = LlmClient::new(transport);
        let (settings, keys) = (Settings::default(), keys());
        let messages = [ChatMessage::user("hi")];

        let err = client
            .send_chat(request(&messages, ProviderKind::Ollama, "llama3", &settings, &keys))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parsing);
    }

    #[tokio::test]
    async fn test_streaming_emits_deltas() {
        let transport = Arc::new(FakeTransport::streaming(vec![
            "{\"message\":{\"content\":\"Hel\"},\"done\":false}\n{\"mess",
            "age\":{\"content\":\"lo\"},\"done\":false}\n",
            "{\"message\":{\"content\":\"\"},\"done\":true}\n",
        ]));
        let client = LlmClient::new(transport.clone());
        let (settings, keys) = (Settings::default(), keys());
        let messages = [ChatMessage::user("hi")];

        let mut deltas = Vec::new();
        let mut sink = |delta: &str| deltas.push(delta.to_string());
        let text = client
            .send_chat_streamed(
                request(&messages, ProviderKind::Ollama, "llama3", &settings, &keys),
                &mut sink,
            )
            .await
            .unwrap();

        assert_eq!(text, "Hello");
        assert_eq!(deltas, ["Hel", "lo"]);
        let body: Value =
            serde_json::from_str(transport.last_body.lock().unwrap().as_ref().unwrap()).unwrap();
        assert_eq!(body["stream"], true);
    }

    #[tokio::test]
    async fn test_gemini_stream_url() {
        let transport = Arc::new(FakeTransport::streaming(vec![
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"ok\"}]}}]}\n\n",
        ]));
        let client = LlmClient::new(transport.clone());
        let (settings, keys) = (Settings::default(), keys());
        let messages = [ChatMessage::user("hi")];

        let mut sink = |_: &str| {};
        let text = client
            .send_chat_streamed(
                request(&messages, ProviderKind::Gemini, "gemini-2.0-flash", &settings, &keys),
                &mut sink,
            )
            .await
            .unwrap();

        assert_eq!(text, "ok");
        let url = transport.last_url.lock().unwrap().clone().unwrap();
        assert!(url.contains(":streamGenerateContent?key=g-key&alt=sse"));
    }

    #[tokio::test]
    async fn test_cancel_resolves_once_as_cancellation() {
        let transport = Arc::new(FakeTransport::hanging());
        let client = Arc::new(LlmClient::new(transport.clone()));

        let task = {
            let client = client.clone();
            tokio::spawn(async move {
                let (settings, keys) = (Settings::default(), keys());
                let messages = [ChatMessage::user("hi")];
                client
                    .send_chat(request(&messages, ProviderKind::Ollama, "llama3", &settings, &keys))
                    .await
            })
        };

        transport.started.notified().await;
        client.cancel();
        let result = task.await.unwrap();
        assert_eq!(result.unwrap_err().kind, ErrorKind::Cancellation);
        assert!(client.active.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_new_request_supersedes_previous() {
        let transport = Arc::new(FakeTransport::hanging());
        let client = Arc::new(LlmClient::new(transport.clone()));

        let first = {
            let client = client.clone();
            tokio::spawn(async move {
                let (settings, keys) = (Settings::default(), keys());
                let messages = [ChatMessage::user("first")];
                client
                    .send_chat(request(&messages, ProviderKind::Ollama, "llama3", &settings, &keys))
                    .await
            })
        };
        transport.started.notified().await;

        let second = {
            let client = client.clone();
            tokio::spawn(async move {
                let (settings, keys) = (Settings::default(), keys());
                let messages = [ChatMessage::user("second")];
                client
                    .send_chat(request(&messages, ProviderKind::Ollama, "llama3", &settings, &keys))
                    .await
            })
        };

        assert_eq!(first.await.unwrap().unwrap_err().kind, ErrorKind::Cancellation);
        transport.started.notified().await;
        client.cancel();
        assert_eq!(second.await.unwrap().unwrap_err().kind, ErrorKind::Cancellation);
    }

    #[tokio::test]
    async fn test_timeout_is_network_error() {
        let transport = Arc::new(FakeTransport::hanging());
        let client = LlmClient::new(transport);
        let settings = Settings {
            request_timeout_secs: 0,
            ..Settings::default()
        };
        let keys = keys();
        let messages = [ChatMessage::user("hi")];

        let err = client
            .send_chat(request(&messages, ProviderKind::Ollama, "llama3", &settings, &keys))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Network);
    }

    #[tokio::test]
    async fn test_fetch_models_filters() {
        let transport = Arc::new(FakeTransport::replying(
            r#"{"models":[{"name":"llama3.2:latest"},{"name":"all-minilm:latest"}]}"#,
        ));
        let client = LlmClient::new(transport.clone());

        let models = client
            .fetch_models(ProviderKind::Ollama, &Settings::default(), &ApiKeys::default())
            .await
            .unwrap();
        assert_eq!(models, ["llama3.2:latest"]);
        assert_eq!(
            transport.last_url.lock().unwrap().as_deref(),
            Some("http://localhost:11434/api/tags")
        );
    }
}
