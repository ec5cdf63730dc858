//! Test doubles shared by the unit tests

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::config::{ApiKeys, ProviderKind, Settings};
use crate::error::{RequestError, RequestResult};
use crate::message::ChatMessage;
use crate::provider::{ChatClient, ChatRequest, DeltaSink};

/// Chat client replaying queued responses and recording requests
pub struct ScriptedClient {
    responses: Mutex<VecDeque<RequestResult<String>>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
    cancels: AtomicUsize,
    /// `send_chat` parks until `cancel` instead of answering
    hold: bool,
    held: Notify,
    released: Notify,
}

impl ScriptedClient {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_results(responses.into_iter().map(|r| Ok(r.into())))
    }

    pub fn failing(error: RequestError) -> Self {
        Self::with_results([Err(error)])
    }

    pub fn with_results<I>(results: I) -> Self
    where
        I: IntoIterator<Item = RequestResult<String>>,
    {
        Self {
            responses: Mutex::new(results.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            cancels: AtomicUsize::new(0),
            hold: false,
            held: Notify::new(),
            released: Notify::new(),
        }
    }

    /// Make `send_chat` wait until `cancel` is called, then fail as cancelled.
    /// Streamed requests keep replaying the script.
    pub fn holding_send_chat(mut self) -> Self {
        self.hold = true;
        self
    }

    /// Resolves once a held `send_chat` has started
    pub async fn held_request(&self) {
        self.held.notified().await;
    }

    /// Message lists of every request received, in order
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    fn next(&self, request: &ChatRequest<'_>) -> RequestResult<String> {
        self.requests.lock().unwrap().push(request.messages.to_vec());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RequestError::unknown("no scripted response left")))
    }
}

#[async_trait]
impl ChatClient for ScriptedClient {
    async fn send_chat(&self, request: ChatRequest<'_>) -> RequestResult<String> {
        if !self.hold {
            return self.next(&request);
        }
        self.requests.lock().unwrap().push(request.messages.to_vec());
        self.held.notify_one();
        self.released.notified().await;
        Err(RequestError::cancelled())
    }

    async fn send_chat_streamed(
        &self,
        request: ChatRequest<'_>,
        on_delta: &mut DeltaSink<'_>,
    ) -> RequestResult<String> {
        let text = self.next(&request)?;
        let mid = text
            .char_indices()
            .nth(text.chars().count() / 2)
            .map_or(text.len(), |(i, _)| i);
        for part in [&text[..mid], &text[mid..]] {
            if !part.is_empty() {
                on_delta(part);
            }
        }
        Ok(text)
    }

    async fn fetch_models(
        &self,
        _provider: ProviderKind,
        _settings: &Settings,
        _keys: &ApiKeys,
    ) -> RequestResult<Vec<String>> {
        Ok(vec!["scripted-model".into()])
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        self.released.notify_one();
    }
}
