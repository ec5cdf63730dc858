//! LLM Client Seam
//!
//! The orchestrator and AI-backed tools talk to providers only through
//! [`ChatClient`]. The HTTP implementation lives in `ariko-runtime`; tests
//! plug in scripted clients.

use async_trait::async_trait;

use crate::config::{ApiKeys, ProviderKind, Settings};
use crate::error::RequestResult;
use crate::message::ChatMessage;

/// Everything needed to issue one chat request
#[derive(Clone, Copy, Debug)]
pub struct ChatRequest<'a> {
    pub messages: &'a [ChatMessage],
    pub provider: ProviderKind,
    pub model: &'a str,
    pub settings: &'a Settings,
    pub keys: &'a ApiKeys,
}

/// Callback receiving each decoded text increment of a streamed response
pub type DeltaSink<'a> = dyn FnMut(&str) + Send + 'a;

/// Provider-agnostic chat client
///
/// One request is in flight per client: starting a request cancels any
/// prior one. Every call returns exactly once; a cancelled request returns a
/// `Cancellation`-kind error.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send a chat request and wait for the full response text
    async fn send_chat(&self, request: ChatRequest<'_>) -> RequestResult<String>;

    /// Send a chat request, feeding each text increment to `on_delta`.
    ///
    /// The returned value is the terminal result: the aggregated text, or
    /// the failure that ended the transfer.
    async fn send_chat_streamed(
        &self,
        request: ChatRequest<'_>,
        on_delta: &mut DeltaSink<'_>,
    ) -> RequestResult<String>;

    /// List the allow-listed models a provider offers
    async fn fetch_models(
        &self,
        provider: ProviderKind,
        settings: &Settings,
        keys: &ApiKeys,
    ) -> RequestResult<Vec<String>>;

    /// Abort the in-flight request, if any
    fn cancel(&self);
}
