//! Agent Orchestrator
//!
//! Drives the ask/agent request cycle for one chat window.
//!
//! ```text
//! Idle ──send_message──▶ Thinking ──plain text──▶ Idle
//!                           │
//!                       tool call
//!                           ▼
//!                 AwaitingConfirmation ──respond_to_confirmation──▶ Executing
//!                                                                      │
//!                                 Thinking ◀──────── observation ──────┘
//! ```
//!
//! Every state change and transcript update leaves through one event
//! channel. Confirmation is an external call, so nothing is locked while the
//! user decides.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc::UnboundedSender;

use crate::config::{ApiKeys, ProviderKind, Settings, WorkMode};
use crate::context::{ContextProvider, render_context};
use crate::error::{AgentError, ErrorKind, RequestError, RequestResult, Result};
use crate::message::ChatMessage;
use crate::parser::parse_tool_call;
use crate::provider::{ChatClient, ChatRequest};
use crate::session::{SessionId, SessionSignal, SessionStore};
use crate::tool::{ToolCall, ToolContext, ToolRegistry};
use crate::tools::ToolHost;

/// Observation recorded when the user rejects a proposed tool call
pub const DENIED_OBSERVATION: &str = "User denied the action";

/// What the orchestrator is doing right now
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseStatus {
    Idle,
    /// A model request is in flight
    Thinking,
    /// A tool call waits for `respond_to_confirmation`
    AwaitingConfirmation,
    /// The named tool is running
    Executing(String),
}

/// Outbound signal for the UI
#[derive(Clone, Debug)]
pub enum ChatEvent {
    ModelsFetched {
        provider: ProviderKind,
        models: Vec<String>,
    },
    MessageAdded(ChatMessage),
    HistoryChanged,
    ChatCleared,
    ChatReloaded,
    ResponseStatusChanged(ResponseStatus),
    /// User-facing failure description
    Error(String),
    ToolCallConfirmationRequested(ToolCall),
    /// Streamed text increment of the pending response
    ResponseDelta(String),
}

/// Provider, model and request count of the current user turn
struct Turn {
    provider: ProviderKind,
    model: String,
    requests: usize,
}

/// Aborts the orchestrator's in-flight work from another task.
///
/// Cancelling while a tool runs ends the turn once the tool returns.
#[derive(Clone)]
pub struct Canceller {
    client: Arc<dyn ChatClient>,
    cancelled: Arc<AtomicBool>,
}

impl Canceller {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.client.cancel();
    }
}

/// The confirm-execute-continue agent loop
pub struct AgentOrchestrator {
    client: Arc<dyn ChatClient>,
    settings: Settings,
    keys: ApiKeys,
    host: ToolHost,
    registry: ToolRegistry,
    sessions: SessionStore,
    context: Option<Arc<dyn ContextProvider>>,
    events: UnboundedSender<ChatEvent>,
    status: ResponseStatus,
    turn: Option<Turn>,
    pending: Option<ToolCall>,
    last_error: Option<ErrorKind>,
    /// Set by `cancel`, cleared when a turn starts or resumes
    cancelled: Arc<AtomicBool>,
}

impl AgentOrchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    pub const fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub const fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub const fn status(&self) -> &ResponseStatus {
        &self.status
    }

    /// Tool call waiting for confirmation, if any
    pub const fn pending_tool_call(&self) -> Option<&ToolCall> {
        self.pending.as_ref()
    }

    /// Failure class of the most recent failed request
    pub const fn last_error(&self) -> Option<ErrorKind> {
        self.last_error
    }

    pub fn canceller(&self) -> Canceller {
        Canceller {
            client: self.client.clone(),
            cancelled: self.cancelled.clone(),
        }
    }

    /// Replace the settings and rebuild the tool registry for the new mode
    pub fn update_settings(&mut self, settings: Settings) {
        self.registry = ToolRegistry::for_settings(&settings, &self.host);
        let signals = self.sessions.set_max_history_size(settings.max_history_size);
        self.settings = settings;
        self.emit_signals(&signals);
    }

    pub fn set_keys(&mut self, keys: ApiKeys) {
        self.keys = keys;
    }

    /// Start a user turn.
    ///
    /// Returns once the turn reaches a final answer, a failure, or a tool
    /// call awaiting confirmation.
    pub async fn send_message(&mut self, text: &str, provider: ProviderKind, model: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if self.pending.is_some() {
            self.emit(ChatEvent::Error(
                "Confirm or deny the proposed action before sending a new message.".into(),
            ));
            return;
        }

        self.cancelled.store(false, Ordering::SeqCst);
        self.append(ChatMessage::user(text));
        self.turn = Some(Turn {
            provider,
            model: model.to_string(),
            requests: 0,
        });

        if self.settings.work_mode == WorkMode::Agent {
            self.continue_turn().await;
        } else {
            self.ask().await;
        }
    }

    /// Resolve the pending tool call. No-op when nothing is pending.
    pub async fn respond_to_confirmation(&mut self, approved: bool) {
        let Some(call) = self.pending.take() else {
            tracing::debug!("Confirmation received with no pending tool call");
            return;
        };
        self.cancelled.store(false, Ordering::SeqCst);

        let observation = if approved {
            self.execute_tool(&call).await
        } else {
            tracing::info!(tool = %call.tool_name, "Tool call denied");
            DENIED_OBSERVATION.to_string()
        };

        // Recorded even when the turn was cancelled meanwhile
        self.append(ChatMessage::observation(observation));
        if self.cancelled.load(Ordering::SeqCst) {
            return self.fail(&RequestError::cancelled());
        }
        self.continue_turn().await;
    }

    /// Abort the in-flight work and drop any pending tool call
    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.client.cancel();
        if self.pending.take().is_some() {
            self.fail(&RequestError::cancelled());
        }
    }

    /// List a provider's models, emitting `ModelsFetched` or `Error`
    pub async fn fetch_models(&mut self, provider: ProviderKind) {
        match self
            .client
            .fetch_models(provider, &self.settings, &self.keys)
            .await
        {
            Ok(models) => {
                tracing::info!(provider = %provider, count = models.len(), "Models fetched");
                self.emit(ChatEvent::ModelsFetched { provider, models });
            }
            Err(e) => {
                tracing::warn!(provider = %provider, "Model listing failed: {}", e);
                self.last_error = Some(e.kind);
                self.emit(ChatEvent::Error(e.user_message()));
            }
        }
    }

    pub fn new_session(&mut self) {
        self.abandon_turn();
        let signals = self.sessions.new_session();
        self.emit_signals(&signals);
    }

    pub fn switch_session(&mut self, id: &SessionId) {
        if id != self.sessions.active_id() {
            self.abandon_turn();
        }
        let signals = self.sessions.switch_to(id);
        self.emit_signals(&signals);
    }

    pub fn delete_session(&mut self, id: &SessionId) {
        if id == self.sessions.active_id() {
            self.abandon_turn();
        }
        let signals = self.sessions.delete(id);
        self.emit_signals(&signals);
    }

    pub fn rename_session(&mut self, id: &SessionId, name: &str) {
        let signals = self.sessions.rename(id, name);
        self.emit_signals(&signals);
    }

    pub fn clear_history(&mut self) {
        self.abandon_turn();
        let signals = self.sessions.clear_all();
        self.emit_signals(&signals);
    }

    /// Ask mode: one request, one answer, no tools
    async fn ask(&mut self) {
        match self.request_model().await {
            Ok(text) => self.finish(text),
            Err(e) => self.fail(&e),
        }
    }

    /// Agent mode: request, then either finish or wait for confirmation
    async fn continue_turn(&mut self) {
        let Some(turn) = self.turn.as_ref() else {
            return;
        };

        let limit = self.settings.max_agent_iterations;
        if limit > 0 && turn.requests >= limit {
            let err = AgentError::MaxIterations(limit);
            tracing::warn!(limit, "Agent turn stopped at the iteration limit");
            self.turn = None;
            self.append(ChatMessage::error(err.user_message()));
            self.emit(ChatEvent::Error(err.user_message()));
            self.set_status(ResponseStatus::Idle);
            return;
        }

        let text = match self.request_model().await {
            Ok(text) => text,
            Err(e) => return self.fail(&e),
        };

        match parse_tool_call(&text, &self.registry) {
            Some(call) => {
                tracing::info!(tool = %call.tool_name, "Tool call proposed");
                self.pending = Some(call.clone());
                self.set_status(ResponseStatus::AwaitingConfirmation);
                self.emit(ChatEvent::ToolCallConfirmationRequested(call));
            }
            None => self.finish(text),
        }
    }

    async fn execute_tool(&mut self, call: &ToolCall) -> String {
        let Some(tool) = self.registry.get(&call.tool_name) else {
            tracing::warn!(tool = %call.tool_name, "Approved tool is no longer registered");
            return AgentError::ToolNotFound(call.tool_name.clone()).to_string();
        };
        if let Err(violation) = tool.schema().check_arguments(&call.parameters) {
            tracing::info!(tool = %call.tool_name, "Tool arguments rejected: {}", violation);
            return violation.to_string();
        }

        self.set_status(ResponseStatus::Executing(call.tool_name.clone()));
        let (provider, model) = self.turn.as_ref().map_or_else(
            || (self.settings.selected_provider, self.settings.selected_model.clone()),
            |turn| (turn.provider, turn.model.clone()),
        );
        let ctx = ToolContext {
            arguments: &call.parameters,
            provider,
            model: &model,
            settings: &self.settings,
            keys: &self.keys,
            client: self.client.as_ref(),
        };

        tracing::info!(tool = %call.tool_name, "Executing tool");
        tool.execute(&ctx).await
    }

    /// Issue one model request for the current turn
    async fn request_model(&mut self) -> RequestResult<String> {
        let Some(turn) = self.turn.as_mut() else {
            return Err(RequestError::unknown("no active turn"));
        };
        turn.requests += 1;
        let (provider, model) = (turn.provider, turn.model.clone());

        let messages = self.build_messages();
        self.set_status(ResponseStatus::Thinking);
        tracing::debug!(provider = %provider, model = %model, messages = messages.len(), "Requesting model response");

        let request = ChatRequest {
            messages: &messages,
            provider,
            model: &model,
            settings: &self.settings,
            keys: &self.keys,
        };

        if self.settings.use_streaming {
            let events = self.events.clone();
            let mut on_delta = move |delta: &str| {
                let _ = events.send(ChatEvent::ResponseDelta(delta.to_string()));
            };
            self.client.send_chat_streamed(request, &mut on_delta).await
        } else {
            self.client.send_chat(request).await
        }
    }

    /// System message followed by the active session's history
    fn build_messages(&self) -> Vec<ChatMessage> {
        let agent = self.settings.work_mode == WorkMode::Agent;
        let mut system = if agent {
            self.settings.agent_system_prompt.clone()
        } else {
            self.settings.system_prompt.clone()
        };

        if agent && !self.registry.is_empty() {
            system.push_str("\n\n");
            system.push_str(&self.registry.render_catalog_for_prompt());
        }

        if self.settings.auto_context {
            if let Some(context) = &self.context {
                let block = render_context(&context.context_items());
                if !block.is_empty() {
                    system.push_str("\n\n");
                    system.push_str(&block);
                }
            }
        }

        let history = self.sessions.active().messages();
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(system));
        messages.extend(history.iter().filter(|m| !m.is_error).cloned());
        messages
    }

    fn finish(&mut self, text: String) {
        self.turn = None;
        self.append(ChatMessage::assistant(text));
        self.set_status(ResponseStatus::Idle);
    }

    fn fail(&mut self, err: &RequestError) {
        if err.is_cancellation() {
            tracing::info!("Request cancelled");
        } else {
            tracing::warn!(kind = %err.kind, "Request failed: {}", err.message);
        }
        self.turn = None;
        self.pending = None;
        self.last_error = Some(err.kind);
        self.append(ChatMessage::error(err.user_message()));
        self.emit(ChatEvent::Error(err.user_message()));
        self.set_status(ResponseStatus::Idle);
    }

    /// Drop the current turn when its session goes out of view
    fn abandon_turn(&mut self) {
        self.turn = None;
        if self.pending.take().is_some() {
            tracing::info!("Pending tool call dropped");
        }
        if self.status != ResponseStatus::Idle {
            self.set_status(ResponseStatus::Idle);
        }
    }

    fn append(&mut self, message: ChatMessage) {
        let signals = self.sessions.append_message(message.clone());
        self.emit(ChatEvent::MessageAdded(message));
        self.emit_signals(&signals);
    }

    fn set_status(&mut self, status: ResponseStatus) {
        self.status = status.clone();
        self.emit(ChatEvent::ResponseStatusChanged(status));
    }

    fn emit_signals(&self, signals: &[SessionSignal]) {
        for signal in signals {
            self.emit(match signal {
                SessionSignal::Cleared => ChatEvent::ChatCleared,
                SessionSignal::Reloaded => ChatEvent::ChatReloaded,
                SessionSignal::HistoryChanged => ChatEvent::HistoryChanged,
            });
        }
    }

    fn emit(&self, event: ChatEvent) {
        // A closed receiver only means nobody is listening anymore
        let _ = self.events.send(event);
    }
}

/// Builder for [`AgentOrchestrator`]
pub struct OrchestratorBuilder {
    client: Option<Arc<dyn ChatClient>>,
    host: Option<ToolHost>,
    settings: Settings,
    keys: ApiKeys,
    sessions: Option<SessionStore>,
    context: Option<Arc<dyn ContextProvider>>,
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            client: None,
            host: None,
            settings: Settings::default(),
            keys: ApiKeys::default(),
            sessions: None,
            context: None,
        }
    }

    pub fn client(mut self, client: Arc<dyn ChatClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn host(mut self, host: ToolHost) -> Self {
        self.host = Some(host);
        self
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn keys(mut self, keys: ApiKeys) -> Self {
        self.keys = keys;
        self
    }

    /// Defaults to an in-memory store bounded by `max_history_size`
    pub fn sessions(mut self, sessions: SessionStore) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn context(mut self, context: Arc<dyn ContextProvider>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn build(self, events: UnboundedSender<ChatEvent>) -> Result<AgentOrchestrator> {
        let client = self
            .client
            .ok_or_else(|| AgentError::Config("Chat client is required".into()))?;
        let host = self
            .host
            .ok_or_else(|| AgentError::Config("Tool host is required".into()))?;
        let sessions = self
            .sessions
            .unwrap_or_else(|| SessionStore::new(self.settings.max_history_size));
        let registry = ToolRegistry::for_settings(&self.settings, &host);

        Ok(AgentOrchestrator {
            client,
            settings: self.settings,
            keys: self.keys,
            host,
            registry,
            sessions,
            context: self.context,
            events,
            status: ResponseStatus::Idle,
            turn: None,
            pending: None,
            last_error: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }
}
