//! Command Handlers

use std::future::Future;
use std::io::Write;

use ariko_core::{Canceller, ContextItem};

use crate::commands::{Command, HELP};
use crate::render::{Renderer, confirmation_text};
use crate::state::Shell;

/// Whether the loop keeps reading input
#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Run one orchestrator call, printing its events as they arrive.
/// Ctrl-C aborts the request in flight.
async fn drive<F>(work: F, canceller: &Canceller, renderer: &mut Renderer)
where
    F: Future<Output = ()>,
{
    tokio::pin!(work);
    let mut interrupted = false;
    loop {
        tokio::select! {
            () = &mut work => break,
            Some(event) = renderer.next_event() => renderer.render(event),
            result = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                match result {
                    Ok(()) => canceller.cancel(),
                    Err(e) => tracing::warn!("Could not listen for Ctrl-C: {}", e),
                }
            }
        }
    }
    renderer.drain();
}

impl Shell {
    pub async fn send(&mut self, text: &str) {
        let canceller = self.orchestrator.canceller();
        let settings = self.orchestrator.settings();
        let (provider, model) = (settings.selected_provider, settings.selected_model.clone());
        if model.is_empty() {
            eprintln!("error: no model selected, use /models and /model <id>");
            return;
        }
        drive(
            self.orchestrator.send_message(text, provider, &model),
            &canceller,
            &mut self.renderer,
        )
        .await;
    }

    pub async fn respond(&mut self, approved: bool) {
        let canceller = self.orchestrator.canceller();
        drive(
            self.orchestrator.respond_to_confirmation(approved),
            &canceller,
            &mut self.renderer,
        )
        .await;
    }

    /// Show the pending tool call and ask whether to run it
    pub fn ask_confirmation(&self) {
        let Some(call) = self.orchestrator.pending_tool_call() else {
            return;
        };
        let destructive = self.orchestrator.registry().is_destructive(&call.tool_name);
        print!("{}", confirmation_text(call, destructive));
        let _ = std::io::stdout().flush();
    }

    /// Drop the pending tool call without answering it
    pub fn cancel(&mut self) {
        self.orchestrator.cancel();
        self.renderer.drain();
    }

    pub async fn handle(&mut self, command: Command) -> Flow {
        match command {
            Command::Help => println!("{HELP}"),
            Command::Quit => return Flow::Quit,
            Command::NewSession => {
                self.orchestrator.new_session();
                println!("Started a new chat.");
            }
            Command::ListSessions => self.list_sessions(),
            Command::SwitchSession(n) => match self.session_at(n) {
                Some(id) => {
                    self.orchestrator.switch_session(&id);
                    self.print_transcript();
                }
                None => eprintln!("error: no chat #{n}"),
            },
            Command::DeleteSession(n) => match self.session_at(n) {
                Some(id) => {
                    self.orchestrator.delete_session(&id);
                    println!("Deleted chat #{n}.");
                }
                None => eprintln!("error: no chat #{n}"),
            },
            Command::RenameSession(name) => {
                let id = self.orchestrator.sessions().active_id().clone();
                self.orchestrator.rename_session(&id, &name);
            }
            Command::ClearHistory => {
                self.orchestrator.clear_history();
                println!("History cleared.");
            }
            Command::Models => {
                let canceller = self.orchestrator.canceller();
                let provider = self.orchestrator.settings().selected_provider;
                drive(
                    self.orchestrator.fetch_models(provider),
                    &canceller,
                    &mut self.renderer,
                )
                .await;
            }
            Command::Provider(provider) => {
                self.update_settings(|s| {
                    if s.selected_provider != provider {
                        s.selected_provider = provider;
                        s.selected_model.clear();
                    }
                });
                println!("Provider set to {provider}. Pick a model with /models and /model <id>.");
            }
            Command::Model(model) => {
                println!("Model set to {model}.");
                self.update_settings(|s| s.selected_model = model);
            }
            Command::Mode(mode) => {
                self.update_settings(|s| s.work_mode = mode);
                println!("{mode} mode.");
            }
            Command::DeleteTools(enabled) => {
                self.update_settings(|s| s.enable_delete_tools = enabled);
                println!("Tools: {}", self.orchestrator.registry().names().join(", "));
            }
            Command::Streaming(enabled) => self.update_settings(|s| s.use_streaming = enabled),
            Command::Attach(path) => self.attach(&path).await,
            Command::Detach => {
                self.context.clear();
                println!("Context cleared.");
            }
            Command::Settings => self.print_settings(),
        }
        self.renderer.drain();
        Flow::Continue
    }

    fn session_at(&self, n: usize) -> Option<ariko_core::SessionId> {
        self.orchestrator
            .sessions()
            .history()
            .get(n.checked_sub(1)?)
            .map(|session| session.id.clone())
    }

    fn list_sessions(&self) {
        let sessions = self.orchestrator.sessions();
        for (i, session) in sessions.history().iter().enumerate() {
            let marker = if &session.id == sessions.active_id() { '*' } else { ' ' };
            println!(
                "{marker} {}. {} ({} messages, {})",
                i + 1,
                session.name,
                session.len(),
                session.updated_at.format("%Y-%m-%d %H:%M")
            );
        }
    }

    fn print_transcript(&self) {
        let session = self.orchestrator.sessions().active();
        println!("== {} ==", session.name);
        for message in session.messages() {
            let who = if message.is_error { "error" } else { role_label(message) };
            println!("[{who}] {}", message.content);
        }
    }

    fn print_settings(&self) {
        let s = self.orchestrator.settings();
        let model = if s.selected_model.is_empty() { "<none>" } else { &s.selected_model };
        println!("mode:            {}", s.work_mode);
        println!("provider:        {}", s.selected_provider);
        println!("model:           {model}");
        println!("streaming:       {}", s.use_streaming);
        println!("delete tools:    {}", s.enable_delete_tools);
        println!("auto context:    {}", s.auto_context);
        println!("history size:    {}", s.max_history_size);
        println!("agent iterations: {}", s.max_agent_iterations);
        println!("request timeout: {}s", s.request_timeout_secs);
        println!("settings file:   {}", self.settings_file.path().display());
    }

    async fn attach(&mut self, raw: &str) {
        let path = match self.layout.resolve(raw) {
            Ok(path) => path,
            Err(message) => {
                eprintln!("{message}");
                return;
            }
        };
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let label = self.layout.display(&path);
                println!("Attached {label}.");
                self.context.attach(ContextItem::new(label, content));
                if !self.orchestrator.settings().auto_context {
                    println!("Auto context is off; enable it in the settings file to send attachments.");
                }
            }
            Err(e) => eprintln!("error: could not read {}: {e}", path.display()),
        }
    }
}

fn role_label(message: &ariko_core::ChatMessage) -> &'static str {
    match message.role {
        ariko_core::Role::User if message.is_observation() => "tool",
        ariko_core::Role::User => "you",
        ariko_core::Role::Assistant => "ariko",
        ariko_core::Role::System => "system",
    }
}
