//! Terminal rendering of orchestrator events

use std::io::Write;

use ariko_core::{ChatEvent, ChatMessage, ResponseStatus, Role, ToolCall};
use tokio::sync::mpsc::UnboundedReceiver;

pub struct Renderer {
    events: UnboundedReceiver<ChatEvent>,
    /// A streamed answer is being printed on the current line
    streaming: bool,
}

impl Renderer {
    pub const fn new(events: UnboundedReceiver<ChatEvent>) -> Self {
        Self {
            events,
            streaming: false,
        }
    }

    pub async fn next_event(&mut self) -> Option<ChatEvent> {
        self.events.recv().await
    }

    /// Print everything already queued
    pub fn drain(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.render(event);
        }
    }

    pub fn render(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::ResponseDelta(delta) => {
                self.streaming = true;
                print!("{delta}");
                let _ = std::io::stdout().flush();
            }
            ChatEvent::MessageAdded(message) => self.message(&message),
            ChatEvent::Error(text) => {
                self.end_stream();
                eprintln!("error: {text}");
            }
            // The shell prompts once the turn pauses
            ChatEvent::ToolCallConfirmationRequested(_) => self.end_stream(),
            ChatEvent::ModelsFetched { provider, models } => {
                if models.is_empty() {
                    println!("No supported {provider} models found.");
                } else {
                    println!("{provider} models:");
                    for model in models {
                        println!("  {model}");
                    }
                }
            }
            ChatEvent::ResponseStatusChanged(ResponseStatus::Executing(tool)) => {
                println!("Running {tool}...");
            }
            ChatEvent::ResponseStatusChanged(status) => {
                tracing::debug!(?status, "Status changed");
            }
            ChatEvent::HistoryChanged | ChatEvent::ChatCleared | ChatEvent::ChatReloaded => {}
        }
    }

    fn message(&mut self, message: &ChatMessage) {
        // Errors are reported through `ChatEvent::Error`
        if message.is_error {
            return;
        }
        match message.role {
            Role::Assistant if self.streaming => self.end_stream(),
            Role::Assistant => println!("{}", message.content),
            Role::User if message.is_observation() => {
                for line in message.content.lines() {
                    println!("  | {line}");
                }
            }
            Role::User | Role::System => {}
        }
    }

    fn end_stream(&mut self) {
        if std::mem::take(&mut self.streaming) {
            println!();
        }
    }
}

/// Confirmation prompt for a proposed tool call
pub fn confirmation_text(call: &ToolCall, destructive: bool) -> String {
    let mut text = String::new();
    if !call.thought.is_empty() {
        text.push_str(&call.thought);
        text.push('\n');
    }
    let arguments = serde_json::to_string_pretty(&call.parameters).unwrap_or_default();
    text.push_str(&format!("Proposed action: {}\n{arguments}\n", call.tool_name));
    if destructive {
        text.push_str("Warning: this permanently deletes project content and cannot be undone.\n");
    }
    text.push_str("Allow? [y/n] ");
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(tool: &str, thought: &str) -> ToolCall {
        ToolCall {
            thought: thought.into(),
            tool_name: tool.into(),
            parameters: json!({"filePath": "Assets/Old.cs"}).as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn test_confirmation_text() {
        let text = confirmation_text(&call("ReadFile", "Check the file first"), false);
        assert!(text.starts_with("Check the file first\nProposed action: ReadFile\n"));
        assert!(text.contains("\"filePath\": \"Assets/Old.cs\""));
        assert!(!text.contains("Warning"));
        assert!(text.ends_with("Allow? [y/n] "));
    }

    #[test]
    fn test_destructive_call_is_flagged() {
        let text = confirmation_text(&call("DeleteFile", ""), true);
        assert!(text.starts_with("Proposed action: DeleteFile"));
        assert!(text.contains("Warning: this permanently deletes project content"));
        assert!(text.ends_with("Allow? [y/n] "));
    }
}
