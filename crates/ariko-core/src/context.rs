//! Editor Context
//!
//! Collaborators that supply the editor state (selected assets, attached
//! scripts, console errors) included in prompts.

use std::sync::RwLock;

/// One labelled piece of context
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextItem {
    pub label: String,
    pub content: String,
}

impl ContextItem {
    pub fn new(label: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            content: content.into(),
        }
    }
}

/// Supplies the current editor context
pub trait ContextProvider: Send + Sync {
    fn context_items(&self) -> Vec<ContextItem>;
}

/// A console error harvested from the host
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    pub error_text: String,
    pub stack_trace: String,
}

impl From<LogEntry> for ContextItem {
    fn from(entry: LogEntry) -> Self {
        let content = if entry.stack_trace.trim().is_empty() {
            entry.error_text
        } else {
            format!("{}\n{}", entry.error_text, entry.stack_trace)
        };
        Self::new("Console error", content)
    }
}

/// Reads console entries from the host given an opaque handle
pub trait ConsoleLog: Send + Sync {
    fn entry(&self, handle: u64) -> Option<LogEntry>;
}

/// Render items as the prompt's context block; empty when there are none
pub fn render_context(items: &[ContextItem]) -> String {
    if items.is_empty() {
        return String::new();
    }

    let mut block = String::from("## Context\n");
    for item in items {
        block.push_str(&format!("\n### {}\n```\n{}\n```\n", item.label, item.content));
    }
    block
}

/// In-process context store: callers attach and clear items explicitly
#[derive(Default)]
pub struct StaticContext {
    items: RwLock<Vec<ContextItem>>,
}

impl StaticContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, item: ContextItem) {
        self.items
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(item);
    }

    /// Attach the console entry behind `handle`; false when the host has none
    pub fn attach_log(&self, log: &dyn ConsoleLog, handle: u64) -> bool {
        match log.entry(handle) {
            Some(entry) => {
                self.attach(entry.into());
                true
            }
            None => {
                tracing::debug!(handle, "No console entry for handle");
                false
            }
        }
    }

    pub fn clear(&self) {
        self.items
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }
}

impl ContextProvider for StaticContext {
    fn context_items(&self) -> Vec<ContextItem> {
        self.items
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}
