//! Configuration
//!
//! [`Settings`] is an explicit value handed to each component at
//! construction. API keys live in [`ApiKeys`] so they are never written to
//! the settings file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

/// Default OpenAI-compatible API base
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default Gemini API base
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default local Ollama endpoint
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

const DEFAULT_SYSTEM_PROMPT: &str = "You are Ariko, an assistant embedded in the Unity Editor. \
Answer questions about the user's project, C# scripts and Unity APIs clearly and concisely. \
Use the provided context when it is relevant.";

const DEFAULT_AGENT_SYSTEM_PROMPT: &str = r#"You are Ariko, an agent embedded in the Unity Editor that can change the user's project.

When you need to act, reply with exactly one JSON block in this format:
```json
{"thought": "why this step is needed", "tool_name": "ToolName", "parameters": {"paramName": "value"}}
```

Every action is shown to the user for approval before it runs. The result is sent back to you as an observation.
Take one step at a time. When the task is finished, or no tool is needed, answer in plain text without a JSON block."#;

/// Whether tools are offered to the model
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkMode {
    /// Single request/response, no tools
    #[default]
    Ask,
    /// Tool-enabled loop
    Agent,
}

impl fmt::Display for WorkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ask => f.write_str("Ask"),
            Self::Agent => f.write_str("Agent"),
        }
    }
}

impl FromStr for WorkMode {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ask" => Ok(Self::Ask),
            "agent" => Ok(Self::Agent),
            other => Err(AgentError::Config(format!("unknown work mode '{other}'"))),
        }
    }
}

/// Supported LLM backends
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Gemini,
    Ollama,
}

impl ProviderKind {
    pub const ALL: [Self; 3] = [Self::OpenAi, Self::Gemini, Self::Ollama];
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAi => f.write_str("OpenAI"),
            Self::Gemini => f.write_str("Google"),
            Self::Ollama => f.write_str("Ollama"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "gemini" | "google" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            other => Err(AgentError::Config(format!("unknown provider '{other}'"))),
        }
    }
}

/// Editor-wide assistant settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub work_mode: WorkMode,

    /// Register DeleteFile/DeleteGameObject in agent mode
    pub enable_delete_tools: bool,

    /// Number of sessions kept in history; 0 means unbounded
    pub max_history_size: usize,

    /// Model requests allowed per user turn in agent mode
    pub max_agent_iterations: usize,

    pub request_timeout_secs: u64,

    pub use_streaming: bool,

    pub selected_provider: ProviderKind,

    pub selected_model: String,

    pub openai_base_url: String,

    pub gemini_base_url: String,

    /// Local model endpoint
    pub ollama_url: String,

    pub system_prompt: String,

    pub agent_system_prompt: String,

    /// Include editor context (selection, attached files) in prompts
    pub auto_context: bool,

    /// Designated content root under the project, e.g. `Assets`
    pub content_dir: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            work_mode: WorkMode::Ask,
            enable_delete_tools: false,
            max_history_size: 20,
            max_agent_iterations: 10,
            request_timeout_secs: 30,
            use_streaming: true,
            selected_provider: ProviderKind::OpenAi,
            selected_model: String::new(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.into(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.into(),
            ollama_url: DEFAULT_OLLAMA_URL.into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            agent_system_prompt: DEFAULT_AGENT_SYSTEM_PROMPT.into(),
            auto_context: true,
            content_dir: "Assets".into(),
        }
    }
}

impl Settings {
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Fill empty values from the process environment
    pub fn fill_from_env(&mut self) {
        self.fill_from(|key| std::env::var(key).ok());
    }

    /// Fill empty values from `lookup`; non-empty values are kept
    pub fn fill_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.ollama_url.trim().is_empty() {
            if let Some(url) = non_empty(lookup("OLLAMA_URL")) {
                self.ollama_url = url;
            }
        }
    }
}

/// Provider credentials
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ApiKeys {
    pub openai: String,
    pub google: String,
}

impl fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeys")
            .field("openai", &redact(&self.openai))
            .field("google", &redact(&self.google))
            .finish()
    }
}

impl ApiKeys {
    /// Keys from `OPENAI_API_KEY` and `GOOGLE_API_KEY` (or `GEMINI_API_KEY`)
    pub fn from_env() -> Self {
        let mut keys = Self::default();
        keys.fill_from(|key| std::env::var(key).ok());
        keys
    }

    /// Fill empty keys from `lookup`; non-empty keys are kept
    pub fn fill_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.openai.trim().is_empty() {
            if let Some(key) = non_empty(lookup("OPENAI_API_KEY")) {
                self.openai = key;
            }
        }
        if self.google.trim().is_empty() {
            if let Some(key) =
                non_empty(lookup("GOOGLE_API_KEY")).or_else(|| non_empty(lookup("GEMINI_API_KEY")))
            {
                self.google = key;
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

const fn redact(value: &str) -> &'static str {
    if value.is_empty() { "<empty>" } else { "<set>" }
}

/// Settings persisted as JSON at a fixed path
pub struct SettingsFile {
    path: PathBuf,
}

impl SettingsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings; a missing or unreadable file yields defaults
    pub fn load(&self) -> Settings {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                tracing::warn!(path = %self.path.display(), "Settings file is invalid, using defaults: {}", e);
                Settings::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Settings::default(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Could not read settings, using defaults: {}", e);
                Settings::default()
            }
        }
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}
