//! Slash Commands
//!
//! Lines starting with `/` drive the session and settings; everything else
//! is sent to the model.

use std::path::PathBuf;

use ariko_core::{AgentError, ProviderKind, WorkMode};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command: /{0} (try /help)")]
    Unknown(String),

    #[error("/{command} expects {expected}")]
    Usage {
        command: &'static str,
        expected: &'static str,
    },

    #[error("{0}")]
    Invalid(String),
}

/// One line of user input
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Message(String),
    Command(Command),
}

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    NewSession,
    ListSessions,
    /// 1-based index into the session list
    SwitchSession(usize),
    DeleteSession(usize),
    RenameSession(String),
    ClearHistory,
    Models,
    Provider(ProviderKind),
    Model(String),
    Mode(WorkMode),
    DeleteTools(bool),
    Streaming(bool),
    Attach(String),
    Detach,
    Settings,
}

pub const HELP: &str = "\
Commands:
  /new                   start a new chat
  /sessions              list chats
  /switch <n>            switch to chat n
  /delete <n>            delete chat n
  /rename <name>         rename the current chat
  /clear                 delete every chat
  /models                fetch models for the current provider
  /provider <name>       openai | gemini | ollama
  /model <id>            select a model
  /mode <ask|agent>      switch work mode
  /delete-tools <on|off> allow DeleteFile and DeleteGameObject
  /stream <on|off>       stream responses
  /attach <path>         add a project file to the context
  /detach                clear attached context
  /settings              show current settings
  /quit                  exit
Ctrl-C cancels a running request.";

pub fn parse_input(line: &str) -> Result<Input, CommandError> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Input::Message(line.to_string()));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    let command = match name {
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        "new" => Command::NewSession,
        "sessions" | "history" => Command::ListSessions,
        "switch" => Command::SwitchSession(index(arg, "switch")?),
        "delete" => Command::DeleteSession(index(arg, "delete")?),
        "rename" => Command::RenameSession(required(arg, "rename", "a name")?),
        "clear" => Command::ClearHistory,
        "models" => Command::Models,
        "provider" => Command::Provider(
            required(arg, "provider", "openai, gemini or ollama")?
                .parse()
                .map_err(|e: AgentError| CommandError::Invalid(e.to_string()))?,
        ),
        "model" => Command::Model(required(arg, "model", "a model id")?),
        "mode" => Command::Mode(
            required(arg, "mode", "ask or agent")?
                .parse()
                .map_err(|e: AgentError| CommandError::Invalid(e.to_string()))?,
        ),
        "delete-tools" => Command::DeleteTools(switch(arg, "delete-tools")?),
        "stream" => Command::Streaming(switch(arg, "stream")?),
        "attach" => Command::Attach(required(arg, "attach", "a project path")?),
        "detach" => Command::Detach,
        "settings" => Command::Settings,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Input::Command(command))
}

fn required(arg: &str, command: &'static str, expected: &'static str) -> Result<String, CommandError> {
    if arg.is_empty() {
        return Err(CommandError::Usage { command, expected });
    }
    Ok(arg.to_string())
}

fn index(arg: &str, command: &'static str) -> Result<usize, CommandError> {
    match arg.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(CommandError::Usage {
            command,
            expected: "a chat number from /sessions",
        }),
    }
}

fn switch(arg: &str, command: &'static str) -> Result<bool, CommandError> {
    match arg {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        _ => Err(CommandError::Usage {
            command,
            expected: "on or off",
        }),
    }
}

/// Answer to a confirmation prompt; `None` means ask again
pub fn parse_confirmation(line: &str) -> Option<bool> {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Default location of per-project state
pub fn state_dir(project_root: &std::path::Path) -> PathBuf {
    project_root.join(".ariko")
}
