//! Ariko terminal driver
//!
//! Interactive front end for the agent loop. Plain lines are chat messages,
//! slash commands manage chats and settings, and proposed tool calls are
//! confirmed with y/n.

mod commands;
mod handlers;
mod render;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ariko_core::{
    AgentOrchestrator, ApiKeys, InMemorySceneGraph, JsonHistoryFile, ProjectLayout, SessionStore,
    SettingsFile, StaticContext, ToolHost,
};
use ariko_runtime::LlmClient;

use crate::commands::{Input, parse_confirmation, parse_input, state_dir};
use crate::handlers::Flow;
use crate::render::Renderer;
use crate::state::Shell;

#[derive(Parser)]
#[command(name = "ariko")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "AI assistant for game projects", long_about = None)]
struct Args {
    /// Project root; tools may only touch its content folder
    #[arg(short, long, default_value = ".")]
    project_root: PathBuf,

    /// Settings file (defaults to <project>/.ariko/settings.json)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Chat history file (defaults to <project>/.ariko/history.json)
    #[arg(long)]
    history: Option<PathBuf>,

    /// Send one message, print the answer and exit
    #[arg(long)]
    one_shot: Option<String>,
}

type InputLines = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they stay out of the transcript
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();

    let args = Args::parse();
    let dir = state_dir(&args.project_root);

    let settings_file = SettingsFile::new(args.settings.unwrap_or_else(|| dir.join("settings.json")));
    let mut settings = settings_file.load();
    settings.fill_from_env();
    let keys = ApiKeys::from_env();

    let layout = ProjectLayout::new(&args.project_root, settings.content_dir.clone());
    let host = ToolHost::new(layout.clone(), Arc::new(InMemorySceneGraph::new()));
    let context = Arc::new(StaticContext::new());
    let history = JsonHistoryFile::new(args.history.unwrap_or_else(|| dir.join("history.json")));
    let sessions = SessionStore::with_persistence(settings.max_history_size, Arc::new(history));
    let client = Arc::new(LlmClient::with_reqwest()?);

    tracing::info!(
        provider = %settings.selected_provider,
        model = %settings.selected_model,
        mode = %settings.work_mode,
        "Starting Ariko"
    );

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let orchestrator = AgentOrchestrator::builder()
        .client(client)
        .host(host)
        .settings(settings)
        .keys(keys)
        .sessions(sessions)
        .context(context.clone())
        .build(tx)?;

    let mut shell = Shell {
        orchestrator,
        renderer: Renderer::new(rx),
        settings_file,
        layout,
        context,
    };
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if let Some(message) = args.one_shot {
        shell.send(&message).await;
        confirm_pending(&mut shell, &mut lines).await?;
        return Ok(());
    }

    println!("Ariko {} - /help for commands", env!("CARGO_PKG_VERSION"));
    loop {
        print_prompt();
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        match parse_input(&line) {
            Ok(Input::Message(text)) if text.is_empty() => {}
            Ok(Input::Message(text)) => {
                shell.send(&text).await;
                confirm_pending(&mut shell, &mut lines).await?;
            }
            Ok(Input::Command(command)) => {
                if shell.handle(command).await == Flow::Quit {
                    break;
                }
            }
            Err(e) => eprintln!("{e}"),
        }
    }

    Ok(())
}

/// Ask about each proposed tool call until the turn settles
async fn confirm_pending(shell: &mut Shell, lines: &mut InputLines) -> anyhow::Result<()> {
    while shell.orchestrator.pending_tool_call().is_some() {
        shell.ask_confirmation();
        let approved = loop {
            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = tokio::signal::ctrl_c() => None,
            };
            let Some(line) = line else {
                shell.cancel();
                return Ok(());
            };
            match parse_confirmation(&line) {
                Some(approved) => break approved,
                None => print_prompt_text("Please answer y or n: "),
            }
        };
        shell.respond(approved).await;
    }
    Ok(())
}

fn print_prompt() {
    print_prompt_text("> ");
}

fn print_prompt_text(text: &str) {
    use std::io::Write;
    print!("{text}");
    let _ = std::io::stdout().flush();
}
