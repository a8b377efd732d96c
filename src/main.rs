use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod ai;
mod app;
mod client;
mod config;
mod error;
mod handler;
mod server;
mod state;
mod tui;
mod ui;

use app::App;
use client::ChatClient;
use config::{Config, ServeOverrides, Settings};
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "chatbridge", version)]
#[command(about = "Chat with a remote endpoint from the terminal, or serve one")]
struct Cli {
    /// Chat endpoint to POST messages to
    #[arg(long, global = true)]
    url: Option<String>,
    /// Session identifier sent with every message
    #[arg(long, global = true)]
    session: Option<String>,
    /// Config file (defaults to <config dir>/chatbridge/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message and print the reply
    Send {
        /// Message text
        message: String,
    },
    /// Run the chat endpoint backed by a model provider
    Serve {
        /// Address to listen on (default 127.0.0.1:5000)
        #[arg(long)]
        bind: Option<String>,
        /// Model provider: gemini or ollama
        #[arg(long)]
        provider: Option<String>,
        /// Model name for the provider
        #[arg(long)]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Send { message }) => {
            init_logging(false)?;
            let settings = config.resolve(cli.url, cli.session);
            send_once(&settings, &message).await
        }
        Some(Commands::Serve { bind, provider, model }) => {
            init_logging(false)?;
            let overrides = ServeOverrides { bind, provider, model };
            let settings = config.resolve_serve(overrides, std::env::var("GEMINI_API_KEY").ok())?;
            server::run_server(settings).await?;
            Ok(ExitCode::SUCCESS)
        }
        None => {
            init_logging(true)?;
            run_tui(config.resolve(cli.url, cli.session)).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Logs go to a file while the TUI owns the terminal, to stderr otherwise
fn init_logging(to_file: bool) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chatbridge=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);

    if to_file {
        let path = config::log_file_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        builder.with_writer(Mutex::new(file)).with_ansi(false).init();
    } else {
        builder.with_writer(std::io::stderr).init();
    }

    Ok(())
}

async fn send_once(settings: &Settings, message: &str) -> Result<ExitCode> {
    let text = message.trim();
    if text.is_empty() {
        bail!("Nothing to send: message is empty");
    }

    let client = ChatClient::new(&settings.backend_url, &settings.session_id);
    tracing::info!(url = %client.url(), session = %client.session_id(), "sending message");

    match client.send(text).await {
        Ok(reply) => {
            println!("{}", reply);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            tracing::warn!(error = %e, "send failed");
            println!("{}", e.bubble_text());
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run_tui(settings: Settings) -> Result<()> {
    tracing::info!(url = %settings.backend_url, session = %settings.session_id, "starting chat");

    let mut events = EventHandler::new();
    let mut app = App::new(settings, events.sender());

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let result = run_app(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    result
}

async fn run_app(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event),
            None => break,
        }
    }

    if app.transcript.has_pending() {
        tracing::info!("quitting with a reply still in flight");
    }
    Ok(())
}
