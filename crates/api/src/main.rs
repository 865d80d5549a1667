//! Meridian command-line entry point.
//!
//! Usage:
//!   meridian serve --port 8080
//!   meridian --config meridian.toml analyze INTC --chat
//!
//! # Environment Variables
//!
//! - `OPENAI_API_KEY` - completion and embedding key
//! - `SERPER_API_KEY` - web search key
//! - `MERIDIAN_CONFIG` - config file path
//! - `MERIDIAN_BIND_ADDR` - server bind address (default: 127.0.0.1)

use clap::{Parser, Subcommand};
use meridian_api::{AppState, serve};
use meridian_common::{ChatTurn, preview};
use meridian_orchestrator::MeridianConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "meridian", version, about = "Multi-analyst equity research with manager review")]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, env = "MERIDIAN_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve {
        #[arg(short, long, default_value_t = 8080)]
        port: u16,

        #[arg(short, long, env = "MERIDIAN_BIND_ADDR", default_value = "127.0.0.1")]
        bind: String,
    },
    /// Analyze one subject and print the CIO memo
    Analyze {
        subject: String,

        /// Ask follow-up questions on stdin after indexing
        #[arg(long)]
        chat: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,meridian_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => {
            tracing::info!(path = %path.display(), "Loading configuration");
            MeridianConfig::from_file(path)?
        }
        None => {
            tracing::info!("Using default configuration");
            MeridianConfig::default()
        }
    };

    let state = Arc::new(AppState::from_config(&config)?);

    match cli.command {
        Command::Serve { port, bind } => {
            if bind == "0.0.0.0" {
                tracing::warn!("Binding to 0.0.0.0 exposes the API on every interface");
            }
            let addr: SocketAddr = format!("{bind}:{port}").parse()?;
            serve(state, addr).await?;
        }
        Command::Analyze { subject, chat } => {
            let (report, chunks) = state.analyze_and_index(&subject).await?;

            println!("{}", report.final_report);
            println!();
            for history in &report.revision_histories {
                println!("{}", history.summary());
            }
            tracing::info!(subject = %report.subject_id, chunks, "Report indexed");

            if chat {
                chat_loop(&state, &report.subject_id).await?;
            }
            state.orchestrator.shutdown().await;
        }
    }

    Ok(())
}

/// Read questions from stdin until EOF or "exit".
async fn chat_loop(state: &AppState, subject: &str) -> anyhow::Result<()> {
    println!("\nAsk about {subject} (\"exit\" to quit):");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut history: Vec<ChatTurn> = Vec::new();

    while let Some(line) = lines.next_line().await? {
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }

        let answer = state.chat.chat(subject, question, &history).await;
        println!("\n{answer}\n");
        tracing::debug!(answer = %preview(&answer, 80), "Chat answered");

        history.push(ChatTurn::user(question));
        history.push(ChatTurn::assistant(answer));
    }
    Ok(())
}
