//! # Campus Assist CLI (`assist`)
//!
//! Ask questions against the knowledge base, inspect retrieval, and run the
//! HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! assist --config ./config/assist.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `assist ask "<message>"` | Answer one question through the full pipeline |
//! | `assist search "<query>"` | Show ranked knowledge-base matches |
//! | `assist status` | Knowledge-base size and configured providers |
//! | `assist serve` | Start the HTTP API |
//!
//! Edits to the config file apply to the next request without a restart,
//! except `[knowledge]` and `[server].bind`, which are read once at startup.
//!
//! Logs go to stderr (`RUST_LOG` overrides the default `info` level), so
//! stdout carries only command output.

use anyhow::{Context, Result};
use campus_assist::assistant::Assistant;
use campus_assist::server;
use campus_assist_core::models::{LangHint, Query};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "assist",
    about = "Campus Assist: student-services question answering over a local knowledge base",
    version
)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when it does not exist.
    #[arg(long, global = true, default_value = "./config/assist.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question.
    Ask {
        message: String,

        /// Language hint: ar, en, or fr.
        #[arg(long, value_parser = parse_hint)]
        lang: Option<LangHint>,

        /// Conversation id recorded in logs.
        #[arg(long)]
        conversation: Option<String>,

        /// Print the full JSON result instead of the answer text.
        #[arg(long)]
        json: bool,
    },

    /// Show ranked knowledge-base matches for a query.
    Search {
        query: String,

        /// Restrict to entries in this language (ar or en).
        #[arg(long, value_parser = parse_hint)]
        lang: Option<LangHint>,

        #[arg(long, default_value_t = 5)]
        limit: usize,
    },

    /// Show knowledge-base and provider status.
    Status,

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

fn parse_hint(s: &str) -> Result<LangHint, String> {
    LangHint::parse(s).ok_or_else(|| format!("invalid language '{}': expected ar, en, or fr", s))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let assistant = Arc::new(Assistant::from_config_file(&cli.config)?);

    match cli.command {
        Commands::Ask {
            message,
            lang,
            conversation,
            json,
        } => {
            let mut query = Query::new(message);
            if let Some(hint) = lang {
                query = query.with_hint(hint);
            }
            if let Some(id) = conversation {
                query = query.with_conversation(id);
            }
            let result = assistant.answer(&query)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", result.answer);
                if !result.sources.is_empty() {
                    println!();
                    for (i, source) in result.sources.iter().enumerate() {
                        println!("[{}] {} ({})", i + 1, source.title, source.url);
                    }
                }
            }
        }
        Commands::Search { query, lang, limit } => {
            let hits = assistant.search(&query, lang.and_then(|h| h.as_lang()), limit)?;
            if hits.is_empty() {
                println!("No results.");
                return Ok(());
            }
            for (i, hit) in hits.iter().enumerate() {
                println!("{}. [{:.2}] {}", i + 1, hit.similarity, hit.title);
                if !hit.url.is_empty() {
                    println!("    url: {}", hit.url);
                }
                println!("    excerpt: \"{}\"", hit.excerpt.replace('\n', " ").trim());
                println!("    id: {}", hit.id);
                println!();
            }
        }
        Commands::Status => {
            println!("{}", serde_json::to_string_pretty(&assistant.status())?);
        }
        Commands::Serve => {
            let bind = assistant.settings().config.server.bind.clone();
            let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
            runtime.block_on(server::run_server(assistant.clone(), &bind))?;
        }
    }

    Ok(())
}
