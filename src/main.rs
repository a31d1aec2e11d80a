//! llmask - ask a language model from the terminal.
//!
//! Sends a natural-language query to the configured backend and streams the
//! answer to stdout, with a live status line showing progress underneath.

mod config;
mod llm;
mod orchestrator;
mod query;
mod terminal;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::ColorChoice;
use llm::StreamingBackend;
use orchestrator::{Pacing, QueryOrchestrator};
use query::Query;
use std::io::{self, Write};
use std::process::Command as ProcessCommand;
use terminal::{OutputStyle, StatusLine};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "llmask")]
#[command(author, version, about = "Ask a language model from the terminal")]
#[command(long_about = "Streams a model's answer to your question straight into the terminal.\n\nRun without a query for an interactive prompt.")]
struct Cli {
    /// The question to ask. Omit for interactive mode.
    #[arg(value_name = "QUERY")]
    query: Option<String>,

    /// Override the configured model
    #[arg(short = 'm', long, value_name = "MODEL")]
    model: Option<String>,

    /// Print the final result as JSON after the response
    #[arg(long)]
    json: bool,

    /// Skip the pre-flight status pauses
    #[arg(long)]
    no_pacing: bool,

    /// When to use colour
    #[arg(long, value_enum, value_name = "WHEN")]
    color: Option<ColorChoice>,

    /// Log debug output to stderr
    #[arg(short = 'v', long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open configuration file in $EDITOR
    Config {
        /// Only print the configuration file path
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    match cli.command {
        Some(Commands::Config { path }) => handle_config(path),
        None => handle_query(cli).await,
    }
}

/// Route tracing output to stderr so it never lands on the status line.
fn init_logging(verbose: bool) -> Result<()> {
    let directive = if verbose { "llmask=debug" } else { "llmask=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(directive.parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .with_writer(io::stderr)
        .init();
    Ok(())
}

/// Handle query mode, single-shot or interactive.
async fn handle_query(cli: Cli) -> Result<()> {
    let config = config::Config::load().context("Failed to load configuration")?;
    info!(
        "Configured backend: {} (default model: {})",
        config.backend_type(),
        config.model_name()
    );
    let backend = llm::create_backend(&config.backend, &config.generation, cli.model.as_deref())?;
    info!("Using backend: {} ({})", backend.name(), backend.model());

    let pacing = if cli.no_pacing {
        Pacing::none()
    } else {
        Pacing::from(&config.pacing)
    };
    let style = OutputStyle::new(cli.color.unwrap_or(config.display.color).enabled());
    let orchestrator = QueryOrchestrator::new(backend, pacing, style);

    match cli.query {
        Some(text) => {
            if let Err(e) = run_query(&orchestrator, style, text, cli.json).await {
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
            Ok(())
        }
        None => interactive(&orchestrator, style, cli.json).await,
    }
}

/// Run a single query against stdout.
async fn run_query<B: StreamingBackend>(
    orchestrator: &QueryOrchestrator<B>,
    style: OutputStyle,
    text: String,
    json: bool,
) -> Result<()> {
    let query = Query::new(text)?;
    let mut stdout = io::stdout();
    let mut status = StatusLine::new(style);

    let result = orchestrator
        .process_query(&query, &mut status, &mut stdout)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    Ok(())
}

/// Prompt for queries until EOF or `exit`. One query runs at a time, and a
/// failed query does not end the session.
async fn interactive<B: StreamingBackend>(
    orchestrator: &QueryOrchestrator<B>,
    style: OutputStyle,
    json: bool,
) -> Result<()> {
    let backend = orchestrator.backend();
    println!(
        "{} {}",
        style.cyan("llmask"),
        style.gray(&format!("({}: {})", backend.name(), backend.model()))
    );
    println!("{}", style.dim("Ask a question, or type 'exit' to quit."));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", style.cyan(">"));
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        if let Err(e) = run_query(orchestrator, style, line.to_string(), json).await {
            eprintln!("Error: {:#}", e);
        }
    }
    Ok(())
}

/// Handle the config command.
fn handle_config(path_only: bool) -> Result<()> {
    let config_path = config::Config::config_path()?;

    if path_only {
        println!("{}", config_path.display());
        return Ok(());
    }

    // Create default config if it doesn't exist
    if !config_path.exists() {
        let default_config = config::Config::default();
        default_config.save()?;
        println!("Created default config at {}", config_path.display());
    }

    // Open in editor
    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    let status = ProcessCommand::new(&editor)
        .arg(&config_path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        eprintln!("Editor exited with non-zero status");
    }

    Ok(())
}
