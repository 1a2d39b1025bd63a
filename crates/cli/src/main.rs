//! # memento-cli: A terminal client for `memento-server`
//!
//! Chat with the data assistant, ask one-shot questions, load table metadata
//! into the catalog and print the controller's state graph.

mod api_client;
mod ui;

use anyhow::{Context, Result};
use api_client::ApiClient;
use clap::{Parser, Subcommand};
use memento::types::TableDocument;
use std::fs::File;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

// --- CLI Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Base URL of the memento server
    #[arg(
        long,
        env = "MEMENTO_SERVER_URL",
        default_value = "http://localhost:9090",
        global = true
    )]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start an interactive conversation
    Chat(ChatArgs),
    /// Ask a single question and print the answer
    Ask(AskArgs),
    /// Load table metadata documents (a JSON array) into the catalog
    Ingest(IngestArgs),
    /// Print the controller state graph as Mermaid
    Graph,
}

#[derive(Parser, Debug)]
struct ChatArgs {
    /// Continue an existing thread instead of starting a new one
    #[arg(long)]
    thread_id: Option<String>,
    /// Show plan, tool calls and SQL under each answer
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct AskArgs {
    question: String,
    #[arg(long)]
    thread_id: Option<String>,
    #[arg(short, long)]
    verbose: bool,
    /// Print the raw structured turn as JSON
    #[arg(long, conflicts_with = "verbose")]
    json: bool,
}

#[derive(Parser, Debug)]
struct IngestArgs {
    file: PathBuf,
}

// --- Main Application Entry ---

#[tokio::main]
async fn main() -> Result<()> {
    // Log to a file so the conversation output stays clean.
    let log_file = File::create("memento-cli.log")?;
    let subscriber = fmt::Subscriber::builder()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let client = ApiClient::new(cli.server.clone());

    let result = match cli.command {
        Commands::Chat(args) => handle_chat(&client, args).await,
        Commands::Ask(args) => handle_ask(&client, args).await,
        Commands::Ingest(args) => handle_ingest(&client, args).await,
        Commands::Graph => client.graph().await.map(|graph| print!("{graph}")),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

// --- Command Handlers ---

async fn handle_chat(client: &ApiClient, args: ChatArgs) -> Result<()> {
    let mut thread_id = args
        .thread_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    info!(thread_id = %thread_id, "Starting chat session");
    println!("Thread {thread_id}. Type /reset to start over, /exit to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        match message {
            "" => continue,
            "/exit" | "/quit" => break,
            "/reset" => {
                client.reset(&thread_id).await?;
                thread_id = Uuid::new_v4().to_string();
                println!("Started new thread {thread_id}.");
            }
            _ => match client.chat(message, &thread_id).await {
                Ok(turn) => println!("{}", ui::format_turn(&turn, args.verbose)),
                // A failed turn should not end the session.
                Err(e) => eprintln!("Error: {e:#}"),
            },
        }
    }
    Ok(())
}

async fn handle_ask(client: &ApiClient, args: AskArgs) -> Result<()> {
    let thread_id = args
        .thread_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let turn = client.chat(&args.question, &thread_id).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&turn)?);
    } else {
        println!("{}", ui::format_turn(&turn, args.verbose));
    }
    Ok(())
}

async fn handle_ingest(client: &ApiClient, args: IngestArgs) -> Result<()> {
    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read '{}'", args.file.display()))?;
    let documents: Vec<TableDocument> = serde_json::from_str(&content)
        .with_context(|| format!("'{}' is not a JSON array of table documents", args.file.display()))?;
    info!("Ingesting {} table documents from {}", documents.len(), args.file.display());

    let report = client.ingest_catalog(&documents).await?;
    println!(
        "Ingested {} tables ({} embedded).",
        report.tables_processed, report.documents_embedded
    );
    Ok(())
}
