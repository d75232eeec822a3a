//! # Curriculum RAG CLI (`crag`)
//!
//! Serves the chat API and offers offline access to the same pipeline.
//!
//! ## Usage
//!
//! ```bash
//! crag --config ./config/crag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `crag serve` | Ingest markdown, open the index, start the HTTP/WebSocket server |
//! | `crag rebuild` | Clear the index and re-embed every markdown file |
//! | `crag search "<query>"` | Print the most similar chunks |
//! | `crag ask "<question>"` | Run one question through the full answer pipeline |
//! | `crag config` | Print the resolved configuration with credentials masked |
//!
//! ## Examples
//!
//! ```bash
//! # Start the server on the configured address
//! crag serve
//!
//! # Re-index after editing the curriculum files
//! crag rebuild --config ./config/crag.toml
//!
//! # Inspect retrieval for a question
//! crag search "linear algebra" -k 5
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use curriculum_rag::chat::ChatService;
use curriculum_rag::config::{self, Config};
use curriculum_rag::embedding::select_embedder;
use curriculum_rag::index::VectorIndex;
use curriculum_rag::ingest::{load_documents, scan_markdown};
use curriculum_rag::providers::truncate_chars;
use curriculum_rag::{server, telemetry};

/// Curriculum RAG: retrieval-augmented answers over a markdown curriculum.
#[derive(Parser)]
#[command(
    name = "crag",
    about = "Curriculum RAG: a retrieval-augmented Q&A service over markdown documentation",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). A missing file means defaults.
    #[arg(long, global = true, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest documents, open the index, and start the server.
    Serve,

    /// Clear the index and re-embed every markdown file.
    Rebuild,

    /// Print the chunks most similar to a query.
    Search {
        query: String,

        /// Number of results (defaults to `retrieval.search_k`).
        #[arg(short = 'k', long)]
        k: Option<usize>,
    },

    /// Answer one question through the provider chain.
    Ask {
        question: String,

        /// Session id to continue (only meaningful within one process).
        #[arg(long)]
        session: Option<String>,
    },

    /// Print the resolved configuration.
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&cfg.masked())?);
        }
        Commands::Serve => {
            cfg.ensure_directories()?;
            telemetry::init(Some(cfg.paths.log_dir.as_path()))?;
            server::run_server(&cfg).await?;
        }
        Commands::Rebuild => {
            cfg.ensure_directories()?;
            telemetry::init(Some(cfg.paths.log_dir.as_path()))?;
            run_rebuild(&cfg).await?;
        }
        Commands::Search { query, k } => {
            telemetry::init(None)?;
            run_search(&cfg, &query, k.unwrap_or(cfg.retrieval.search_k)).await?;
        }
        Commands::Ask { question, session } => {
            telemetry::init(None)?;
            run_ask(&cfg, &question, session.as_deref()).await?;
        }
    }

    Ok(())
}

/// Index opened (and seeded when empty) from the configured markdown directory.
async fn open_index(cfg: &Config) -> Result<Arc<VectorIndex>> {
    cfg.ensure_directories()?;
    let chunks = load_documents(&cfg.paths.markdown_dir, &cfg.chunking);
    let embedder = select_embedder(cfg).await;
    let index = Arc::new(VectorIndex::from_config(embedder, cfg));
    index.create_or_load(&chunks).await;
    Ok(index)
}

async fn run_rebuild(cfg: &Config) -> Result<()> {
    cfg.ensure_directories()?;
    let files = scan_markdown(&cfg.paths.markdown_dir)?;
    let chunks = load_documents(&cfg.paths.markdown_dir, &cfg.chunking);

    let embedder = select_embedder(cfg).await;
    let index = VectorIndex::from_config(embedder, cfg);
    index.create_or_load(&[]).await;
    if index.backend_kind().await != "sqlite" {
        bail!(
            "cannot open index file {}; nothing was rebuilt",
            index.index_file().display()
        );
    }
    let added = index.rebuild(&chunks).await?;

    println!("Rebuild complete:");
    println!("  files:     {}", files.len());
    println!("  chunks:    {}", chunks.len());
    println!("  indexed:   {}", added);
    println!("  embedder:  {}", index.embedder_name());
    println!("  index:     {}", index.index_file().display());
    Ok(())
}

async fn run_search(cfg: &Config, query: &str, k: usize) -> Result<()> {
    let index = open_index(cfg).await?;
    let results = index.similarity_search(query, k.max(1)).await;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (i, result) in results.iter().enumerate() {
        let preview = truncate_chars(&result.content, 200).replace('\n', " ");
        println!("{}. {}", i + 1, result.source());
        println!("   {}", preview);
    }
    Ok(())
}

async fn run_ask(cfg: &Config, question: &str, session: Option<&str>) -> Result<()> {
    let index = open_index(cfg).await?;
    let chat = ChatService::from_config(index, cfg);
    let answer = chat.answer(question, session).await?;

    println!("{}", answer.response);
    if !answer.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &answer.sources {
            println!("  - {}", source);
        }
    }
    println!();
    println!("session: {}", answer.session_id);
    Ok(())
}
