//! # docqa CLI (`dqa`)
//!
//! The `dqa` binary is the primary interface for docqa. It provides
//! commands for database initialization, document ingestion, question
//! answering, summarization, retrieval introspection, and the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! dqa --config ./config/docqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dqa init` | Create the SQLite database and run schema migrations |
//! | `dqa ingest <path>` | Ingest a document file or a directory of documents |
//! | `dqa ask "<question>"` | Answer a question against ingested documents |
//! | `dqa summarize <source>` | Summarize one ingested document |
//! | `dqa search "<query>"` | Show ranked retrieval hits without answering |
//! | `dqa list` | Per-document chunk and page statistics |
//! | `dqa remove <source>` | Remove a document from the index |
//! | `dqa serve` | Start the JSON HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! dqa init --config ./config/docqa.toml
//!
//! # Ingest a paper, then a whole directory
//! dqa ingest ./papers/attention.pdf
//! dqa ingest ./papers
//!
//! # Ask across all documents, then scoped to one
//! dqa ask "What is the Bregman divergence?"
//! dqa ask "What does section 3 prove?" --source attention.pdf
//!
//! # Inspect retrieval directly
//! dqa search "convergence rate" --limit 8
//! ```

mod answer;
mod ask;
mod chunker;
mod classify;
mod completion;
mod config;
mod db;
mod embedding;
mod errors;
mod extract;
mod index;
mod ingest;
mod migrate;
mod models;
mod sanitize;
mod search;
mod server;
mod sources;
mod summarize;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// docqa CLI — question answering over uploaded technical documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(
    name = "dqa",
    about = "docqa — question answering over uploaded technical documents",
    version,
    long_about = "docqa ingests technical documents (PDF or text), chunks them with awareness \
    of mathematical content, indexes them for semantic retrieval with lexical fallback, and \
    answers questions grounded in the retrieved context via a hosted completion service."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables.
    /// This command is idempotent — running it multiple times is safe.
    Init,

    /// Ingest a document file or a directory of documents.
    ///
    /// Extracts per-page text, chunks it with technical-content awareness,
    /// embeds the chunks (or stores them for lexical search when no
    /// embedding model is available), and writes them to the index.
    /// Re-ingesting a file replaces its previous entries.
    Ingest {
        /// A .pdf/.txt/.md file, or a directory to walk for them.
        path: PathBuf,
    },

    /// Answer a question grounded in the ingested documents.
    Ask {
        /// The question.
        question: String,

        /// Restrict retrieval to one document (by file name).
        #[arg(long)]
        source: Option<String>,
    },

    /// Generate a summary of one ingested document.
    Summarize {
        /// Document file name as shown by `dqa list`.
        source: String,
    },

    /// Show ranked retrieval hits without calling the completion service.
    Search {
        /// The search query.
        query: String,

        /// Restrict to one document (by file name).
        #[arg(long)]
        source: Option<String>,

        /// Maximum number of hits to return.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Per-document chunk and page statistics.
    List,

    /// Remove a document and its index entries.
    Remove {
        /// Document file name as shown by `dqa list`.
        source: String,
    },

    /// Start the JSON HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { path } => {
            ingest::run_ingest(&cfg, &path).await?;
        }
        Commands::Ask { question, source } => {
            ask::run_ask(&cfg, &question, source).await?;
        }
        Commands::Summarize { source } => {
            summarize::run_summarize(&cfg, &source).await?;
        }
        Commands::Search {
            query,
            source,
            limit,
        } => {
            search::run_search(&cfg, &query, source, limit).await?;
        }
        Commands::List => {
            sources::run_list(&cfg).await?;
        }
        Commands::Remove { source } => {
            sources::run_remove(&cfg, &source).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
