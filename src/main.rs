//! # Quarry CLI (`quarry`)
//!
//! The `quarry` binary ingests documents into a local vector index and
//! answers questions from them.
//!
//! ## Usage
//!
//! ```bash
//! quarry --config ./config/quarry.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `quarry ingest [PATH...]` | Load, chunk, embed and index documents |
//! | `quarry ask "<question>"` | Answer one question with sources |
//! | `quarry chat` | Answer questions from stdin until `quit` |
//! | `quarry search "<question>"` | Show the retrieved chunks only |
//! | `quarry stats` | Summarize the index |
//! | `quarry completions <shell>` | Print a shell completion script |
//!
//! ## Examples
//!
//! ```bash
//! # Index everything under ingest.root
//! quarry ingest
//!
//! # Index two folders, showing JSON progress on stderr
//! quarry ingest ./handbook ./papers --progress json
//!
//! # Ask with five retrieved chunks, as JSON
//! quarry ask "How do I rotate the API keys?" --k 5 --json
//! ```

use std::io;
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

use quarry::progress::ProgressMode;
use quarry::{ask, config, ingest, stats};

/// Quarry: ask questions of your documents.
///
/// All commands except `completions` read a TOML configuration file given
/// by `--config`.
#[derive(Parser)]
#[command(
    name = "quarry",
    about = "Quarry: a local retrieval-augmented generation engine",
    version,
    long_about = "Quarry ingests text and PDF documents into a local vector index and answers \
    questions from the most relevant passages, citing the files and pages it used."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/quarry.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest documents into the index.
    ///
    /// Walks the given files and directories (default: `ingest.root`),
    /// loads supported formats, chunks and embeds them, and appends the
    /// chunks to the index. Files that fail are listed in the report and
    /// do not stop the batch.
    Ingest {
        /// Files or directories to ingest.
        paths: Vec<PathBuf>,

        /// Load and chunk only; report counts without embedding or writing.
        #[arg(long)]
        dry_run: bool,

        /// Progress on stderr: `auto` (human when stderr is a TTY), `off`,
        /// `human`, or `json`.
        #[arg(long, default_value = "auto", value_parser = ["auto", "off", "human", "json"])]
        progress: String,
    },

    /// Answer a question from the indexed documents.
    Ask {
        question: String,

        /// Number of chunks to retrieve (default: `retrieval.k`).
        #[arg(long)]
        k: Option<usize>,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Interactive question answering on stdin.
    Chat {
        /// Number of chunks to retrieve (default: `retrieval.k`).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Show the chunks retrieved for a question, without generating.
    Search {
        question: String,

        /// Number of chunks to retrieve (default: `retrieval.k`).
        #[arg(long)]
        k: Option<usize>,

        /// Print the hits as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Summarize the index.
    Stats {
        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print a shell completion script to stdout.
    Completions {
        shell: Shell,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Commands that don't require config
    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "quarry", &mut io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    let ok = match cli.command {
        Commands::Ingest {
            paths,
            dry_run,
            progress,
        } => {
            let mode = ProgressMode::from_flag(&progress)
                .ok_or_else(|| anyhow::anyhow!("invalid --progress value: {}", progress))?;
            ingest::run_ingest(&cfg, &paths, dry_run, mode)?;
            true
        }
        Commands::Ask { question, k, json } => ask::run_ask(&cfg, &question, k, json)?,
        Commands::Chat { k } => {
            ask::run_chat(&cfg, k)?;
            true
        }
        Commands::Search { question, k, json } => ask::run_search(&cfg, &question, k, json)?,
        Commands::Stats { json } => {
            stats::run_stats(&cfg, json)?;
            true
        }
        Commands::Completions { .. } => true,
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
