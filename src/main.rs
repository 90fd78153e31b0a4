//! # docchat CLI
//!
//! The `docchat` binary drives the library: it creates the databases,
//! uploads and deletes documents, and answers questions against them.
//!
//! ## Usage
//!
//! ```bash
//! docchat --config ./config/docchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat init` | Create both SQLite databases and run migrations |
//! | `docchat upload <path>` | Ingest a file or every matching file under a directory |
//! | `docchat documents` | List uploaded documents, newest first |
//! | `docchat delete <file_id>` | Remove a document's chunks and record |
//! | `docchat chat "<question>"` | Answer a question, optionally continuing a session |
//! | `docchat history <session>` | Print the turns of a session |
//! | `docchat search "<query>"` | Raw vector retrieval for debugging |
//! | `docchat stats` | Counts and consistency check |
//!
//! Logs go to stderr. The default level is `warn`, `--verbose` raises it to
//! `info`, and `RUST_LOG` overrides both.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docchat::chat::{self, ChatRequest};
use docchat::context::AppContext;
use docchat::delete::{self, DeleteOutcome};
use docchat::{config, ingest, migrate, stats};

#[derive(Parser)]
#[command(
    name = "docchat",
    about = "Ask questions about your documents",
    version
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = "./config/docchat.toml")]
    config: PathBuf,

    /// Log progress at info level.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the catalog and vector index databases.
    ///
    /// Idempotent: running it against existing databases is a no-op.
    Init,

    /// Upload a file, or every matching file under a directory.
    ///
    /// Each file is registered in the catalog, chunked, embedded, and
    /// indexed. A failed file is rolled back; the command exits non-zero
    /// if any file failed.
    Upload {
        /// File or directory to upload.
        path: PathBuf,
    },

    /// List uploaded documents, newest first.
    Documents,

    /// Delete a document's chunks and catalog record.
    Delete {
        /// Catalog file id, as printed by `upload` or `documents`.
        file_id: i64,
    },

    /// Answer a question using the uploaded documents.
    Chat {
        /// The question.
        question: String,

        /// Continue an existing session. A new one is started when omitted.
        #[arg(long)]
        session: Option<String>,

        /// Model name from `[generation].models`.
        #[arg(long)]
        model: Option<String>,
    },

    /// Print the turns of a session in order.
    History {
        /// Session id, as printed by `chat`.
        session: String,
    },

    /// Retrieve the chunks most similar to a query.
    Search {
        query: String,

        /// Number of chunks to return. Defaults to `[retrieval].top_k`.
        #[arg(long)]
        limit: Option<usize>,

        /// Restrict results to one document.
        #[arg(long)]
        file_id: Option<i64>,
    },

    /// Show document, chunk, and turn counts and check store consistency.
    Stats,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    if let Commands::Init = cli.command {
        migrate::run_migrations(&cfg).await?;
        println!("Databases initialized successfully.");
        return Ok(());
    }

    let ctx = AppContext::from_config(&cfg)
        .await
        .context("Failed to open stores (did you run `docchat init`?)")?;

    match cli.command {
        Commands::Init => {}
        Commands::Upload { path } => {
            let paths = ingest::collect_upload_paths(&path, &cfg.upload)?;
            if paths.is_empty() {
                bail!("No matching files under {}", path.display());
            }

            let mut failed = 0usize;
            for file in &paths {
                match ingest::ingest_file(&ctx, file).await {
                    Ok(report) => println!(
                        "uploaded {} (file_id {}, {} chunks)",
                        report.filename, report.file_id, report.chunks
                    ),
                    Err(err) => {
                        failed += 1;
                        eprintln!("failed {} [{}]: {}", file.display(), err.outcome(), err);
                    }
                }
            }

            if failed > 0 {
                bail!("{} of {} file(s) failed to upload", failed, paths.len());
            }
        }
        Commands::Documents => {
            let documents = ctx.catalog.get_documents().await?;
            if documents.is_empty() {
                println!("No documents.");
            }
            for doc in documents {
                println!(
                    "{:>6}  {}  {}",
                    doc.file_id,
                    doc.upload_timestamp.format("%Y-%m-%d %H:%M:%S"),
                    doc.filename
                );
            }
        }
        Commands::Delete { file_id } => match delete::delete_document(&ctx, file_id).await {
            Ok(DeleteOutcome::Deleted {
                chunks_removed,
                document_removed,
                ..
            }) => {
                println!(
                    "deleted file_id {} ({} chunks, record {})",
                    file_id,
                    chunks_removed,
                    if document_removed { "removed" } else { "absent" }
                );
            }
            Ok(DeleteOutcome::NothingToDelete { .. }) => {
                println!("nothing to delete for file_id {}", file_id);
            }
            Err(err) => bail!("delete failed [{}]: {}", err.outcome(), err),
        },
        Commands::Chat {
            question,
            session,
            model,
        } => {
            let response = chat::chat(
                &ctx,
                &ChatRequest {
                    question,
                    session_id: session,
                    model,
                },
            )
            .await?;

            println!("{}", response.answer);
            println!();
            println!("session: {}", response.session_id);
            println!("model:   {}", response.model);
            for hit in &response.sources {
                println!(
                    "source:  file_id {} chunk {} (score {:.3})",
                    hit.chunk.file_id, hit.chunk.chunk_index, hit.score
                );
            }
        }
        Commands::History { session } => {
            let turns = ctx.catalog.get_turns(&session).await?;
            if turns.is_empty() {
                println!("No turns for session {}.", session);
            }
            for turn in turns {
                println!(
                    "[{}] {} ({})",
                    turn.seq,
                    turn.created_at.format("%Y-%m-%d %H:%M:%S"),
                    turn.model
                );
                println!("  Q: {}", turn.user_query);
                println!("  A: {}", turn.response);
            }
        }
        Commands::Search {
            query,
            limit,
            file_id,
        } => {
            let limit = limit.unwrap_or(ctx.top_k);
            let hits = chat::search(&ctx, &query, limit, file_id).await?;
            if hits.is_empty() {
                println!("No results.");
            }
            for (i, hit) in hits.iter().enumerate() {
                let snippet: String = hit.chunk.text.chars().take(160).collect();
                println!(
                    "{}. [{:.3}] file_id {} chunk {}",
                    i + 1,
                    hit.score,
                    hit.chunk.file_id,
                    hit.chunk.chunk_index
                );
                println!("    {}", snippet.replace('\n', " "));
            }
        }
        Commands::Stats => {
            stats::run_stats(&cfg, &ctx).await?;
        }
    }

    Ok(())
}
