//! logtail
//!
//! Tails an append-only record log into a Tantivy index, keeping a durable
//! cursor in the index so a restart resumes where the last run stopped.
//!
//! # Usage
//!
//! ```bash
//! logtail run [--batch-limit N]
//! logtail append document --key KEY --json '{"title":"..."}'
//! logtail append transaction --json '{"ops":[{"op":"delete","key":"KEY"}]}'
//! logtail status
//! logtail search QUERY [-n LIMIT] [-t document|transaction]
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/logtail/config.toml)
//! 3. Environment variables (LOGTAIL_*)
//! 4. CLI flags
//!
//! `append` opens the record log for writing and fails while `run` holds it.

use anyhow::Result;
use clap::Parser;

use logtail_daemon::{
    append_document, append_transaction, init_tracing, load_settings, run_consumer, run_search,
    show_status, AppendCommands, Cli, Commands, Overrides,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut overrides = Overrides {
        log_level: cli.log_level.clone(),
        db_path: cli.db_path.clone(),
        index_path: cli.index_path.clone(),
        batch_limit: None,
    };
    if let Commands::Run { batch_limit } = &cli.command {
        overrides.batch_limit = *batch_limit;
    }

    let settings = load_settings(cli.config.as_deref(), &overrides)?;
    init_tracing(&settings.log_level)?;

    match cli.command {
        Commands::Run { .. } => {
            run_consumer(&settings).await?;
        }
        Commands::Append { command } => {
            let id = match command {
                AppendCommands::Document { key, json } => append_document(&settings, &key, &json)?,
                AppendCommands::Transaction { json } => append_transaction(&settings, &json)?,
            };
            println!("{}", id);
        }
        Commands::Status => {
            show_status(&settings)?;
        }
        Commands::Search {
            query,
            limit,
            doc_type,
        } => {
            run_search(&settings, &query, limit, doc_type.as_deref())?;
        }
    }

    Ok(())
}
