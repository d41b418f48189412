//! CLI argument parsing for logtail.
//!
//! CLI flags override all other config sources.

use clap::{Parser, Subcommand};

/// logtail
///
/// Tails an append-only record log into a full-text index.
#[derive(Parser, Debug)]
#[command(name = "logtail")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/logtail/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override record log path
    #[arg(long, global = true)]
    pub db_path: Option<String>,

    /// Override index path
    #[arg(long, global = true)]
    pub index_path: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the consumer in the foreground until Ctrl+C or SIGTERM
    Run {
        /// Override maximum records per batch
        #[arg(long)]
        batch_limit: Option<usize>,
    },

    /// Append a record to the log
    Append {
        #[command(subcommand)]
        command: AppendCommands,
    },

    /// Show log head and the stored consumer cursor
    Status,

    /// Search the index
    Search {
        /// Query string
        query: String,

        /// Maximum results
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,

        /// Restrict to one type (document, transaction)
        #[arg(short = 't', long)]
        doc_type: Option<String>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum AppendCommands {
    /// Append a document record
    Document {
        /// Document key
        #[arg(short, long)]
        key: String,

        /// JSON object body
        #[arg(short, long)]
        json: String,
    },

    /// Append a transaction record
    Transaction {
        /// JSON body, e.g. {"ops":[{"op":"delete","key":"a"}]}
        #[arg(short, long)]
        json: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_run() {
        let cli = Cli::parse_from(["logtail", "run", "--batch-limit", "500"]);
        match cli.command {
            Commands::Run { batch_limit } => assert_eq!(batch_limit, Some(500)),
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_global_paths() {
        let cli = Cli::parse_from([
            "logtail",
            "status",
            "--db-path",
            "/custom/db",
            "--index-path",
            "/custom/index",
        ]);
        assert!(matches!(cli.command, Commands::Status));
        assert_eq!(cli.db_path, Some("/custom/db".to_string()));
        assert_eq!(cli.index_path, Some("/custom/index".to_string()));
    }

    #[test]
    fn test_cli_with_config_and_log_level() {
        let cli = Cli::parse_from([
            "logtail",
            "--config",
            "/path/to/config.toml",
            "-l",
            "debug",
            "run",
        ]);
        assert_eq!(cli.config, Some("/path/to/config.toml".to_string()));
        assert_eq!(cli.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_cli_append_document() {
        let cli = Cli::parse_from([
            "logtail",
            "append",
            "document",
            "--key",
            "doc-1",
            "--json",
            r#"{"title":"hello"}"#,
        ]);
        match cli.command {
            Commands::Append {
                command: AppendCommands::Document { key, json },
            } => {
                assert_eq!(key, "doc-1");
                assert_eq!(json, r#"{"title":"hello"}"#);
            }
            _ => panic!("Expected Append Document command"),
        }
    }

    #[test]
    fn test_cli_append_transaction() {
        let cli = Cli::parse_from(["logtail", "append", "transaction", "-j", r#"{"ops":[]}"#]);
        assert!(matches!(
            cli.command,
            Commands::Append {
                command: AppendCommands::Transaction { .. }
            }
        ));
    }

    #[test]
    fn test_cli_search() {
        let cli = Cli::parse_from([
            "logtail",
            "search",
            "borrow checker",
            "-n",
            "5",
            "-t",
            "document",
        ]);
        match cli.command {
            Commands::Search {
                query,
                limit,
                doc_type,
            } => {
                assert_eq!(query, "borrow checker");
                assert_eq!(limit, 5);
                assert_eq!(doc_type.as_deref(), Some("document"));
            }
            _ => panic!("Expected Search command"),
        }
    }
}
