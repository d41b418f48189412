//! logtail daemon library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (run, append, status, search)

pub mod cli;
pub mod commands;

pub use cli::{AppendCommands, Cli, Commands};
pub use commands::{
    append_document, append_transaction, follower_path, init_tracing, load_settings,
    open_log_follower, read_status, run_consumer, run_search, search_index, show_status,
    Overrides, Status,
};
