//! Command implementations for logtail.
//!
//! Handles:
//! - run: open log and index, start the consumer, stop on signal
//! - append: write a document or transaction record
//! - status: log head and stored cursor
//! - search: BM25 query against the index

use std::fs;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{info, warn};

use logtail_consumer::{ConsumerConfig, Cursor, LogConsumer, CURSOR_KEY};
use logtail_search::{
    DocType, SearchHit, SearchIndex, SearchIndexConfig, SearchIndexer, SearchOptions,
    TantivySearcher,
};
use logtail_storage::Storage;
use logtail_types::{Document, Settings, Transaction};

/// Overrides taken from global CLI flags.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub log_level: Option<String>,
    pub db_path: Option<String>,
    pub index_path: Option<String>,
    pub batch_limit: Option<usize>,
}

/// Load settings (defaults -> file -> env) and apply CLI overrides last.
pub fn load_settings(config_path: Option<&str>, overrides: &Overrides) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;

    if let Some(level) = &overrides.log_level {
        settings.log_level = level.clone();
    }
    if let Some(db_path) = &overrides.db_path {
        settings.db_path = db_path.clone();
    }
    if let Some(index_path) = &overrides.index_path {
        settings.index_path = index_path.clone();
    }
    if let Some(batch_limit) = overrides.batch_limit {
        settings.batch_limit = batch_limit;
    }

    settings.validate().context("Invalid configuration")?;
    Ok(settings)
}

/// Install the global tracing subscriber. RUST_LOG wins over `level`.
pub fn init_tracing(level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

fn open_storage(path: &Path) -> Result<Storage> {
    fs::create_dir_all(path).context("Failed to create record log directory")?;
    Storage::open(path).with_context(|| format!("Failed to open record log at {:?}", path))
}

/// Directory for the consumer's secondary instance, next to the log.
pub fn follower_path(db_path: &Path) -> PathBuf {
    let mut name = db_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("records"));
    name.push(".follower");
    db_path.with_file_name(name)
}

/// Open the record log as a secondary instance for the consumer.
///
/// The primary stays free, so `append` keeps working while `run` tails the
/// log. An empty log is created first if none exists.
pub fn open_log_follower(settings: &Settings) -> Result<Storage> {
    let db_path = settings.expanded_db_path();
    if !db_path.join("CURRENT").exists() {
        open_storage(&db_path)?;
    }

    let secondary = follower_path(&db_path);
    fs::create_dir_all(&secondary).context("Failed to create follower directory")?;
    Storage::open_secondary(&db_path, &secondary)
        .with_context(|| format!("Failed to follow record log at {:?}", db_path))
}

fn open_index(settings: &Settings) -> Result<SearchIndex> {
    let config = SearchIndexConfig::new(settings.expanded_index_path())
        .with_memory_mb(settings.writer_memory_mb);
    SearchIndex::open_or_create(config).context("Failed to open index")
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

/// Run the consumer until a shutdown signal arrives.
pub async fn run_consumer(settings: &Settings) -> Result<()> {
    info!("logtail starting...");
    info!("  Record log: {}", settings.db_path);
    info!("  Index: {}", settings.index_path);
    info!("  Batch limit: {}", settings.batch_limit);

    let storage = Arc::new(open_log_follower(settings)?);
    let index = open_index(settings)?;
    let indexer = Arc::new(SearchIndexer::new(&index).context("Failed to create index writer")?);

    let consumer = LogConsumer::new(storage, indexer, ConsumerConfig::from_settings(settings));
    consumer.listeners().register("progress-log", |cursor: &Cursor| {
        info!(
            next_offset = cursor.next_offset,
            lag = cursor.lag,
            "Indexed through offset"
        );
        Ok(())
    });

    let handle = Arc::new(consumer.start().context("Failed to start consumer")?);

    shutdown_signal().await;

    let stopping = Arc::clone(&handle);
    tokio::task::spawn_blocking(move || stopping.stop())
        .await
        .context("Consumer stop task failed")?;

    info!(restarts = handle.restarts(), "logtail stopped");
    Ok(())
}

/// Append a document record and return its id.
pub fn append_document(settings: &Settings, key: &str, json: &str) -> Result<u64> {
    let document: Document =
        serde_json::from_str(json).context("Document body must be a JSON object")?;
    let storage = open_storage(&settings.expanded_db_path())?;
    let id = storage
        .append_document(key, &document)
        .context("Failed to append document")?;
    storage.flush()?;
    Ok(id)
}

/// Append a transaction record and return its id.
pub fn append_transaction(settings: &Settings, json: &str) -> Result<u64> {
    let transaction: Transaction =
        serde_json::from_str(json).context("Transaction body must be {\"ops\": [...]}")?;
    let storage = open_storage(&settings.expanded_db_path())?;
    let id = storage
        .append_transaction(&transaction)
        .context("Failed to append transaction")?;
    storage.flush()?;
    Ok(id)
}

/// Log head and stored cursor, read without locking either store.
#[derive(Debug)]
pub struct Status {
    pub highest_id: Option<u64>,
    pub record_count: u64,
    pub cursor: Option<Cursor>,
}

pub fn read_status(settings: &Settings) -> Result<Status> {
    let db_path = settings.expanded_db_path();
    let (highest_id, record_count) = if db_path.exists() {
        let storage = Storage::open_read_only(&db_path).context("Failed to open record log")?;
        let stats = storage.get_stats()?;
        (stats.highest_id, stats.record_count)
    } else {
        (None, 0)
    };

    let index_path = settings.expanded_index_path();
    let cursor = if index_path.join("meta.json").exists() {
        let index = open_index(settings)?;
        match index.committed_payload()? {
            Some(payload) if !payload.is_empty() => {
                let mut metadata: serde_json::Map<String, serde_json::Value> =
                    serde_json::from_str(&payload).context("Corrupt index metadata")?;
                metadata
                    .remove(CURSOR_KEY)
                    .map(Cursor::from_value)
                    .transpose()?
            }
            _ => None,
        }
    } else {
        None
    };

    Ok(Status {
        highest_id,
        record_count,
        cursor,
    })
}

pub fn show_status(settings: &Settings) -> Result<()> {
    let status = read_status(settings)?;

    println!("Record log: {}", settings.db_path);
    println!("  Records: {}", status.record_count);
    match status.highest_id {
        Some(id) => println!("  Highest id: {}", id),
        None => println!("  Highest id: (empty)"),
    }

    println!("Index: {}", settings.index_path);
    match status.cursor {
        Some(cursor) => {
            println!("  Next offset: {}", cursor.next_offset);
            println!("  Lag: {}", cursor.lag);
            match cursor.last_time {
                Some(t) => println!("  Last record: {}", t.to_rfc3339()),
                None => println!("  Last record: (none)"),
            }
            println!("  Updated: {}", cursor.updated_at.to_rfc3339());
        }
        None => println!("  Cursor: (consumer has not run)"),
    }
    Ok(())
}

/// Query the index, optionally restricted to one doc type.
pub fn search_index(
    settings: &Settings,
    query: &str,
    limit: usize,
    doc_type: Option<&str>,
) -> Result<Vec<SearchHit>> {
    let mut options = SearchOptions::new().with_limit(limit);
    if let Some(doc_type) = doc_type {
        let doc_type: DocType = doc_type.parse().map_err(anyhow::Error::msg)?;
        options = options.with_doc_type(doc_type);
    }

    let index = open_index(settings)?;
    let searcher = TantivySearcher::new(&index)?;
    Ok(searcher.search(query, options)?)
}

pub fn run_search(
    settings: &Settings,
    query: &str,
    limit: usize,
    doc_type: Option<&str>,
) -> Result<()> {
    let hits = search_index(settings, query, limit, doc_type)?;

    if hits.is_empty() {
        println!("No results for {:?}", query);
        return Ok(());
    }
    for hit in hits {
        println!(
            "{:>8.3}  {:<11} {}  {}",
            hit.score,
            hit.doc_type.as_str(),
            hit.doc_id,
            hit.body.unwrap_or_default()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_settings(dir: &TempDir) -> Settings {
        Settings {
            db_path: dir.path().join("log").to_string_lossy().to_string(),
            index_path: dir.path().join("index").to_string_lossy().to_string(),
            ..Settings::default()
        }
    }

    #[test]
    fn test_overrides_win() {
        let overrides = Overrides {
            log_level: Some("trace".into()),
            db_path: Some("/tmp/logtail-db".into()),
            index_path: None,
            batch_limit: Some(7),
        };
        let settings = load_settings(None, &overrides).unwrap();
        assert_eq!(settings.log_level, "trace");
        assert_eq!(settings.db_path, "/tmp/logtail-db");
        assert_eq!(settings.batch_limit, 7);
    }

    #[test]
    fn test_zero_batch_limit_override_rejected() {
        let overrides = Overrides {
            batch_limit: Some(0),
            ..Overrides::default()
        };
        assert!(load_settings(None, &overrides).is_err());
    }

    #[test]
    fn test_append_rejects_bad_json() {
        let dir = TempDir::new().unwrap();
        let settings = temp_settings(&dir);
        assert!(append_document(&settings, "k", "[1, 2]").is_err());
        assert!(append_transaction(&settings, "{\"ops\": 5}").is_err());
    }

    #[test]
    fn test_follower_path_is_sibling_of_log() {
        assert_eq!(
            follower_path(Path::new("/data/logtail/records")),
            PathBuf::from("/data/logtail/records.follower")
        );
    }

    #[test]
    fn test_follower_opens_on_missing_log() {
        let dir = TempDir::new().unwrap();
        let settings = temp_settings(&dir);

        let follower = open_log_follower(&settings).unwrap();
        assert!(follower.is_secondary());
        assert_eq!(follower.highest_id().unwrap(), None);
    }

    #[test]
    fn test_status_before_first_run() {
        let dir = TempDir::new().unwrap();
        let settings = temp_settings(&dir);

        let status = read_status(&settings).unwrap();
        assert_eq!(status.highest_id, None);
        assert!(status.cursor.is_none());

        append_document(&settings, "a", r#"{"title":"first"}"#).unwrap();
        append_transaction(&settings, r#"{"ops":[{"op":"put","key":"a"}]}"#).unwrap();

        let status = read_status(&settings).unwrap();
        assert_eq!(status.highest_id, Some(1));
        assert_eq!(status.record_count, 2);
    }
}
