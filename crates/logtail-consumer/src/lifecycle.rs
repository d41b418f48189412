//! Consumer lifecycle: start, supervision, and stop.
//!
//! The loop runs on a dedicated OS thread driving a current-thread Tokio
//! runtime. A supervisor on that thread restarts the loop after any error
//! or panic, waiting a fixed backoff between attempts, until stopped.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{JoinHandle, ThreadId};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ConsumerConfig;
use crate::consumer::ConsumerLoop;
use crate::cursor::Cursor;
use crate::error::ConsumerError;
use crate::indexer::Indexer;
use crate::listeners::{panic_message, ListenerRegistry};
use crate::store::RecordStore;

const THREAD_NAME: &str = "logtail-consumer";

/// A log consumer that has not been started yet.
///
/// Only one consumer may run against a given log and cursor at a time.
/// Nothing here guards against a second instance; deployments must ensure
/// a single consumer per log.
pub struct LogConsumer {
    store: Arc<dyn RecordStore>,
    indexer: Arc<dyn Indexer>,
    config: ConsumerConfig,
    listeners: ListenerRegistry,
}

impl LogConsumer {
    pub fn new(
        store: Arc<dyn RecordStore>,
        indexer: Arc<dyn Indexer>,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            store,
            indexer,
            config,
            listeners: ListenerRegistry::new(),
        }
    }

    /// Listeners, so callbacks can be registered before the first batch.
    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    /// Start consuming on a background thread.
    ///
    /// Writes an initial cursor if none is stored yet.
    pub fn start(self) -> Result<ConsumerHandle, ConsumerError> {
        self.config.validate()?;

        if Cursor::load(self.indexer.as_ref())?.is_none() {
            Cursor::initial().persist(self.indexer.as_ref())?;
            info!("Initialized consumer cursor at offset 0");
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| ConsumerError::Runtime(e.to_string()))?;

        let token = CancellationToken::new();
        let (progress_tx, progress_rx) = watch::channel(None);
        let restarts = Arc::new(AtomicU64::new(0));
        let backoff = self.config.restart_backoff();
        let batch_limit = self.config.batch_limit;

        let consumer = ConsumerLoop {
            store: self.store,
            indexer: self.indexer,
            config: self.config,
            listeners: self.listeners.clone(),
            progress: Arc::new(progress_tx),
        };

        let thread = {
            let token = token.clone();
            let restarts = Arc::clone(&restarts);
            std::thread::Builder::new()
                .name(THREAD_NAME.to_string())
                .spawn(move || runtime.block_on(supervise(consumer, token, restarts, backoff)))
                .map_err(|e| ConsumerError::Runtime(e.to_string()))?
        };

        info!(batch_limit, backoff_ms = backoff.as_millis() as u64, "Log consumer started");

        Ok(ConsumerHandle {
            token,
            thread_id: thread.thread().id(),
            thread: Mutex::new(Some(thread)),
            listeners: self.listeners,
            progress: progress_rx,
            restarts,
        })
    }
}

/// Run the loop until cancelled, restarting it after failures.
async fn supervise(
    consumer: ConsumerLoop,
    token: CancellationToken,
    restarts: Arc<AtomicU64>,
    backoff: Duration,
) {
    loop {
        match AssertUnwindSafe(consumer.run(&token)).catch_unwind().await {
            Ok(Ok(())) => break,
            Ok(Err(e)) => error!(error = %e, "Log consumer failed"),
            Err(payload) => {
                error!(panic = %panic_message(payload.as_ref()), "Log consumer panicked")
            }
        }

        if token.is_cancelled() {
            break;
        }

        warn!(
            backoff_ms = backoff.as_millis() as u64,
            "Restarting log consumer after backoff"
        );
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(backoff) => {}
        }
        restarts.fetch_add(1, Ordering::SeqCst);
    }

    info!("Log consumer stopped");
}

/// Handle to a running consumer.
///
/// Dropping the handle stops the consumer.
pub struct ConsumerHandle {
    token: CancellationToken,
    thread_id: ThreadId,
    thread: Mutex<Option<JoinHandle<()>>>,
    listeners: ListenerRegistry,
    progress: watch::Receiver<Option<Cursor>>,
    restarts: Arc<AtomicU64>,
}

impl ConsumerHandle {
    /// Stop the consumer and wait for its thread to exit.
    ///
    /// Blocks until no further indexing can happen. Safe to call more than
    /// once and from several threads; later calls wait for the first to
    /// finish. Must not be called from async code without `spawn_blocking`.
    ///
    /// Called from a listener on the consumer thread, it only cancels: the
    /// thread exits after the current iteration and a later `stop` from
    /// another thread joins it.
    pub fn stop(&self) {
        self.token.cancel();

        if std::thread::current().id() == self.thread_id {
            debug!("stop() called from the consumer thread, not joining");
            return;
        }

        let mut thread = self.thread.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(handle) = thread.take() else {
            return;
        };

        if handle.join().is_err() {
            error!("Log consumer thread panicked");
        }
    }

    /// True until the consumer thread has exited or been joined.
    pub fn is_running(&self) -> bool {
        self.thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    /// Receiver updated with each published cursor.
    pub fn subscribe(&self) -> watch::Receiver<Option<Cursor>> {
        self.progress.clone()
    }

    /// Number of times the supervisor restarted the loop.
    pub fn restarts(&self) -> u64 {
        self.restarts.load(Ordering::SeqCst)
    }
}

impl Drop for ConsumerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ConsumerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerHandle")
            .field("running", &self.is_running())
            .field("restarts", &self.restarts())
            .finish()
    }
}
