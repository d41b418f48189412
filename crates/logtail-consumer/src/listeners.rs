//! Progress listeners.
//!
//! Listeners are invoked with the latest cursor after every published
//! batch. Each listener runs on its own: an error or panic in one is
//! logged and the rest still run.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::cursor::Cursor;

/// Callback invoked with each published cursor
pub type Listener = Arc<dyn Fn(&Cursor) -> anyhow::Result<()> + Send + Sync>;

/// Registry of progress listeners keyed by id.
///
/// Cloning shares the underlying registry.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    listeners: Arc<RwLock<BTreeMap<String, Listener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener, replacing any previous one with the same id.
    pub fn register<F>(&self, id: impl Into<String>, callback: F)
    where
        F: Fn(&Cursor) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = id.into();
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if listeners.insert(id.clone(), Arc::new(callback)).is_some() {
            debug!(listener = %id, "Replaced listener");
        } else {
            debug!(listener = %id, "Registered listener");
        }
    }

    /// Remove a listener. Returns false if no listener had that id.
    pub fn deregister(&self, id: &str) -> bool {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current entries, in id order.
    pub fn snapshot(&self) -> Vec<(String, Listener)> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, listener)| (id.clone(), Arc::clone(listener)))
            .collect()
    }

    /// Invoke every listener with `cursor`. Returns the number that failed.
    ///
    /// Iterates a snapshot, so listeners may register or deregister
    /// (including themselves) while being notified.
    pub fn notify(&self, cursor: &Cursor) -> usize {
        let mut failed = 0;
        for (id, listener) in self.snapshot() {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(cursor))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(listener = %id, error = %e, "Listener failed");
                    failed += 1;
                }
                Err(payload) => {
                    warn!(
                        listener = %id,
                        panic = %panic_message(payload.as_ref()),
                        "Listener panicked"
                    );
                    failed += 1;
                }
            }
        }
        failed
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<String> = self.snapshot().into_iter().map(|(id, _)| id).collect();
        f.debug_struct("ListenerRegistry")
            .field("listeners", &ids)
            .finish()
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
