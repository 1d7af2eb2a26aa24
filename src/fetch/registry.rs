//! Registry of in-flight requests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tokio::task::AbortHandle;

use crate::transport::TransportKind;

/// Identifier of a request issued by one `HttpFetcher`.
pub type RequestId = u64;

/// Bookkeeping for a request that has been issued but not finished.
#[derive(Debug)]
pub struct PendingEntry {
    /// Resolved request URL
    pub url: String,
    /// Transport carrying the request
    pub transport: TransportKind,
    /// Aborts the request task
    pub abort: AbortHandle,
    /// When the request was issued
    pub started: Instant,
}

/// Map from request id to in-flight entry.
///
/// Entries are inserted when a request is issued and removed exactly once,
/// by whichever of completion or cancellation happens first. Clones share
/// the same map.
#[derive(Debug, Clone, Default)]
pub struct PendingRegistry {
    entries: Arc<Mutex<HashMap<RequestId, PendingEntry>>>,
    next_id: Arc<AtomicU64>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn next_id(&self) -> RequestId {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Spawns a request task with `spawn` and records it under `id`.
    ///
    /// The map stays locked while spawning, so a task that finishes
    /// immediately cannot try to remove its entry before it exists.
    pub(crate) fn register<F>(&self, id: RequestId, url: String, transport: TransportKind, spawn: F)
    where
        F: FnOnce() -> AbortHandle,
    {
        let mut entries = self.lock();
        let abort = spawn();
        entries.insert(
            id,
            PendingEntry {
                url,
                transport,
                abort,
                started: Instant::now(),
            },
        );
    }

    pub(crate) fn remove(&self, id: RequestId) -> Option<PendingEntry> {
        self.lock().remove(&id)
    }

    /// Number of requests still in flight.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.lock().contains_key(&id)
    }

    /// URLs of the requests still in flight, in no particular order.
    pub fn pending_urls(&self) -> Vec<String> {
        self.lock().values().map(|entry| entry.url.clone()).collect()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RequestId, PendingEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
