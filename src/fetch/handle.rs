//! Caller-side handle to an issued request.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use log::debug;

use super::registry::{PendingRegistry, RequestId};
use super::response::Response;
use crate::error_handling::{outcome_of, FetchError, FetchStats, OutcomeType};

/// Completion callback of a request.
pub type Callback = Box<dyn FnOnce(Result<Response, FetchError>) + Send + 'static>;

/// Lifecycle of a request.
///
/// `Created → Pending → {Completed | Failed | Cancelled}`; the last three
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    /// Handle built, task not yet spawned
    Created,
    /// Task spawned, no outcome yet
    Pending,
    /// The callback received a response
    Completed,
    /// The callback received an error
    Failed,
    /// Cancelled before completion; the callback never runs
    Cancelled,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestStatus::Completed | RequestStatus::Failed | RequestStatus::Cancelled
        )
    }
}

/// State shared by a handle and its request task.
///
/// Completion and cancel both `take()` the callback slot, so exactly one of
/// them gets to finish the request.
pub(crate) struct RequestState {
    callback: Arc<Mutex<Option<Callback>>>,
    status: Mutex<RequestStatus>,
}

impl RequestState {
    pub(crate) fn new(callback: Callback) -> Self {
        Self {
            callback: Arc::new(Mutex::new(Some(callback))),
            status: Mutex::new(RequestStatus::Created),
        }
    }

    pub(crate) fn status(&self) -> RequestStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_status(&self, status: RequestStatus) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }

    fn take_callback(&self) -> Option<Callback> {
        self.callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Delivers `result` unless the request was already cancelled.
    pub(crate) fn complete(
        &self,
        id: RequestId,
        result: Result<Response, FetchError>,
        stats: &FetchStats,
    ) {
        let Some(callback) = self.take_callback() else {
            debug!("Request {id} finished after cancellation; result dropped");
            return;
        };

        let outcome = outcome_of(&result);
        stats.increment(outcome);
        self.set_status(match outcome {
            OutcomeType::Completed => RequestStatus::Completed,
            _ => RequestStatus::Failed,
        });
        match &result {
            Ok(response) => debug!("Request {id} completed with status {}", response.status),
            Err(e) => debug!("Request {id} {outcome}: {e}"),
        }
        callback(result);
    }
}

/// Handle to a request issued by `HttpFetcher::fetch`.
///
/// Dropping the handle does not cancel the request.
#[derive(Clone)]
pub struct RequestHandle {
    id: RequestId,
    url: String,
    expect_xml: bool,
    state: Arc<RequestState>,
    registry: PendingRegistry,
    stats: Arc<FetchStats>,
}

impl RequestHandle {
    pub(crate) fn new(
        id: RequestId,
        url: String,
        expect_xml: bool,
        state: Arc<RequestState>,
        registry: PendingRegistry,
        stats: Arc<FetchStats>,
    ) -> Self {
        Self {
            id,
            url,
            expect_xml,
            state,
            registry,
            stats,
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Resolved request URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether an XML body was requested.
    pub fn expect_xml(&self) -> bool {
        self.expect_xml
    }

    pub fn status(&self) -> RequestStatus {
        self.state.status()
    }

    /// Cancels the request.
    ///
    /// Aborts the request task, removes its registry entry and drops the
    /// callback without calling it. Returns `false` if the request had
    /// already completed (or was already cancelled), in which case nothing
    /// changes.
    pub fn cancel(&self) -> bool {
        let Some(callback) = self.state.take_callback() else {
            return false;
        };
        drop(callback);

        self.state.set_status(RequestStatus::Cancelled);
        if let Some(entry) = self.registry.remove(self.id) {
            entry.abort.abort();
        }
        self.stats.increment(OutcomeType::Cancelled);
        debug!("Request {} to {} cancelled", self.id, self.url);
        true
    }
}

impl fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandle")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("expect_xml", &self.expect_xml)
            .field("status", &self.status())
            .finish()
    }
}
