//! HTTP fetching through a capability-selected transport.
//!
//! `HttpFetcher::fetch` resolves the URL, registers the request in the
//! `PendingRegistry`, spawns it on the Tokio runtime and returns a
//! `RequestHandle` straight away. The callback runs on the request task once
//! the exchange finishes, fails, or times out, unless the handle cancelled it
//! first.

mod handle;
mod registry;
mod resolve;
mod response;


use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::sync::oneshot;

use crate::config::FetchConfig;
use crate::error_handling::{FetchError, FetchStats, NetworkErrorKind, OutcomeType};
use crate::initialization::probe_transport;
use crate::transport::{Capabilities, Transport, TransportKind, TransportRequest};

pub use handle::{Callback, RequestHandle, RequestStatus};
pub use registry::{PendingEntry, PendingRegistry, RequestId};
pub use response::Response;
pub use resolve::resolve_url;

use handle::RequestState;

/// Issues GET requests through one transport.
///
/// Cloning is cheap; clones share the transport, registry and statistics.
#[derive(Clone)]
pub struct HttpFetcher {
    transport: Arc<dyn Transport>,
    config: FetchConfig,
    registry: PendingRegistry,
    stats: Arc<FetchStats>,
}

impl HttpFetcher {
    /// Selects and builds a transport from `capabilities`.
    ///
    /// # Errors
    ///
    /// `TransportUnavailable` or `HandlerConstructionFailed`, see
    /// `probe_transport`. No network I/O happens either way.
    pub fn detect(capabilities: &Capabilities, config: FetchConfig) -> Result<Self, FetchError> {
        let transport = probe_transport(capabilities, &config)?;
        Ok(Self::with_transport(transport, config))
    }

    /// Uses `transport` as is.
    pub fn with_transport(transport: Arc<dyn Transport>, config: FetchConfig) -> Self {
        Self {
            transport,
            config,
            registry: PendingRegistry::new(),
            stats: Arc::new(FetchStats::new()),
        }
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.transport.kind()
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Requests still in flight.
    pub fn registry(&self) -> &PendingRegistry {
        &self.registry
    }

    pub fn stats(&self) -> &Arc<FetchStats> {
        &self.stats
    }

    /// Issues a GET for `url` and returns without waiting for it.
    ///
    /// `on_complete` is called exactly once with the response (whatever its
    /// status) or the error, unless the request is cancelled first. With
    /// `expect_xml` set, an XML `Accept` header is sent and, if the transport
    /// supports it, the body is parsed into `Response::xml`.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// `FetchError::InvalidUrl` if `url` cannot be resolved to an http(s)
    /// URL. The callback is not called in that case.
    pub fn fetch<F>(
        &self,
        url: &str,
        on_complete: F,
        expect_xml: bool,
    ) -> Result<RequestHandle, FetchError>
    where
        F: FnOnce(Result<Response, FetchError>) + Send + 'static,
    {
        let resolved = match resolve_url(url, self.config.base_url.as_ref()) {
            Ok(resolved) => resolved,
            Err(e) => {
                self.stats.increment(OutcomeType::Rejected);
                return Err(e);
            }
        };

        let id = self.registry.next_id();
        let url = resolved.to_string();
        let state = Arc::new(RequestState::new(Box::new(on_complete)));
        let handle = RequestHandle::new(
            id,
            url.clone(),
            expect_xml,
            Arc::clone(&state),
            self.registry.clone(),
            Arc::clone(&self.stats),
        );

        state.set_status(RequestStatus::Pending);

        let task = {
            let transport = Arc::clone(&self.transport);
            let registry = self.registry.clone();
            let stats = Arc::clone(&self.stats);
            let timeout = self.config.timeout;
            let request = TransportRequest {
                url: resolved,
                expect_xml,
            };
            let url = url.clone();
            async move {
                let result = execute(transport.as_ref(), &request, url, timeout).await;
                registry.remove(id);
                state.complete(id, result, &stats);
            }
        };

        let kind = self.transport.kind();
        self.registry
            .register(id, url.clone(), kind, || tokio::spawn(task).abort_handle());
        debug!("Request {id} issued: GET {url} via {kind} transport");
        Ok(handle)
    }

    /// Awaitable form of `fetch`.
    pub async fn get(&self, url: &str, expect_xml: bool) -> Result<Response, FetchError> {
        let (tx, rx) = oneshot::channel();
        let handle = self.fetch(
            url,
            move |result| {
                let _ = tx.send(result);
            },
            expect_xml,
        )?;

        rx.await.map_err(|_| FetchError::Network {
            url: handle.url().to_string(),
            kind: NetworkErrorKind::Other,
            message: "request task ended without a result".to_string(),
        })?
    }
}

/// Runs one exchange under the configured timeout.
async fn execute(
    transport: &dyn Transport,
    request: &TransportRequest,
    url: String,
    timeout: Duration,
) -> Result<Response, FetchError> {
    let parse_xml = request.expect_xml && transport.supports_xml();
    match tokio::time::timeout(timeout, transport.get(request)).await {
        Ok(Ok(raw)) => Ok(Response::from_raw(url, raw, parse_xml)),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(FetchError::Network {
            message: format!("no response within {:.1}s", timeout.as_secs_f64()),
            kind: NetworkErrorKind::Timeout,
            url,
        }),
    }
}
