//! Transport probing.
//!
//! Selects the highest-priority transport the host offers and instantiates it.

use std::sync::Arc;

use log::{debug, warn};

use crate::config::FetchConfig;
use crate::error_handling::FetchError;
use crate::transport::{Capabilities, LegacyTransport, StandardTransport, Transport, TransportKind};

/// Probes `capabilities` in priority order and builds the first available transport.
///
/// The configured `TransportPreference` narrows the candidates first. Only the
/// selected mechanism is instantiated; if that fails the error is returned
/// rather than silently trying the next one.
///
/// # Errors
///
/// - `FetchError::TransportUnavailable` if no candidate remains
/// - `FetchError::HandlerConstructionFailed` if the selected transport cannot be built
pub fn probe_transport(
    capabilities: &Capabilities,
    config: &FetchConfig,
) -> Result<Arc<dyn Transport>, FetchError> {
    let candidates = capabilities.restrict(config.transport).candidates();
    let Some(&kind) = candidates.first() else {
        warn!(
            "No transport available (capabilities: {:?}, preference: {:?})",
            capabilities, config.transport
        );
        return Err(FetchError::TransportUnavailable);
    };

    debug!("Selected {kind} transport from {candidates:?}");
    build_transport(kind, config)
}

/// Instantiates a specific transport mechanism.
///
/// # Errors
///
/// Returns `FetchError::HandlerConstructionFailed` if the client cannot be built.
pub fn build_transport(
    kind: TransportKind,
    config: &FetchConfig,
) -> Result<Arc<dyn Transport>, FetchError> {
    let built: Result<Arc<dyn Transport>, reqwest::Error> = match kind {
        TransportKind::Standard => {
            StandardTransport::new(config).map(|t| Arc::new(t) as Arc<dyn Transport>)
        }
        TransportKind::Legacy => {
            LegacyTransport::new(config).map(|t| Arc::new(t) as Arc<dyn Transport>)
        }
    };

    built.map_err(|e| FetchError::HandlerConstructionFailed {
        transport: kind,
        reason: e.to_string(),
    })
}
