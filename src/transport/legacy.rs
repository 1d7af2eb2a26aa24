//! Legacy transport: HTTP/1.1 only, one connection per request.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::ClientBuilder;

use super::{send_with_client, RawResponse, Transport, TransportKind, TransportRequest};
use crate::config::{FetchConfig, MAX_REDIRECT_HOPS, TCP_CONNECT_TIMEOUT_SECS};
use crate::error_handling::FetchError;

/// Fallback transport for hosts where the standard one is not offered.
///
/// Speaks HTTP/1.1 only and keeps no idle connections, so every request
/// opens and closes its own connection.
pub struct LegacyTransport {
    client: reqwest::Client,
}

impl LegacyTransport {
    /// Builds the underlying client.
    ///
    /// # Errors
    ///
    /// Returns a `reqwest::Error` if client creation fails.
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        let client = ClientBuilder::new()
            .http1_only()
            .pool_max_idle_per_host(0)
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(TCP_CONNECT_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECT_HOPS))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for LegacyTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Legacy
    }

    async fn get(&self, request: &TransportRequest) -> Result<RawResponse, FetchError> {
        send_with_client(&self.client, request).await
    }
}
