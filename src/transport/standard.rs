//! Standard transport: a pooled reqwest client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::ClientBuilder;

use super::{send_with_client, RawResponse, Transport, TransportKind, TransportRequest};
use crate::config::{FetchConfig, MAX_REDIRECT_HOPS, TCP_CONNECT_TIMEOUT_SECS};
use crate::error_handling::FetchError;

/// The preferred transport.
///
/// Wraps a `reqwest::Client` configured with:
/// - User-Agent header from config
/// - Timeout from config
/// - Redirect following (up to `MAX_REDIRECT_HOPS`)
/// - Connection pooling and HTTP/2 negotiation
pub struct StandardTransport {
    client: reqwest::Client,
}

impl StandardTransport {
    /// Builds the underlying client.
    ///
    /// # Errors
    ///
    /// Returns a `reqwest::Error` if client creation fails, e.g. when the
    /// user agent is not a valid header value.
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(TCP_CONNECT_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECT_HOPS))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for StandardTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Standard
    }

    async fn get(&self, request: &TransportRequest) -> Result<RawResponse, FetchError> {
        send_with_client(&self.client, request).await
    }
}
