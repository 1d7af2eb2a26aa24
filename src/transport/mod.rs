//! Transport mechanisms for issuing HTTP GET requests.
//!
//! A `Transport` is the thing that actually talks to the network. Two
//! implementations exist:
//! - `StandardTransport`: pooled reqwest client with HTTP/2 and compression
//! - `LegacyTransport`: HTTP/1.1-only reqwest client without connection reuse
//!
//! Which one a fetcher uses is decided once by capability probing
//! (`initialization::probe_transport`) and then injected.

mod legacy;
mod standard;

use std::fmt;

use async_trait::async_trait;

use crate::config::{TransportPreference, ACCEPT_XML, MAX_RESPONSE_BODY_SIZE};
use crate::error_handling::{network_error, FetchError, NetworkErrorKind};

pub use legacy::LegacyTransport;
pub use standard::StandardTransport;

/// Identifies a transport mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Full-featured client (HTTP/2, pooling, compression)
    Standard,
    /// HTTP/1.1 client with one connection per request
    Legacy,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Standard => f.write_str("standard"),
            TransportKind::Legacy => f.write_str("legacy"),
        }
    }
}

/// Transport mechanisms the host offers.
///
/// Probing walks these in priority order (standard, then legacy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub standard: bool,
    pub legacy: bool,
}

impl Capabilities {
    /// Capabilities of a native host: both mechanisms are offered.
    pub fn detect() -> Self {
        Self {
            standard: true,
            legacy: true,
        }
    }

    /// A host with no transport at all.
    pub fn none() -> Self {
        Self {
            standard: false,
            legacy: false,
        }
    }

    /// Restricts these capabilities to what `preference` allows.
    pub fn restrict(self, preference: TransportPreference) -> Self {
        match preference {
            TransportPreference::Auto => self,
            TransportPreference::Standard => Self {
                legacy: false,
                ..self
            },
            TransportPreference::Legacy => Self {
                standard: false,
                ..self
            },
        }
    }

    /// Available mechanisms, highest priority first.
    pub fn candidates(&self) -> Vec<TransportKind> {
        let mut kinds = Vec::with_capacity(2);
        if self.standard {
            kinds.push(TransportKind::Standard);
        }
        if self.legacy {
            kinds.push(TransportKind::Legacy);
        }
        kinds
    }
}

/// A GET request as handed to a transport.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// Absolute request URL
    pub url: url::Url,
    /// Ask the server for an XML body
    pub expect_xml: bool,
}

/// A response as produced by a transport, before any body interpretation.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// Final URL after redirects
    pub final_url: String,
    /// HTTP status code
    pub status: u16,
    /// Response headers in wire order
    pub headers: Vec<(String, String)>,
    /// Raw body bytes
    pub body: Vec<u8>,
}

/// A mechanism that can perform an HTTP GET.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Which mechanism this is.
    fn kind(&self) -> TransportKind;

    /// Whether responses from this transport can be interpreted as XML.
    fn supports_xml(&self) -> bool {
        true
    }

    /// Performs the request. Any HTTP status is a successful exchange.
    async fn get(&self, request: &TransportRequest) -> Result<RawResponse, FetchError>;
}

/// Sends `request` through a reqwest client and buffers the body.
///
/// Shared by both reqwest-backed transports. The body is read chunk by chunk
/// so oversized responses fail before they are fully buffered.
pub(crate) async fn send_with_client(
    client: &reqwest::Client,
    request: &TransportRequest,
) -> Result<RawResponse, FetchError> {
    let url = request.url.as_str();
    let mut builder = client.get(request.url.clone());
    if request.expect_xml {
        builder = builder.header(reqwest::header::ACCEPT, ACCEPT_XML);
    }

    let mut response = builder.send().await.map_err(|e| network_error(url, &e))?;

    if let Some(length) = response.content_length() {
        if length as usize > MAX_RESPONSE_BODY_SIZE {
            return Err(body_too_large(url));
        }
    }

    let status = response.status().as_u16();
    let final_url = response.url().to_string();
    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_str().unwrap_or("").to_string()))
        .collect();

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(|e| network_error(url, &e))? {
        if body.len() + chunk.len() > MAX_RESPONSE_BODY_SIZE {
            return Err(body_too_large(url));
        }
        body.extend_from_slice(&chunk);
    }

    Ok(RawResponse {
        final_url,
        status,
        headers,
        body,
    })
}

fn body_too_large(url: &str) -> FetchError {
    FetchError::Network {
        url: url.to_string(),
        kind: NetworkErrorKind::Body,
        message: format!("response body exceeds {MAX_RESPONSE_BODY_SIZE} bytes"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_follow_priority_order() {
        assert_eq!(
            Capabilities::detect().candidates(),
            vec![TransportKind::Standard, TransportKind::Legacy]
        );
        assert!(Capabilities::none().candidates().is_empty());
    }

    #[test]
    fn test_restrict_by_preference() {
        let caps = Capabilities::detect();
        assert_eq!(
            caps.restrict(TransportPreference::Legacy).candidates(),
            vec![TransportKind::Legacy]
        );
        assert_eq!(
            caps.restrict(TransportPreference::Standard).candidates(),
            vec![TransportKind::Standard]
        );
        assert_eq!(caps.restrict(TransportPreference::Auto), caps);
    }

    #[test]
    fn test_restrict_cannot_add_missing_mechanism() {
        let caps = Capabilities {
            standard: false,
            legacy: true,
        };
        assert!(caps
            .restrict(TransportPreference::Standard)
            .candidates()
            .is_empty());
    }

    #[test]
    fn test_transport_kind_display() {
        assert_eq!(TransportKind::Standard.to_string(), "standard");
        assert_eq!(TransportKind::Legacy.to_string(), "legacy");
    }
}
