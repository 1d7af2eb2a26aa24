//! Configuration constants.
//!
//! This module defines the defaults and limits used throughout the crate,
//! including timeouts, size limits and request header values.

/// Default per-request timeout in seconds.
///
/// Every request issued through `HttpFetcher` is bounded by this value
/// unless the caller overrides it.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// TCP connection timeout in seconds
pub const TCP_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Maximum number of redirects either transport follows before failing.
pub const MAX_REDIRECT_HOPS: usize = 10;

/// Maximum response body size in bytes (10MB).
/// Larger responses fail with a `Body` network error to prevent memory exhaustion.
pub const MAX_RESPONSE_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Maximum URL length accepted by the fetcher.
/// Matches common browser and server limits.
pub const MAX_URL_LENGTH: usize = 2048;

/// Default User-Agent string for HTTP requests.
///
/// Users can override this via the `--user-agent` CLI flag.
pub const DEFAULT_USER_AGENT: &str = concat!("xml_fetch/", env!("CARGO_PKG_VERSION"));

/// `Accept` header sent when the caller expects an XML response body.
pub const ACCEPT_XML: &str = "application/xml, text/xml;q=0.9, */*;q=0.1";

/// Maximum nesting depth of template invocations during an XSLT transform.
/// Guards against stylesheets that recurse without a base case.
pub const MAX_TEMPLATE_DEPTH: usize = 128;

/// Maximum element nesting depth accepted when parsing XML.
/// Deeper documents fail with `XmlError::TooDeep`.
pub const MAX_XML_DEPTH: usize = 256;

/// Maximum nesting of parentheses, predicates, function arguments and
/// unary minus in one XPath expression.
pub const MAX_XPATH_DEPTH: usize = 64;
