//! Error categorization.
//!
//! Maps transport-level failures onto `NetworkErrorKind` so both transports
//! report errors the same way.

use super::types::{FetchError, NetworkErrorKind, OutcomeType};

/// Categorizes a `reqwest::Error` into a `NetworkErrorKind`.
///
/// Status codes take precedence over the error's own classification, then
/// the `is_*` predicates are checked from most to least specific.
pub fn categorize_reqwest_error(error: &reqwest::Error) -> NetworkErrorKind {
    if let Some(status) = error.status() {
        return NetworkErrorKind::Status(status.as_u16());
    }

    if error.is_timeout() {
        NetworkErrorKind::Timeout
    } else if error.is_connect() {
        NetworkErrorKind::Connect
    } else if error.is_redirect() {
        NetworkErrorKind::Redirect
    } else if error.is_body() {
        NetworkErrorKind::Body
    } else if error.is_decode() {
        NetworkErrorKind::Decode
    } else if error.is_request() || error.is_builder() {
        NetworkErrorKind::Request
    } else {
        NetworkErrorKind::Other
    }
}

/// Wraps a `reqwest::Error` for `url` into a `FetchError::Network`.
pub fn network_error(url: &str, error: &reqwest::Error) -> FetchError {
    FetchError::Network {
        url: url.to_string(),
        kind: categorize_reqwest_error(error),
        message: error.to_string(),
    }
}

/// Classifies a request result for `FetchStats`.
pub fn outcome_of<T>(result: &Result<T, FetchError>) -> OutcomeType {
    match result {
        Ok(_) => OutcomeType::Completed,
        Err(e) if e.is_timeout() => OutcomeType::TimedOut,
        Err(_) => OutcomeType::Failed,
    }
}
