//! Request URL resolution and validation.

use log::warn;
use url::Url;

use crate::config::MAX_URL_LENGTH;
use crate::error_handling::FetchError;

/// Resolves `raw` against `base` and checks that it can be fetched.
///
/// Absolute URLs are used as given; relative ones need a base. Only the
/// http and https schemes are accepted, and URLs longer than
/// `MAX_URL_LENGTH` are refused before parsing.
///
/// # Errors
///
/// Returns `FetchError::InvalidUrl` naming the reason.
pub fn resolve_url(raw: &str, base: Option<&Url>) -> Result<Url, FetchError> {
    let invalid = |reason: String| {
        let shown: String = raw.chars().take(80).collect();
        warn!("Rejecting URL '{shown}': {reason}");
        FetchError::InvalidUrl {
            url: raw.to_string(),
            reason,
        }
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid("URL is empty".to_string()));
    }
    if trimmed.len() > MAX_URL_LENGTH {
        return Err(invalid(format!(
            "length {} exceeds maximum of {MAX_URL_LENGTH}",
            trimmed.len()
        )));
    }

    let parsed = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => match base {
            Some(base) => base.join(trimmed).map_err(|e| invalid(e.to_string()))?,
            None => return Err(invalid("relative URL and no base URL configured".to_string())),
        },
        Err(e) => return Err(invalid(e.to_string())),
    };

    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme '{other}'"))),
    }
    if parsed.as_str().len() > MAX_URL_LENGTH {
        return Err(invalid(format!(
            "resolved length {} exceeds maximum of {MAX_URL_LENGTH}",
            parsed.as_str().len()
        )));
    }
    Ok(parsed)
}
