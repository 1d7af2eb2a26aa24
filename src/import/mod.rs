//! XML document import.
//!
//! `XmlImporter` fetches a URL through `HttpFetcher` with an XML body
//! requested, and hands back the parsed document. Unless caching is allowed,
//! a millisecond timestamp is appended to the URL so intermediate caches
//! treat every import as a distinct request.

use chrono::Utc;
use log::debug;

use crate::config::FetchConfig;
use crate::error_handling::FetchError;
use crate::fetch::{HttpFetcher, RequestHandle, Response};
use crate::transport::Capabilities;
use crate::xml::XmlDocument;

/// Fetches and parses XML documents.
#[derive(Clone)]
pub struct XmlImporter {
    fetcher: HttpFetcher,
}

impl XmlImporter {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self { fetcher }
    }

    /// Builds an importer on a fetcher selected from `capabilities`.
    ///
    /// # Errors
    ///
    /// `FetchError::TransportUnavailable` when the host offers no transport,
    /// `FetchError::HandlerConstructionFailed` when the selected one cannot
    /// be built.
    pub fn detect(capabilities: &Capabilities, config: FetchConfig) -> Result<Self, FetchError> {
        Ok(Self::new(HttpFetcher::detect(capabilities, config)?))
    }

    pub fn fetcher(&self) -> &HttpFetcher {
        &self.fetcher
    }

    /// Appends `timestamp_ms` to `url` unless `allow_cache` is set.
    ///
    /// The separator is `?` for a URL without a query string and `&`
    /// otherwise; the value is the bare timestamp.
    ///
    /// ```
    /// use xml_fetch::XmlImporter;
    ///
    /// assert_eq!(XmlImporter::cache_bust("feed.xml", false, 42), "feed.xml?42");
    /// assert_eq!(XmlImporter::cache_bust("feed.xml?v=2", false, 42), "feed.xml?v=2&42");
    /// assert_eq!(XmlImporter::cache_bust("feed.xml", true, 42), "feed.xml");
    /// ```
    pub fn cache_bust(url: &str, allow_cache: bool, timestamp_ms: i64) -> String {
        if allow_cache {
            return url.to_string();
        }
        let separator = if url.contains('?') { '&' } else { '?' };
        format!("{url}{separator}{timestamp_ms}")
    }

    /// Starts importing `url` and returns immediately.
    ///
    /// `on_loaded` receives the parsed document, or the error: a network
    /// error (a non-2xx status is reported as `NetworkErrorKind::Status`) or
    /// `FetchError::Xml` for a malformed body.
    ///
    /// # Errors
    ///
    /// `FetchError::InvalidUrl` if the request cannot be issued.
    pub fn import_xml<F>(
        &self,
        url: &str,
        on_loaded: F,
        allow_cache: bool,
    ) -> Result<RequestHandle, FetchError>
    where
        F: FnOnce(Result<XmlDocument, FetchError>) + Send + 'static,
    {
        let target = Self::cache_bust(url, allow_cache, Utc::now().timestamp_millis());
        debug!("Importing XML from {target}");
        self.fetcher
            .fetch(&target, move |result| on_loaded(result.and_then(into_document)), true)
    }

    /// Awaitable form of `import_xml`.
    pub async fn load(&self, url: &str, allow_cache: bool) -> Result<XmlDocument, FetchError> {
        let target = Self::cache_bust(url, allow_cache, Utc::now().timestamp_millis());
        debug!("Loading XML from {target}");
        into_document(self.fetcher.get(&target, true).await?)
    }
}

fn into_document(response: Response) -> Result<XmlDocument, FetchError> {
    response.error_for_status()?.into_xml()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_bust_separators() {
        assert_eq!(
            XmlImporter::cache_bust("http://h/feed.xml", false, 1_700_000_000_000),
            "http://h/feed.xml?1700000000000"
        );
        assert_eq!(
            XmlImporter::cache_bust("http://h/feed.xml?lang=en", false, 5),
            "http://h/feed.xml?lang=en&5"
        );
        assert_eq!(
            XmlImporter::cache_bust("http://h/feed.xml?", false, 5),
            "http://h/feed.xml?&5"
        );
    }

    #[test]
    fn test_allow_cache_never_appends() {
        for url in ["http://h/a.xml", "http://h/a.xml?x=1", "relative.xml"] {
            assert_eq!(XmlImporter::cache_bust(url, true, 99), url);
        }
    }

    #[test]
    fn test_detect_without_transport_is_explicit() {
        let result = XmlImporter::detect(&Capabilities::none(), FetchConfig::default());
        assert!(matches!(result, Err(FetchError::TransportUnavailable)));
    }
}
