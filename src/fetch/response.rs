//! Completed HTTP exchange as delivered to a fetch callback.

use log::debug;

use crate::error_handling::{FetchError, NetworkErrorKind};
use crate::transport::RawResponse;
use crate::xml::XmlDocument;

/// A completed GET.
///
/// Any HTTP status counts as a completed exchange; use `error_for_status`
/// to treat non-2xx codes as errors.
#[derive(Debug, Clone)]
pub struct Response {
    /// URL the request was issued for (after base resolution)
    pub url: String,
    /// URL after following redirects
    pub final_url: String,
    /// HTTP status code
    pub status: u16,
    /// Response headers in wire order
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8 (lossy)
    pub text: String,
    /// Parsed body, when XML was requested and the body is well-formed
    pub xml: Option<XmlDocument>,
}

impl Response {
    pub(crate) fn from_raw(url: String, raw: RawResponse, parse_xml: bool) -> Self {
        let text = String::from_utf8_lossy(&raw.body).into_owned();
        let xml = if parse_xml {
            match XmlDocument::parse(&text) {
                Ok(doc) => Some(doc),
                Err(e) => {
                    debug!("Body of {url} is not well-formed XML: {e}");
                    None
                }
            }
        } else {
            None
        };

        Self {
            url,
            final_url: raw.final_url,
            status: raw.status,
            headers: raw.headers,
            text,
            xml,
        }
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Turns a non-2xx status into `FetchError::Network` of kind `Status`.
    pub fn error_for_status(self) -> Result<Self, FetchError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(FetchError::Network {
                kind: NetworkErrorKind::Status(self.status),
                message: format!("server responded with status {}", self.status),
                url: self.url,
            })
        }
    }

    /// The body as an XML document.
    ///
    /// Returns the already-parsed document if there is one, otherwise parses
    /// the text body.
    ///
    /// # Errors
    ///
    /// `FetchError::Xml` if the body is not well-formed.
    pub fn into_xml(self) -> Result<XmlDocument, FetchError> {
        match self.xml {
            Some(doc) => Ok(doc),
            None => Ok(XmlDocument::parse(&self.text)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(status: u16, body: &str) -> RawResponse {
        RawResponse {
            final_url: "http://example.com/final.xml".to_string(),
            status,
            headers: vec![("Content-Type".to_string(), "text/xml".to_string())],
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_xml_parsed_only_when_requested() {
        let url = "http://example.com/a.xml";
        let parsed = Response::from_raw(url.into(), raw(200, "<a>1</a>"), true);
        assert!(parsed.xml.is_some());
        let plain = Response::from_raw(url.into(), raw(200, "<a>1</a>"), false);
        assert!(plain.xml.is_none());
        assert_eq!(plain.text, "<a>1</a>");
        assert_eq!(plain.final_url, "http://example.com/final.xml");
    }

    #[test]
    fn test_malformed_body_leaves_xml_empty() {
        let response = Response::from_raw("http://example.com/a.xml".into(), raw(200, "<a>"), true);
        assert!(response.xml.is_none());
        assert!(matches!(response.into_xml(), Err(FetchError::Xml(_))));
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let response = Response::from_raw("http://example.com/".into(), raw(200, ""), false);
        assert_eq!(response.content_type(), Some("text/xml"));
        assert_eq!(response.header("CONTENT-TYPE"), Some("text/xml"));
        assert_eq!(response.header("etag"), None);
    }

    #[test]
    fn test_error_for_status() {
        let ok = Response::from_raw("http://example.com/".into(), raw(204, ""), false);
        assert!(ok.error_for_status().is_ok());

        let missing = Response::from_raw("http://example.com/gone".into(), raw(404, "nope"), false);
        let err = missing.error_for_status().unwrap_err();
        assert_eq!(err.network_kind(), Some(NetworkErrorKind::Status(404)));
        assert!(err.to_string().contains("http://example.com/gone"));
    }
}
