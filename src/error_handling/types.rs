//! Error type definitions.
//!
//! This module defines the error types used throughout the crate, one enum per
//! concern, plus the outcome categories counted by `FetchStats`.

use std::fmt;

use log::SetLoggerError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

use crate::transport::TransportKind;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),
}

/// Category of a failed network exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    /// TCP/TLS connection could not be established
    Connect,
    /// The request exceeded its timeout
    Timeout,
    /// The server answered with a non-success status
    Status(u16),
    /// Too many redirects, or a redirect loop
    Redirect,
    /// The response body could not be read or was too large
    Body,
    /// The response body could not be decoded
    Decode,
    /// The request could not be sent
    Request,
    /// Anything the categories above do not cover
    Other,
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkErrorKind::Connect => f.write_str("connect error"),
            NetworkErrorKind::Timeout => f.write_str("timeout"),
            NetworkErrorKind::Status(code) => write!(f, "HTTP status {code}"),
            NetworkErrorKind::Redirect => f.write_str("redirect error"),
            NetworkErrorKind::Body => f.write_str("body error"),
            NetworkErrorKind::Decode => f.write_str("decode error"),
            NetworkErrorKind::Request => f.write_str("request error"),
            NetworkErrorKind::Other => f.write_str("network error"),
        }
    }
}

/// Errors raised while selecting a transport or fetching a resource.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The host offers no usable transport mechanism.
    #[error("no HTTP transport is available on this host")]
    TransportUnavailable,

    /// The selected transport mechanism could not be instantiated.
    #[error("failed to construct {transport} transport: {reason}")]
    HandlerConstructionFailed {
        /// Transport that was selected by probing
        transport: TransportKind,
        /// Underlying cause
        reason: String,
    },

    /// The request URL cannot be used.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// URL as given by the caller
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// Connection failure, timeout, or (when requested) a non-success status.
    #[error("{kind} fetching {url}: {message}")]
    Network {
        /// URL of the failed request
        url: String,
        /// Failure category
        kind: NetworkErrorKind,
        /// Human-readable detail
        message: String,
    },

    /// The response body is not well-formed XML.
    #[error("response is not well-formed XML: {0}")]
    Xml(#[from] XmlError),
}

impl FetchError {
    /// Returns the network error category, if this is a network error.
    pub fn network_kind(&self) -> Option<NetworkErrorKind> {
        match self {
            FetchError::Network { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether the request was cut off by its timeout.
    pub fn is_timeout(&self) -> bool {
        self.network_kind() == Some(NetworkErrorKind::Timeout)
    }
}

/// Errors raised while parsing XML markup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XmlError {
    /// Malformed markup.
    #[error("XML syntax error at byte {position}: {message}")]
    Syntax {
        /// Byte offset reported by the reader
        position: u64,
        /// Reader diagnostic
        message: String,
    },

    /// A document needs exactly one root element.
    #[error("document has no root element")]
    NoRootElement,

    /// A document needs exactly one root element.
    #[error("document has more than one root element")]
    MultipleRootElements,

    /// Input ended inside an element.
    #[error("element <{0}> is not closed")]
    UnclosedElement(String),

    /// Elements are nested deeper than the parser accepts.
    #[error("elements nested deeper than {0} levels")]
    TooDeep(usize),
}

/// Errors raised while compiling or applying an XSLT stylesheet.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum XsltError {
    /// The document element is not `xsl:stylesheet` or `xsl:transform`.
    #[error("not an XSLT stylesheet: document element is <{0}>")]
    NotAStylesheet(String),

    /// An `xsl:` element this engine does not implement.
    #[error("unsupported XSLT instruction <xsl:{0}>")]
    UnsupportedInstruction(String),

    /// A required attribute is missing from an XSLT element.
    #[error("<xsl:{element}> requires a '{attribute}' attribute")]
    MissingAttribute {
        /// Local name of the XSLT element
        element: String,
        /// Missing attribute
        attribute: &'static str,
    },

    /// An XPath expression or match pattern failed to parse.
    #[error("XPath syntax error in '{expr}' at offset {position}: {message}")]
    XPathSyntax {
        /// Expression text
        expr: String,
        /// Character offset of the problem
        position: usize,
        /// What was expected
        message: String,
    },

    /// A call to a function outside the supported core library.
    #[error("unknown XPath function {0}()")]
    UnknownFunction(String),

    /// A core function called with the wrong number of arguments.
    #[error("{function}() expects {expected} argument(s), got {got}")]
    ArgumentCount {
        /// Function name
        function: String,
        /// Accepted arity, e.g. "1" or "2 or 3"
        expected: &'static str,
        /// Arity at the call site
        got: usize,
    },

    /// A node-set was required but the expression produced a scalar.
    #[error("expression '{0}' does not evaluate to a node-set")]
    NotANodeSet(String),

    /// Reference to a variable or parameter that is not in scope.
    #[error("unknown variable ${0}")]
    UnknownVariable(String),

    /// `xsl:call-template` names a template that does not exist.
    #[error("no template named '{0}'")]
    UnknownTemplate(String),

    /// Template invocations nested deeper than the configured limit.
    #[error("template recursion exceeded {0} levels")]
    RecursionLimit(usize),

    /// `xsl:element` or `xsl:attribute` computed a name that is not a QName.
    #[error("'{0}' is not a valid element or attribute name")]
    InvalidName(String),

    /// `xsl:comment` content contains `--` or ends with `-`.
    #[error("comment text '{0}' cannot be written as an XML comment")]
    InvalidComment(String),

    /// A processor was asked to transform before a stylesheet was imported.
    #[error("no stylesheet has been imported")]
    NoStylesheet,
}

/// Errors raised while rendering a transform result into a page.
#[derive(Error, Debug)]
pub enum RenderError {
    /// No element in the page carries the requested `id`.
    #[error("no element with id '{0}' in page")]
    ElementNotFound(String),

    /// Neither the node-transform API nor a transform processor is available.
    #[error("no XSLT transform mechanism is available")]
    TransformUnsupported,

    /// The stylesheet failed to compile or apply.
    #[error("XSLT transform failed: {0}")]
    Xslt(#[from] XsltError),

    /// The transform produced markup that could not be parsed.
    #[error("transform output is not well-formed: {0}")]
    Xml(#[from] XmlError),
}

/// Terminal outcomes counted by `FetchStats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum OutcomeType {
    /// The callback received a response (any HTTP status)
    Completed,
    /// The callback received a network error other than a timeout
    Failed,
    /// The callback received a timeout error
    TimedOut,
    /// The request was cancelled before completing
    Cancelled,
    /// `fetch` refused the request before any I/O
    Rejected,
}

impl fmt::Display for OutcomeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl OutcomeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeType::Completed => "completed",
            OutcomeType::Failed => "failed",
            OutcomeType::TimedOut => "timed out",
            OutcomeType::Cancelled => "cancelled",
            OutcomeType::Rejected => "rejected",
        }
    }
}
