//! xml_fetch library: HTTP fetching, XML import and XSLT rendering.
//!
//! This library issues GET requests through a transport chosen by capability
//! probing, imports XML documents with optional cache-busting, and renders
//! a document through an XSLT stylesheet into an element of a page.
//!
//! # Example
//!
//! ```no_run
//! use xml_fetch::{Capabilities, FetchConfig, XmlDocument, XmlImporter, XslRenderer};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let importer = XmlImporter::detect(&Capabilities::detect(), FetchConfig::default())?;
//! let feed = importer.load("https://example.com/feed.xml", false).await?;
//! let xsl = importer.load("https://example.com/feed.xsl", true).await?;
//!
//! let mut page = XmlDocument::parse(r#"<html><body><div id="news"/></body></html>"#)?;
//! XslRenderer::new().render(&mut page, &feed, &xsl, "news")?;
//! println!("{page}");
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! Fetching requires a Tokio runtime. Use `#[tokio::main]` in your application
//! or make sure `fetch` is called from within an async context.

mod app;
pub mod config;
mod error_handling;
pub mod fetch;
pub mod import;
pub mod initialization;
pub mod render;
pub mod transport;
pub mod xml;
pub mod xslt;

// Re-export public API
pub use app::{run_import, ImportReport};
pub use config::{Config, FetchConfig, LogFormat, LogLevel, Opt, TransportPreference};
pub use error_handling::{
    FetchError, FetchStats, InitializationError, NetworkErrorKind, OutcomeType, RenderError,
    XmlError, XsltError,
};
pub use fetch::{HttpFetcher, PendingRegistry, RequestHandle, RequestStatus, Response};
pub use import::XmlImporter;
pub use render::{TransformCapabilities, XslRenderer};
pub use transport::{Capabilities, Transport, TransportKind};
pub use xml::{NodeId, XmlDocument};
pub use xslt::{transform_node, XsltProcessor};
