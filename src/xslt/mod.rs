//! XSLT 1.0 subset.
//!
//! Stylesheets are compiled once (`Stylesheet::compile`) into templates and
//! instruction trees, then applied to a source document by the transformer.
//! `XsltProcessor` keeps a compiled stylesheet and its parameters between
//! transforms; `transform_node` does a compile-and-apply in one call.
//!
//! Result tree fragments bound to variables are converted to strings.

mod pattern;
mod processor;
mod stylesheet;
mod transform;
pub mod xpath;

pub use pattern::Pattern;
pub use processor::{transform_node, XsltProcessor};
pub use stylesheet::{Stylesheet, XSLT_NAMESPACE};
