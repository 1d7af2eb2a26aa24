//! Rendering an XML document through an XSLT stylesheet into a page.

use std::sync::{Mutex, PoisonError};

use log::debug;

use crate::error_handling::RenderError;
use crate::xml::XmlDocument;
use crate::xslt::{transform_node, XsltProcessor};

/// Transform mechanisms the renderer may use.
///
/// `node_transform` is the one-shot `transform_node` API; `processor` is
/// the reusable `XsltProcessor`. The node transform is preferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformCapabilities {
    pub node_transform: bool,
    pub processor: bool,
}

impl TransformCapabilities {
    /// Both mechanisms, as built into this crate.
    pub fn detect() -> Self {
        Self {
            node_transform: true,
            processor: true,
        }
    }

    pub fn none() -> Self {
        Self {
            node_transform: false,
            processor: false,
        }
    }
}

/// Replaces the content of a page element with a transform result.
#[derive(Debug)]
pub struct XslRenderer {
    capabilities: TransformCapabilities,
    processor: Mutex<XsltProcessor>,
}

impl XslRenderer {
    pub fn new() -> Self {
        Self::with_capabilities(TransformCapabilities::detect())
    }

    pub fn with_capabilities(capabilities: TransformCapabilities) -> Self {
        Self {
            capabilities,
            processor: Mutex::new(XsltProcessor::new()),
        }
    }

    pub fn capabilities(&self) -> TransformCapabilities {
        self.capabilities
    }

    /// Transforms `xml` with `xsl` and makes the result the only content of
    /// the element of `page` whose `id` is `target_id`.
    ///
    /// `page` is left untouched on every error.
    ///
    /// # Errors
    ///
    /// - `RenderError::ElementNotFound` if no element has that `id`
    /// - `RenderError::TransformUnsupported` if no mechanism is enabled
    /// - `RenderError::Xslt` for stylesheet compile or runtime errors
    /// - `RenderError::Xml` if node-transform output cannot be re-parsed
    pub fn render(
        &self,
        page: &mut XmlDocument,
        xml: &XmlDocument,
        xsl: &XmlDocument,
        target_id: &str,
    ) -> Result<(), RenderError> {
        let target = page
            .get_element_by_id(target_id)
            .ok_or_else(|| RenderError::ElementNotFound(target_id.to_string()))?;
        let fragment = self.transform(xml, xsl)?;
        page.replace_children(target, &fragment, fragment.root());
        debug!("Rendered transform result into #{target_id}");
        Ok(())
    }

    /// Runs the transform with the first enabled mechanism and returns the
    /// result as a fragment.
    pub fn transform(
        &self,
        xml: &XmlDocument,
        xsl: &XmlDocument,
    ) -> Result<XmlDocument, RenderError> {
        if self.capabilities.node_transform {
            let markup = transform_node(xml, xsl)?;
            return Ok(XmlDocument::parse_fragment(&markup)?);
        }
        if self.capabilities.processor {
            let mut processor = self.processor.lock().unwrap_or_else(PoisonError::into_inner);
            processor.reset();
            processor.import_stylesheet(xsl)?;
            return Ok(processor.transform_to_fragment(xml)?);
        }
        Err(RenderError::TransformUnsupported)
    }
}

impl Default for XslRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::XsltError;
    use crate::xslt::XSLT_NAMESPACE;

    const PAGE: &str = r#"<html><body><h1>News</h1><div id="news"><p>Loading...</p></div></body></html>"#;
    const FEED: &str = "<feed><item>One</item><item>Two</item></feed>";

    fn xsl() -> XmlDocument {
        XmlDocument::parse(&format!(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="{XSLT_NAMESPACE}">
                 <xsl:template match="/"><ul><xsl:apply-templates select="feed/item"/></ul></xsl:template>
                 <xsl:template match="item"><li><xsl:value-of select="."/></li></xsl:template>
               </xsl:stylesheet>"#
        ))
        .expect("stylesheet should parse")
    }

    fn parse(text: &str) -> XmlDocument {
        XmlDocument::parse(text).expect("should parse")
    }

    #[test]
    fn test_render_replaces_target_content() {
        let mut page = parse(PAGE);
        XslRenderer::new()
            .render(&mut page, &parse(FEED), &xsl(), "news")
            .expect("render should succeed");
        assert_eq!(
            page.to_xml_string(),
            r#"<html><body><h1>News</h1><div id="news"><ul><li>One</li><li>Two</li></ul></div></body></html>"#
        );
    }

    #[test]
    fn test_both_mechanisms_render_the_same() {
        let mut via_node = parse(PAGE);
        let mut via_processor = parse(PAGE);
        XslRenderer::new()
            .render(&mut via_node, &parse(FEED), &xsl(), "news")
            .expect("node transform");
        let processor_only = XslRenderer::with_capabilities(TransformCapabilities {
            node_transform: false,
            processor: true,
        });
        processor_only
            .render(&mut via_processor, &parse(FEED), &xsl(), "news")
            .expect("processor transform");
        assert_eq!(via_node.to_xml_string(), via_processor.to_xml_string());

        // The shared processor is reset between renders
        let mut again = parse(PAGE);
        processor_only
            .render(&mut again, &parse(FEED), &xsl(), "news")
            .expect("second processor transform");
        assert_eq!(again.to_xml_string(), via_node.to_xml_string());
    }

    #[test]
    fn test_missing_target_leaves_page_unmodified() {
        let mut page = parse(PAGE);
        let err = XslRenderer::new()
            .render(&mut page, &parse(FEED), &xsl(), "nope")
            .unwrap_err();
        assert!(matches!(err, RenderError::ElementNotFound(ref id) if id == "nope"));
        assert_eq!(page.to_xml_string(), PAGE);
    }

    #[test]
    fn test_no_mechanism_is_unsupported() {
        let mut page = parse(PAGE);
        let err = XslRenderer::with_capabilities(TransformCapabilities::none())
            .render(&mut page, &parse(FEED), &xsl(), "news")
            .unwrap_err();
        assert!(matches!(err, RenderError::TransformUnsupported));
        assert_eq!(page.to_xml_string(), PAGE);
    }

    fn stylesheet(body: &str) -> XmlDocument {
        parse(&format!(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="{XSLT_NAMESPACE}">
                 <xsl:template match="/">{body}</xsl:template>
               </xsl:stylesheet>"#
        ))
    }

    #[test]
    fn test_unwritable_output_fails_the_same_on_both_mechanisms() {
        let processor_only = XslRenderer::with_capabilities(TransformCapabilities {
            node_transform: false,
            processor: true,
        });
        let cases = [
            (
                r#"<p><xsl:attribute name="{substring('x', 5)}">v</xsl:attribute></p>"#,
                XsltError::InvalidName(String::new()),
            ),
            (
                r#"<xsl:element name="bad name"/>"#,
                XsltError::InvalidName("bad name".into()),
            ),
            (
                "<xsl:comment>a--b</xsl:comment>",
                XsltError::InvalidComment("a--b".into()),
            ),
        ];
        for (body, expected) in cases {
            let xsl = stylesheet(body);
            for renderer in [&XslRenderer::new(), &processor_only] {
                let mut page = parse(PAGE);
                match renderer.render(&mut page, &parse(FEED), &xsl, "news") {
                    Err(RenderError::Xslt(err)) => assert_eq!(err, expected, "{body}"),
                    other => panic!("expected {expected:?} for {body}, got {other:?}"),
                }
                assert_eq!(page.to_xml_string(), PAGE);
            }
        }
    }

    #[test]
    fn test_deeply_nested_select_is_a_syntax_error() {
        let select = "(".repeat(50_000) + "1" + &")".repeat(50_000);
        let xsl = stylesheet(&format!(r#"<xsl:value-of select="{select}"/>"#));
        let err = XslRenderer::new().transform(&parse(FEED), &xsl).unwrap_err();
        assert!(
            matches!(err, RenderError::Xslt(XsltError::XPathSyntax { .. })),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn test_stylesheet_errors_leave_page_unmodified() {
        let mut page = parse(PAGE);
        let err = XslRenderer::new()
            .render(&mut page, &parse(FEED), &parse("<not-xsl/>"), "news")
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::Xslt(XsltError::NotAStylesheet(ref name)) if name == "not-xsl"
        ));
        assert_eq!(page.to_xml_string(), PAGE);
    }
}
