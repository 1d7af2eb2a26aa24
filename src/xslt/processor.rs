//! Reusable XSLT processor and one-shot node transform.

use log::debug;

use super::stylesheet::Stylesheet;
use super::transform::Transformer;
use crate::error_handling::XsltError;
use crate::xml::XmlDocument;

/// Holds an imported stylesheet and top-level parameter values between
/// transforms.
///
/// A processor is meant to be reused: `reset` clears it before importing the
/// next stylesheet.
#[derive(Debug, Default)]
pub struct XsltProcessor {
    stylesheet: Option<Stylesheet>,
    parameters: Vec<(String, String)>,
}

impl XsltProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles `xsl` and makes it the active stylesheet, replacing any
    /// previous one. On error the processor keeps its previous state.
    pub fn import_stylesheet(&mut self, xsl: &XmlDocument) -> Result<(), XsltError> {
        self.stylesheet = Some(Stylesheet::compile(xsl)?);
        Ok(())
    }

    pub fn has_stylesheet(&self) -> bool {
        self.stylesheet.is_some()
    }

    /// Sets the value of a top-level `xsl:param`.
    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.parameters.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = value,
            None => self.parameters.push((name, value)),
        }
    }

    pub fn get_parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn clear_parameters(&mut self) {
        self.parameters.clear();
    }

    /// Drops the stylesheet and all parameters.
    pub fn reset(&mut self) {
        self.stylesheet = None;
        self.parameters.clear();
    }

    /// Transforms `source`, returning the result nodes as children of a
    /// fragment's document node.
    ///
    /// # Errors
    ///
    /// `XsltError::NoStylesheet` if nothing was imported, otherwise any error
    /// raised while evaluating the stylesheet.
    pub fn transform_to_fragment(&self, source: &XmlDocument) -> Result<XmlDocument, XsltError> {
        let stylesheet = self.stylesheet.as_ref().ok_or(XsltError::NoStylesheet)?;
        let fragment = Transformer::run(stylesheet, source, &self.parameters)?;
        debug!("Transform produced {} result nodes", fragment.children(fragment.root()).len());
        Ok(fragment)
    }

    /// Like `transform_to_fragment`, serialized to markup.
    pub fn transform_to_string(&self, source: &XmlDocument) -> Result<String, XsltError> {
        Ok(self.transform_to_fragment(source)?.to_xml_string())
    }
}

/// Transforms `source` with the stylesheet document `xsl` in one call and
/// returns the serialized result.
pub fn transform_node(source: &XmlDocument, xsl: &XmlDocument) -> Result<String, XsltError> {
    let stylesheet = Stylesheet::compile(xsl)?;
    Ok(Transformer::run(&stylesheet, source, &[])?.to_xml_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xslt::XSLT_NAMESPACE;

    fn stylesheet(body: &str) -> XmlDocument {
        XmlDocument::parse(&format!(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="{XSLT_NAMESPACE}">{body}</xsl:stylesheet>"#
        ))
        .expect("stylesheet should parse")
    }

    fn transform(xml: &str, body: &str) -> String {
        let source = XmlDocument::parse(xml).expect("source should parse");
        transform_node(&source, &stylesheet(body)).expect("transform should succeed")
    }

    const BOOKS: &str = r#"<books>
        <book year="2001"><title>Beta</title><price>10</price></book>
        <book year="1999"><title>Alpha</title><price>25</price></book>
        <book year="2010"><title>Gamma</title><price>7</price></book>
    </books>"#;

    #[test]
    fn test_for_each_with_sort_and_value_of() {
        let out = transform(
            BOOKS,
            r#"<xsl:template match="/">
                 <ul><xsl:for-each select="books/book">
                   <xsl:sort select="title"/>
                   <li><xsl:value-of select="position()"/>:<xsl:value-of select="title"/></li>
                 </xsl:for-each></ul>
               </xsl:template>"#,
        );
        assert_eq!(out, "<ul><li>1:Alpha</li><li>2:Beta</li><li>3:Gamma</li></ul>");
    }

    #[test]
    fn test_numeric_descending_sort() {
        let out = transform(
            BOOKS,
            r#"<xsl:template match="/">
                 <xsl:for-each select="//book">
                   <xsl:sort select="price" data-type="number" order="descending"/>
                   <xsl:value-of select="price"/><xsl:text>,</xsl:text>
                 </xsl:for-each>
               </xsl:template>"#,
        );
        assert_eq!(out, "25,10,7,");
    }

    #[test]
    fn test_apply_templates_priorities_and_builtins() {
        let out = transform(
            "<doc><a>one</a><b>two</b><c>three</c></doc>",
            r#"<xsl:template match="a"><A/></xsl:template>
               <xsl:template match="*"><X/></xsl:template>
               <xsl:template match="doc"><r><xsl:apply-templates/></r></xsl:template>
               <xsl:template match="c"><C1/></xsl:template>
               <xsl:template match="c"><C2/></xsl:template>"#,
        );
        assert_eq!(out, "<r><A/><X/><C2/></r>");

        // No templates at all: the built-in rules copy the text through
        let out = transform("<doc><a>one</a><b>two</b></doc>", "");
        assert_eq!(out, "onetwo");
    }

    #[test]
    fn test_modes_params_and_call_template() {
        let out = transform(
            "<doc><item>x</item><item>y</item></doc>",
            r#"<xsl:template match="/">
                 <xsl:apply-templates select="//item" mode="list">
                   <xsl:with-param name="prefix" select="'#'"/>
                 </xsl:apply-templates>
                 <xsl:call-template name="footer"><xsl:with-param name="n" select="count(//item)"/></xsl:call-template>
               </xsl:template>
               <xsl:template match="item" mode="list">
                 <xsl:param name="prefix" select="'?'"/>
                 <p><xsl:value-of select="concat($prefix, .)"/></p>
               </xsl:template>
               <xsl:template match="item"><wrong/></xsl:template>
               <xsl:template name="footer">
                 <xsl:param name="n"/>
                 <xsl:param name="label">total</xsl:param>
                 <f><xsl:value-of select="$label"/>=<xsl:value-of select="$n"/></f>
               </xsl:template>"#,
        );
        assert_eq!(out, "<p>#x</p><p>#y</p><f>total=2</f>");
    }

    #[test]
    fn test_choose_if_variables_and_avt() {
        let out = transform(
            BOOKS,
            r#"<xsl:variable name="limit" select="9"/>
               <xsl:template match="/">
                 <xsl:for-each select="//book">
                   <xsl:variable name="cheap" select="price &lt; $limit"/>
                   <item id="b{position()}" class="{$cheap}">
                     <xsl:choose>
                       <xsl:when test="@year &lt; 2000">old</xsl:when>
                       <xsl:when test="$cheap">cheap</xsl:when>
                       <xsl:otherwise>new</xsl:otherwise>
                     </xsl:choose>
                     <xsl:if test="position() = last()">!</xsl:if>
                   </item>
                 </xsl:for-each>
               </xsl:template>"#,
        );
        assert_eq!(
            out,
            r#"<item id="b1" class="false">new</item><item id="b2" class="false">old</item><item id="b3" class="true">cheap!</item>"#
        );
    }

    #[test]
    fn test_element_attribute_comment_copy() {
        let out = transform(
            r#"<doc><p class="x">hi <b>there</b></p></doc>"#,
            r#"<xsl:template match="/">
                 <xsl:element name="{name(/*)}-out">
                   <xsl:attribute name="n"><xsl:value-of select="count(//*)"/></xsl:attribute>
                   <xsl:comment>generated</xsl:comment>
                   <xsl:copy-of select="//p"/>
                   <xsl:apply-templates select="//b" mode="shallow"/>
                 </xsl:element>
               </xsl:template>
               <xsl:template match="*" mode="shallow"><xsl:copy>[<xsl:value-of select="."/>]</xsl:copy></xsl:template>"#,
        );
        assert_eq!(
            out,
            r#"<doc-out n="3"><!--generated--><p class="x">hi <b>there</b></p><b>[there]</b></doc-out>"#
        );
    }

    #[test]
    fn test_processor_parameters_override_globals() {
        let source = XmlDocument::parse("<a/>").expect("should parse");
        let xsl = stylesheet(
            r#"<xsl:param name="greeting" select="'hello'"/>
               <xsl:variable name="fixed" select="'v'"/>
               <xsl:template match="/"><g><xsl:value-of select="concat($greeting, $fixed)"/></g></xsl:template>"#,
        );
        let mut processor = XsltProcessor::new();
        processor.import_stylesheet(&xsl).expect("should import");
        assert_eq!(processor.transform_to_string(&source).expect("ok"), "<g>hellov</g>");

        processor.set_parameter("greeting", "hi");
        processor.set_parameter("fixed", "ignored");
        assert_eq!(processor.get_parameter("greeting"), Some("hi"));
        assert_eq!(processor.transform_to_string(&source).expect("ok"), "<g>hiv</g>");

        processor.reset();
        assert!(!processor.has_stylesheet());
        assert_eq!(processor.get_parameter("greeting"), None);
        assert_eq!(
            processor.transform_to_fragment(&source).unwrap_err(),
            XsltError::NoStylesheet
        );
    }

    #[test]
    fn test_recursion_limit() {
        let source = XmlDocument::parse("<a/>").expect("should parse");
        let xsl = stylesheet(
            r#"<xsl:template match="/" name="loop"><xsl:call-template name="loop"/></xsl:template>"#,
        );
        assert_eq!(
            transform_node(&source, &xsl).unwrap_err(),
            XsltError::RecursionLimit(crate::config::MAX_TEMPLATE_DEPTH)
        );
    }

    #[test]
    fn test_builtin_walk_is_bounded() {
        use crate::config::MAX_XML_DEPTH;
        let xsl = stylesheet(r#"<xsl:output method="xml"/>"#);

        let nested = "<a>".repeat(MAX_XML_DEPTH) + "x" + &"</a>".repeat(MAX_XML_DEPTH);
        let source = XmlDocument::parse(&nested).expect("limit depth parses");
        assert_eq!(transform_node(&source, &xsl).expect("ok"), "x");

        // Trees built in memory can be deeper than any parsed document
        let mut deep = XmlDocument::new();
        let mut parent = deep.root();
        for _ in 0..10_000 {
            let child = deep.create_element("a");
            deep.append_child(parent, child);
            parent = child;
        }
        assert_eq!(
            transform_node(&deep, &xsl).unwrap_err(),
            XsltError::RecursionLimit(MAX_XML_DEPTH)
        );
    }

    #[test]
    fn test_runtime_errors() {
        let source = XmlDocument::parse("<a/>").expect("should parse");
        let missing = stylesheet(
            r#"<xsl:template match="/"><xsl:call-template name="nope"/></xsl:template>"#,
        );
        assert_eq!(
            transform_node(&source, &missing).unwrap_err(),
            XsltError::UnknownTemplate("nope".into())
        );
        let unbound =
            stylesheet(r#"<xsl:template match="/"><xsl:value-of select="$v"/></xsl:template>"#);
        assert_eq!(
            transform_node(&source, &unbound).unwrap_err(),
            XsltError::UnknownVariable("v".into())
        );
        let scalar =
            stylesheet(r#"<xsl:template match="/"><xsl:for-each select="1"/></xsl:template>"#);
        assert!(matches!(
            transform_node(&source, &scalar).unwrap_err(),
            XsltError::NotANodeSet(_)
        ));
    }

    #[test]
    fn test_namespaced_source_needs_prefixed_patterns() {
        let out = transform(
            r#"<feed xmlns="http://www.w3.org/2005/Atom"><entry><title>T</title></entry></feed>"#,
            r#"<xsl:template match="/" xmlns:atom="http://www.w3.org/2005/Atom">
                 <xsl:for-each select="//atom:entry"><h><xsl:value-of select="atom:title"/></h></xsl:for-each>
                 <n><xsl:value-of select="count(//entry)"/></n>
               </xsl:template>"#,
        );
        assert_eq!(out, "<h>T</h><n>0</n>");
    }
}
