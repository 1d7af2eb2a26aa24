//! Compiles a parsed XSLT document into templates and instructions.

use std::collections::HashMap;

use log::debug;

use super::pattern::Pattern;
use super::xpath::XPath;
use crate::error_handling::XsltError;
use crate::xml::{NodeData, NodeId, XmlDocument};

/// Namespace URI identifying XSLT elements.
pub const XSLT_NAMESPACE: &str = "http://www.w3.org/1999/XSL/Transform";

/// A compiled stylesheet.
#[derive(Debug, Clone)]
pub struct Stylesheet {
    pub(crate) templates: Vec<Template>,
    /// Match rules in stylesheet order; later rules win priority ties
    pub(crate) rules: Vec<Rule>,
    pub(crate) named: HashMap<String, usize>,
    pub(crate) globals: Vec<Global>,
}

#[derive(Debug, Clone)]
pub(crate) struct Template {
    pub(crate) params: Vec<Binding>,
    pub(crate) body: Vec<Instruction>,
}

/// One alternative of a template's match pattern.
#[derive(Debug, Clone)]
pub(crate) struct Rule {
    pub(crate) pattern: Pattern,
    pub(crate) mode: Option<String>,
    pub(crate) priority: f64,
    pub(crate) template: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct Global {
    pub(crate) binding: Binding,
    /// `xsl:param` can be overridden by processor parameters, `xsl:variable` cannot
    pub(crate) is_param: bool,
}

/// A variable, parameter or `xsl:with-param`.
#[derive(Debug, Clone)]
pub(crate) struct Binding {
    pub(crate) name: String,
    pub(crate) value: BindingValue,
}

#[derive(Debug, Clone)]
pub(crate) enum BindingValue {
    Select(XPath),
    /// Content is instantiated and its text becomes a string value
    Content(Vec<Instruction>),
    Empty,
}

#[derive(Debug, Clone)]
pub(crate) struct SortKey {
    pub(crate) select: XPath,
    pub(crate) descending: bool,
    pub(crate) numeric: bool,
}

/// Attribute value template: literal text with `{expr}` holes.
#[derive(Debug, Clone)]
pub(crate) struct Avt {
    pub(crate) parts: Vec<AvtPart>,
}

#[derive(Debug, Clone)]
pub(crate) enum AvtPart {
    Literal(String),
    Expr(XPath),
}

#[derive(Debug, Clone)]
pub(crate) enum Instruction {
    LiteralElement {
        name: String,
        attributes: Vec<(String, Avt)>,
        body: Vec<Instruction>,
    },
    Text(String),
    ValueOf(XPath),
    ApplyTemplates {
        select: Option<XPath>,
        mode: Option<String>,
        sorts: Vec<SortKey>,
        params: Vec<Binding>,
    },
    CallTemplate {
        name: String,
        params: Vec<Binding>,
    },
    ForEach {
        select: XPath,
        sorts: Vec<SortKey>,
        body: Vec<Instruction>,
    },
    If {
        test: XPath,
        body: Vec<Instruction>,
    },
    Choose {
        whens: Vec<(XPath, Vec<Instruction>)>,
        otherwise: Vec<Instruction>,
    },
    Element {
        name: Avt,
        body: Vec<Instruction>,
    },
    Attribute {
        name: Avt,
        body: Vec<Instruction>,
    },
    Comment(Vec<Instruction>),
    Copy(Vec<Instruction>),
    CopyOf(XPath),
    Variable(Binding),
}

impl Stylesheet {
    /// Compiles `doc`, whose document element must be `xsl:stylesheet` or
    /// `xsl:transform` (or a literal result element carrying `xsl:version`).
    ///
    /// # Errors
    ///
    /// Returns the first `XsltError` found: an unsupported instruction, a
    /// missing required attribute, or a malformed expression or pattern.
    pub fn compile(doc: &XmlDocument) -> Result<Self, XsltError> {
        let root = doc
            .document_element()
            .ok_or_else(|| XsltError::NotAStylesheet(String::new()))?;
        let compiler = Compiler { doc };
        let mut stylesheet = Stylesheet {
            templates: Vec::new(),
            rules: Vec::new(),
            named: HashMap::new(),
            globals: Vec::new(),
        };

        match compiler.xslt_name(root) {
            Some("stylesheet" | "transform") => {}
            _ if compiler.has_xslt_attribute(root, "version") => {
                // Simplified form: the document element is the template for "/"
                let body = vec![compiler.literal_element(root)?];
                stylesheet.add_rule_template(
                    Pattern::parse_union("/", &|_| None)?,
                    None,
                    None,
                    Template {
                        params: Vec::new(),
                        body,
                    },
                );
                return Ok(stylesheet);
            }
            _ => {
                return Err(XsltError::NotAStylesheet(
                    doc.name(root).unwrap_or_default().to_string(),
                ))
            }
        }

        for &child in doc.children(root) {
            let Some(local) = compiler.xslt_name(child) else {
                // Top-level elements in other namespaces are user data
                continue;
            };
            match local {
                "template" => compiler.template(child, &mut stylesheet)?,
                "variable" | "param" => stylesheet.globals.push(Global {
                    binding: compiler.binding(child, local)?,
                    is_param: local == "param",
                }),
                "output" | "strip-space" | "preserve-space" => {
                    debug!("Ignoring top-level <xsl:{}>", local);
                }
                other => return Err(XsltError::UnsupportedInstruction(other.to_string())),
            }
        }

        debug!(
            "Compiled stylesheet: {} templates, {} match rules, {} globals",
            stylesheet.templates.len(),
            stylesheet.rules.len(),
            stylesheet.globals.len()
        );
        Ok(stylesheet)
    }

    fn add_rule_template(
        &mut self,
        alternatives: Vec<Pattern>,
        mode: Option<String>,
        priority: Option<f64>,
        template: Template,
    ) -> usize {
        let index = self.templates.len();
        self.templates.push(template);
        for pattern in alternatives {
            let priority = priority.unwrap_or_else(|| pattern.default_priority());
            self.rules.push(Rule {
                pattern,
                mode: mode.clone(),
                priority,
                template: index,
            });
        }
        index
    }
}

struct Compiler<'a> {
    doc: &'a XmlDocument,
}

impl Compiler<'_> {
    /// Local name of `id` if it is an element in the XSLT namespace.
    fn xslt_name(&self, id: NodeId) -> Option<&str> {
        if self.doc.namespace_uri(id) == Some(XSLT_NAMESPACE) {
            self.doc.local_name(id)
        } else {
            None
        }
    }

    fn has_xslt_attribute(&self, id: NodeId, local: &str) -> bool {
        self.doc.attributes(id).iter().any(|a| {
            matches!(
                a.name.split_once(':'),
                Some((prefix, name)) if name == local
                    && self.doc.lookup_namespace(id, Some(prefix)) == Some(XSLT_NAMESPACE)
            )
        })
    }

    fn required<'d>(
        &'d self,
        id: NodeId,
        element: &str,
        attribute: &'static str,
    ) -> Result<&'d str, XsltError> {
        self.doc
            .attribute(id, attribute)
            .ok_or_else(|| XsltError::MissingAttribute {
                element: element.to_string(),
                attribute,
            })
    }

    fn xpath(&self, id: NodeId, source: &str) -> Result<XPath, XsltError> {
        let doc = self.doc;
        XPath::parse_with_namespaces(source, &|prefix| {
            doc.lookup_namespace(id, Some(prefix)).map(str::to_string)
        })
    }

    fn required_xpath(
        &self,
        id: NodeId,
        element: &str,
        attribute: &'static str,
    ) -> Result<XPath, XsltError> {
        let source = self.required(id, element, attribute)?;
        self.xpath(id, source)
    }

    fn template(&self, id: NodeId, stylesheet: &mut Stylesheet) -> Result<(), XsltError> {
        let doc = self.doc;
        let name = doc.attribute(id, "name").map(str::to_string);
        let matches = match doc.attribute(id, "match") {
            Some(source) => Some(Pattern::parse_union(source, &|prefix| {
                doc.lookup_namespace(id, Some(prefix)).map(str::to_string)
            })?),
            None => None,
        };
        if name.is_none() && matches.is_none() {
            return Err(XsltError::MissingAttribute {
                element: "template".to_string(),
                attribute: "match",
            });
        }

        // xsl:param is only a template parameter before the first instruction
        let mut params = Vec::new();
        let mut rest = Vec::new();
        let mut leading = true;
        for &child in doc.children(id) {
            if leading && self.xslt_name(child) == Some("param") {
                params.push(self.binding(child, "param")?);
                continue;
            }
            match doc.data(child) {
                NodeData::Text(text) if text.trim().is_empty() => {}
                NodeData::Comment(_) => {}
                _ => leading = false,
            }
            rest.push(child);
        }
        let template = Template {
            params,
            body: self.instructions(&rest)?,
        };

        let index = match matches {
            Some(alternatives) => {
                let mode = doc.attribute(id, "mode").map(str::to_string);
                let priority = doc.attribute(id, "priority").and_then(|p| p.trim().parse().ok());
                stylesheet.add_rule_template(alternatives, mode, priority, template)
            }
            None => {
                stylesheet.templates.push(template);
                stylesheet.templates.len() - 1
            }
        };
        if let Some(name) = name {
            // A later template with the same name replaces an earlier one
            stylesheet.named.insert(name, index);
        }
        Ok(())
    }

    fn binding(&self, id: NodeId, element: &str) -> Result<Binding, XsltError> {
        let name = self.required(id, element, "name")?.to_string();
        let value = if let Some(select) = self.doc.attribute(id, "select") {
            BindingValue::Select(self.xpath(id, select)?)
        } else {
            let body = self.body(id)?;
            if body.is_empty() {
                BindingValue::Empty
            } else {
                BindingValue::Content(body)
            }
        };
        Ok(Binding { name, value })
    }

    fn body(&self, id: NodeId) -> Result<Vec<Instruction>, XsltError> {
        self.instructions(self.doc.children(id))
    }

    fn instructions(&self, nodes: &[NodeId]) -> Result<Vec<Instruction>, XsltError> {
        let mut out = Vec::new();
        for &node in nodes {
            match self.doc.data(node) {
                NodeData::Text(text) => {
                    if !text.trim().is_empty() {
                        out.push(Instruction::Text(text.clone()));
                    }
                }
                NodeData::Element(_) => match self.xslt_name(node) {
                    Some(local) => out.push(self.instruction(node, local)?),
                    None => out.push(self.literal_element(node)?),
                },
                NodeData::Comment(_) | NodeData::Document => {}
            }
        }
        Ok(out)
    }

    fn instruction(&self, id: NodeId, local: &str) -> Result<Instruction, XsltError> {
        let doc = self.doc;
        Ok(match local {
            "value-of" => Instruction::ValueOf(self.required_xpath(id, local, "select")?),
            "text" => Instruction::Text(doc.text_content(id)),
            "copy-of" => Instruction::CopyOf(self.required_xpath(id, local, "select")?),
            "copy" => Instruction::Copy(self.body(id)?),
            "comment" => Instruction::Comment(self.body(id)?),
            "if" => Instruction::If {
                test: self.required_xpath(id, local, "test")?,
                body: self.body(id)?,
            },
            "element" | "attribute" => {
                let name = self.avt(id, self.required(id, local, "name")?)?;
                let body = self.body(id)?;
                if local == "element" {
                    Instruction::Element { name, body }
                } else {
                    Instruction::Attribute { name, body }
                }
            }
            "variable" | "param" => Instruction::Variable(self.binding(id, local)?),
            "choose" => {
                let mut whens = Vec::new();
                let mut otherwise = Vec::new();
                for &child in doc.children(id) {
                    match self.xslt_name(child) {
                        Some("when") => whens.push((
                            self.required_xpath(child, "when", "test")?,
                            self.body(child)?,
                        )),
                        Some("otherwise") => otherwise = self.body(child)?,
                        Some(other) => {
                            return Err(XsltError::UnsupportedInstruction(other.to_string()))
                        }
                        None => {}
                    }
                }
                Instruction::Choose { whens, otherwise }
            }
            "for-each" => {
                let (sorts, rest) = self.split_sorts(id)?;
                Instruction::ForEach {
                    select: self.required_xpath(id, local, "select")?,
                    sorts,
                    body: self.instructions(&rest)?,
                }
            }
            "apply-templates" => {
                let select = match doc.attribute(id, "select") {
                    Some(source) => Some(self.xpath(id, source)?),
                    None => None,
                };
                let (sorts, rest) = self.split_sorts(id)?;
                Instruction::ApplyTemplates {
                    select,
                    mode: doc.attribute(id, "mode").map(str::to_string),
                    sorts,
                    params: self.with_params(&rest)?,
                }
            }
            "call-template" => {
                let children = doc.children(id).to_vec();
                Instruction::CallTemplate {
                    name: self.required(id, local, "name")?.to_string(),
                    params: self.with_params(&children)?,
                }
            }
            other => return Err(XsltError::UnsupportedInstruction(other.to_string())),
        })
    }

    /// Separates the `xsl:sort` children of `id` from the rest.
    fn split_sorts(&self, id: NodeId) -> Result<(Vec<SortKey>, Vec<NodeId>), XsltError> {
        let mut sorts = Vec::new();
        let mut rest = Vec::new();
        for &child in self.doc.children(id) {
            if self.xslt_name(child) == Some("sort") {
                sorts.push(SortKey {
                    select: self.xpath(child, self.doc.attribute(child, "select").unwrap_or("."))?,
                    descending: self.doc.attribute(child, "order") == Some("descending"),
                    numeric: self.doc.attribute(child, "data-type") == Some("number"),
                });
            } else {
                rest.push(child);
            }
        }
        Ok((sorts, rest))
    }

    fn with_params(&self, nodes: &[NodeId]) -> Result<Vec<Binding>, XsltError> {
        let mut params = Vec::new();
        for &node in nodes {
            match self.xslt_name(node) {
                Some("with-param") => params.push(self.binding(node, "with-param")?),
                Some(other) => return Err(XsltError::UnsupportedInstruction(other.to_string())),
                None => {}
            }
        }
        Ok(params)
    }

    fn literal_element(&self, id: NodeId) -> Result<Instruction, XsltError> {
        let doc = self.doc;
        let mut attributes = Vec::new();
        for attr in doc.attributes(id) {
            let is_xslt = match attr.name.split_once(':') {
                Some(("xmlns", _)) => attr.value == XSLT_NAMESPACE,
                Some((prefix, _)) => doc.lookup_namespace(id, Some(prefix)) == Some(XSLT_NAMESPACE),
                None => false,
            };
            if !is_xslt {
                attributes.push((attr.name.clone(), self.avt(id, &attr.value)?));
            }
        }
        Ok(Instruction::LiteralElement {
            name: doc.name(id).unwrap_or_default().to_string(),
            attributes,
            body: self.body(id)?,
        })
    }

    fn avt(&self, id: NodeId, source: &str) -> Result<Avt, XsltError> {
        let syntax = |position: usize, message: &str| XsltError::XPathSyntax {
            expr: source.to_string(),
            position,
            message: message.to_string(),
        };
        let chars: Vec<char> = source.chars().collect();
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut i = 0;
        while i < chars.len() {
            match chars[i] {
                '{' if chars.get(i + 1) == Some(&'{') => {
                    literal.push('{');
                    i += 2;
                }
                '}' if chars.get(i + 1) == Some(&'}') => {
                    literal.push('}');
                    i += 2;
                }
                '{' => {
                    let start = i + 1;
                    let mut j = start;
                    let mut quote = None;
                    while j < chars.len() {
                        match (quote, chars[j]) {
                            (None, '}') => break,
                            (None, q @ ('"' | '\'')) => quote = Some(q),
                            (Some(q), c) if c == q => quote = None,
                            _ => {}
                        }
                        j += 1;
                    }
                    if j >= chars.len() {
                        return Err(syntax(i, "unterminated '{' in attribute value template"));
                    }
                    if !literal.is_empty() {
                        parts.push(AvtPart::Literal(std::mem::take(&mut literal)));
                    }
                    let expr: String = chars[start..j].iter().collect();
                    parts.push(AvtPart::Expr(self.xpath(id, &expr)?));
                    i = j + 1;
                }
                '}' => return Err(syntax(i, "unmatched '}' in attribute value template")),
                c => {
                    literal.push(c);
                    i += 1;
                }
            }
        }
        if !literal.is_empty() {
            parts.push(AvtPart::Literal(literal));
        }
        Ok(Avt { parts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(body: &str) -> Result<Stylesheet, XsltError> {
        let source = format!(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="{XSLT_NAMESPACE}">{body}</xsl:stylesheet>"#
        );
        Stylesheet::compile(&XmlDocument::parse(&source).expect("should parse"))
    }

    #[test]
    fn test_templates_rules_and_names() {
        let sheet = compile(
            r#"<xsl:template match="a | b" mode="m"/>
               <xsl:template name="helper"><xsl:param name="x"/>text</xsl:template>
               <xsl:template match="c" name="both" priority="2"/>"#,
        )
        .expect("should compile");
        assert_eq!(sheet.templates.len(), 3);
        assert_eq!(sheet.rules.len(), 3);
        assert_eq!(sheet.rules[0].mode.as_deref(), Some("m"));
        assert_eq!(sheet.rules[2].priority, 2.0);
        assert_eq!(sheet.named.get("helper"), Some(&1));
        assert_eq!(sheet.named.get("both"), Some(&2));
        assert_eq!(sheet.templates[1].params.len(), 1);
        assert_eq!(sheet.templates[1].body.len(), 1);
    }

    #[test]
    fn test_whitespace_text_is_stripped_except_in_xsl_text() {
        let sheet = compile(
            r#"<xsl:template match="/">
                 <p> <xsl:text> </xsl:text> </p>
               </xsl:template>"#,
        )
        .expect("should compile");
        match &sheet.templates[0].body[..] {
            [Instruction::LiteralElement { body, .. }] => {
                assert!(matches!(&body[..], [Instruction::Text(t)] if t == " "));
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn test_attribute_value_templates() {
        let sheet = compile(
            r#"<xsl:template match="/"><a href="/item/{@id}?q={{x}}" class="{concat('a', '}')}"/></xsl:template>"#,
        )
        .expect("should compile");
        let Instruction::LiteralElement { attributes, .. } = &sheet.templates[0].body[0] else {
            panic!("expected literal element");
        };
        let href = &attributes[0].1.parts;
        assert_eq!(href.len(), 3);
        assert!(matches!(&href[0], AvtPart::Literal(s) if s == "/item/"));
        assert!(matches!(&href[2], AvtPart::Literal(s) if s == "?q={x}"));
        assert_eq!(attributes[1].1.parts.len(), 1);
    }

    #[test]
    fn test_compile_errors() {
        assert!(matches!(
            compile(r#"<xsl:template match="/"><xsl:value-of/></xsl:template>"#),
            Err(XsltError::MissingAttribute { attribute: "select", .. })
        ));
        assert_eq!(
            compile(r#"<xsl:key name="k" match="a" use="b"/>"#).unwrap_err(),
            XsltError::UnsupportedInstruction("key".into())
        );
        assert_eq!(
            compile(r#"<xsl:template match="/"><xsl:number/></xsl:template>"#).unwrap_err(),
            XsltError::UnsupportedInstruction("number".into())
        );
        assert!(matches!(
            compile(r#"<xsl:template match="/"><xsl:if test="(("/></xsl:template>"#),
            Err(XsltError::XPathSyntax { .. })
        ));
        assert!(matches!(
            compile(r#"<xsl:template/>"#),
            Err(XsltError::MissingAttribute { attribute: "match", .. })
        ));
    }

    #[test]
    fn test_rejects_non_stylesheet_documents() {
        let doc = XmlDocument::parse("<html><body/></html>").expect("should parse");
        assert_eq!(
            Stylesheet::compile(&doc).unwrap_err(),
            XsltError::NotAStylesheet("html".into())
        );
    }

    #[test]
    fn test_simplified_stylesheet() {
        let doc = XmlDocument::parse(&format!(
            r#"<html xsl:version="1.0" xmlns:xsl="{XSLT_NAMESPACE}"><p><xsl:value-of select="/a"/></p></html>"#
        ))
        .expect("should parse");
        let sheet = Stylesheet::compile(&doc).expect("should compile");
        assert_eq!(sheet.rules.len(), 1);
        let Instruction::LiteralElement { attributes, .. } = &sheet.templates[0].body[0] else {
            panic!("expected literal element");
        };
        assert!(attributes.is_empty());
    }
}
