//! XPath 1.0 expressions: syntax tree, values and evaluation.
//!
//! The subset covers location paths over the child, descendant, self,
//! parent, ancestor, sibling, following/preceding and attribute axes,
//! predicates, unions, the arithmetic, relational and boolean operators,
//! variables, and the core function library used by typical stylesheets.

mod eval;
mod functions;
pub(crate) mod lexer;
mod parser;

use std::fmt;

use crate::error_handling::XsltError;
use crate::xml::{NodeData, NodeId, XmlDocument};

pub use eval::EvalContext;
pub(crate) use eval::{apply_predicate, axis_nodes};

/// A node reachable by XPath: a tree node or an attribute of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Node(NodeId),
    /// Element and index into its attribute list
    Attribute(NodeId, usize),
}

impl NodeRef {
    /// The XPath string-value.
    pub fn string_value(self, doc: &XmlDocument) -> String {
        match self {
            NodeRef::Node(id) => doc.text_content(id),
            NodeRef::Attribute(el, i) => doc
                .attributes(el)
                .get(i)
                .map(|a| a.value.clone())
                .unwrap_or_default(),
        }
    }

    pub fn parent(self, doc: &XmlDocument) -> Option<NodeId> {
        match self {
            NodeRef::Node(id) => doc.parent(id),
            NodeRef::Attribute(el, _) => Some(el),
        }
    }

    /// Qualified name for elements and attributes, empty otherwise.
    pub fn name(self, doc: &XmlDocument) -> String {
        match self {
            NodeRef::Node(id) => doc.name(id).unwrap_or_default().to_string(),
            NodeRef::Attribute(el, i) => doc
                .attributes(el)
                .get(i)
                .map(|a| a.name.clone())
                .unwrap_or_default(),
        }
    }

    pub fn local_name(self, doc: &XmlDocument) -> String {
        crate::xml::split_qname(&self.name(doc)).1.to_string()
    }

    /// Namespace URI of the node's name, empty when it has none.
    pub fn namespace_uri(self, doc: &XmlDocument) -> String {
        match self {
            NodeRef::Node(id) => doc.namespace_uri(id).unwrap_or_default().to_string(),
            NodeRef::Attribute(el, _) => {
                let name = self.name(doc);
                match crate::xml::split_qname(&name).0 {
                    Some(prefix) => doc
                        .lookup_namespace(el, Some(prefix))
                        .unwrap_or_default()
                        .to_string(),
                    // Unprefixed attributes are in no namespace
                    None => String::new(),
                }
            }
        }
    }

    pub fn is_attribute(self) -> bool {
        matches!(self, NodeRef::Attribute(..))
    }

    pub fn is_element(self, doc: &XmlDocument) -> bool {
        matches!(self, NodeRef::Node(id) if doc.is_element(id))
    }

    /// Key ordering nodes by document order; attributes follow their element
    /// and precede its children.
    fn order_key(self, doc: &XmlDocument) -> (Vec<usize>, u8, usize) {
        let (node, kind, attr) = match self {
            NodeRef::Node(id) => (id, 0, 0),
            NodeRef::Attribute(el, i) => (el, 1, i),
        };
        let mut path = Vec::new();
        let mut current = node;
        while let Some(parent) = doc.parent(current) {
            let index = doc
                .children(parent)
                .iter()
                .position(|&c| c == current)
                .unwrap_or(0);
            path.push(index);
            current = parent;
        }
        path.reverse();
        (path, kind, attr)
    }
}

/// Sorts `nodes` into document order and removes duplicates.
pub fn sort_document_order(doc: &XmlDocument, nodes: &mut Vec<NodeRef>) {
    if nodes.len() < 2 {
        return;
    }
    let mut keyed: Vec<_> = nodes.drain(..).map(|n| (n.order_key(doc), n)).collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.dedup_by(|a, b| a.1 == b.1);
    nodes.extend(keyed.into_iter().map(|(_, n)| n));
}

/// The result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Node-set, kept in document order
    Nodes(Vec<NodeRef>),
    String(String),
    Number(f64),
    Boolean(bool),
}

impl Value {
    pub fn to_string_value(&self, doc: &XmlDocument) -> String {
        match self {
            Value::Nodes(nodes) => nodes
                .first()
                .map(|n| n.string_value(doc))
                .unwrap_or_default(),
            Value::String(s) => s.clone(),
            Value::Number(n) => format_number(*n),
            Value::Boolean(b) => b.to_string(),
        }
    }

    pub fn to_number(&self, doc: &XmlDocument) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::String(s) => parse_number(s),
            Value::Nodes(_) => parse_number(&self.to_string_value(doc)),
        }
    }

    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Nodes(nodes) => !nodes.is_empty(),
            Value::String(s) => !s.is_empty(),
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Boolean(b) => *b,
        }
    }
}

/// Formats a number the way XPath's `string()` does.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// XPath `number()` on a string: optional whitespace, optional minus, digits
/// with an optional fraction. Anything else is NaN.
pub fn parse_number(s: &str) -> f64 {
    let trimmed = s.trim();
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let mut seen_digit = false;
    let mut seen_dot = false;
    for c in digits.chars() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => return f64::NAN,
        }
    }
    if !seen_digit {
        return f64::NAN;
    }
    trimmed.parse().unwrap_or(f64::NAN)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Union,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "or",
            BinaryOp::And => "and",
            BinaryOp::Equal => "=",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "div",
            BinaryOp::Modulo => "mod",
            BinaryOp::Union => "|",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    Negate(Box<Expr>),
    Path(PathExpr),
    /// Primary expression followed by predicates
    Filter(Box<Expr>, Vec<Expr>),
    Literal(String),
    Number(f64),
    Variable(String),
    Function(String, Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathExpr {
    pub start: PathStart,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathStart {
    /// `/...`
    Root,
    /// Relative to the context node
    Context,
    /// `expr/...`, where `expr` must yield a node-set
    Filter(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

impl Step {
    /// The `descendant-or-self::node()` step that `//` abbreviates.
    pub fn descendant_or_self() -> Self {
        Step {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::Node,
            predicates: Vec::new(),
        }
    }

    pub fn is_descendant_or_self(&self) -> bool {
        self.axis == Axis::DescendantOrSelf
            && self.test == NodeTest::Node
            && self.predicates.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Self_,
    Parent,
    Ancestor,
    AncestorOrSelf,
    Attribute,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
}

impl Axis {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "self" => Axis::Self_,
            "parent" => Axis::Parent,
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "attribute" => Axis::Attribute,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            "following" => Axis::Following,
            "preceding" => Axis::Preceding,
            _ => return None,
        })
    }

    fn name(self) -> &'static str {
        match self {
            Axis::Child => "child",
            Axis::Descendant => "descendant",
            Axis::DescendantOrSelf => "descendant-or-self",
            Axis::Self_ => "self",
            Axis::Parent => "parent",
            Axis::Ancestor => "ancestor",
            Axis::AncestorOrSelf => "ancestor-or-self",
            Axis::Attribute => "attribute",
            Axis::FollowingSibling => "following-sibling",
            Axis::PrecedingSibling => "preceding-sibling",
            Axis::Following => "following",
            Axis::Preceding => "preceding",
        }
    }

    /// Reverse axes number their nodes nearest-first.
    pub fn is_reverse(self) -> bool {
        matches!(
            self,
            Axis::Parent
                | Axis::Ancestor
                | Axis::AncestorOrSelf
                | Axis::PrecedingSibling
                | Axis::Preceding
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeTest {
    /// `name` or `prefix:name`. `uri` is filled in once the prefix has been
    /// resolved against the stylesheet's namespace declarations.
    Name {
        prefix: Option<String>,
        local: String,
        uri: Option<String>,
    },
    /// `prefix:*`
    NamespaceWildcard { prefix: String, uri: Option<String> },
    /// `*`
    Wildcard,
    Text,
    Comment,
    Node,
    ProcessingInstruction,
}

impl NodeTest {
    /// Whether `node`, reached on `axis`, passes this test.
    pub fn matches(&self, doc: &XmlDocument, node: NodeRef, axis: Axis) -> bool {
        let principal = if axis == Axis::Attribute {
            node.is_attribute()
        } else {
            node.is_element(doc)
        };
        match self {
            NodeTest::Node => true,
            NodeTest::Text => {
                matches!(node, NodeRef::Node(id) if matches!(doc.data(id), NodeData::Text(_)))
            }
            NodeTest::Comment => {
                matches!(node, NodeRef::Node(id) if matches!(doc.data(id), NodeData::Comment(_)))
            }
            NodeTest::ProcessingInstruction => false,
            NodeTest::Wildcard => principal,
            NodeTest::NamespaceWildcard { prefix, uri } => {
                principal && namespace_matches(doc, node, Some(prefix), uri.as_deref())
            }
            NodeTest::Name { prefix, local, uri } => {
                principal
                    && node.local_name(doc) == *local
                    && namespace_matches(doc, node, prefix.as_deref(), uri.as_deref())
            }
        }
    }
}

fn namespace_matches(
    doc: &XmlDocument,
    node: NodeRef,
    prefix: Option<&str>,
    uri: Option<&str>,
) -> bool {
    match (prefix, uri) {
        (_, Some(uri)) => node.namespace_uri(doc) == uri,
        // Unresolved prefix: compare it literally
        (Some(prefix), None) => crate::xml::split_qname(&node.name(doc)).0 == Some(prefix),
        (None, None) => node.namespace_uri(doc).is_empty(),
    }
}

/// A parsed XPath expression together with its source text.
#[derive(Debug, Clone, PartialEq)]
pub struct XPath {
    source: String,
    expr: Expr,
}

impl XPath {
    /// Parses `source`. Prefixed name tests stay unresolved and match by
    /// literal prefix.
    pub fn parse(source: &str) -> Result<Self, XsltError> {
        Ok(Self {
            source: source.to_string(),
            expr: parser::parse(source)?,
        })
    }

    /// Parses `source`, resolving every prefix in a name test with `resolve`.
    ///
    /// # Errors
    ///
    /// Fails with `XPathSyntax` when a prefix has no binding.
    pub fn parse_with_namespaces(
        source: &str,
        resolve: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, XsltError> {
        let mut xpath = Self::parse(source)?;
        if let Err(prefix) = resolve_prefixes(&mut xpath.expr, resolve) {
            return Err(XsltError::XPathSyntax {
                expr: source.to_string(),
                position: source.find(&format!("{prefix}:")).unwrap_or(0),
                message: format!("undeclared namespace prefix '{prefix}'"),
            });
        }
        Ok(xpath)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Value, XsltError> {
        eval::evaluate(&self.expr, ctx)
    }

    /// Evaluates and requires a node-set.
    pub fn select(&self, ctx: &EvalContext<'_>) -> Result<Vec<NodeRef>, XsltError> {
        match self.evaluate(ctx)? {
            Value::Nodes(nodes) => Ok(nodes),
            _ => Err(XsltError::NotANodeSet(self.source.clone())),
        }
    }

    pub fn evaluate_string(&self, ctx: &EvalContext<'_>) -> Result<String, XsltError> {
        Ok(self.evaluate(ctx)?.to_string_value(ctx.doc))
    }

    pub fn evaluate_boolean(&self, ctx: &EvalContext<'_>) -> Result<bool, XsltError> {
        Ok(self.evaluate(ctx)?.to_boolean())
    }
}

impl fmt::Display for XPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn resolve_prefixes(
    expr: &mut Expr,
    resolve: &dyn Fn(&str) -> Option<String>,
) -> Result<(), String> {
    match expr {
        Expr::Binary(left, _, right) => {
            resolve_prefixes(left, resolve)?;
            resolve_prefixes(right, resolve)
        }
        Expr::Negate(inner) => resolve_prefixes(inner, resolve),
        Expr::Filter(primary, predicates) => {
            resolve_prefixes(primary, resolve)?;
            predicates.iter_mut().try_for_each(|p| resolve_prefixes(p, resolve))
        }
        Expr::Function(_, args) => args.iter_mut().try_for_each(|a| resolve_prefixes(a, resolve)),
        Expr::Path(path) => resolve_path_prefixes(path, resolve),
        Expr::Literal(_) | Expr::Number(_) | Expr::Variable(_) => Ok(()),
    }
}

fn resolve_path_prefixes(
    path: &mut PathExpr,
    resolve: &dyn Fn(&str) -> Option<String>,
) -> Result<(), String> {
    if let PathStart::Filter(primary) = &mut path.start {
        resolve_prefixes(primary, resolve)?;
    }
    for step in &mut path.steps {
        match &mut step.test {
            NodeTest::Name {
                prefix: Some(prefix),
                uri,
                ..
            }
            | NodeTest::NamespaceWildcard { prefix, uri } => {
                *uri = Some(resolve(prefix).ok_or_else(|| prefix.clone())?);
            }
            _ => {}
        }
        for predicate in &mut step.predicates {
            resolve_prefixes(predicate, resolve)?;
        }
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Binary(left, op, right) => write!(f, "({left} {} {right})", op.symbol()),
            Expr::Negate(inner) => write!(f, "-{inner}"),
            Expr::Path(path) => write!(f, "{path}"),
            Expr::Filter(primary, predicates) => {
                write!(f, "{primary}")?;
                predicates.iter().try_for_each(|p| write!(f, "[{p}]"))
            }
            Expr::Literal(s) => write!(f, "'{s}'"),
            Expr::Number(n) => f.write_str(&format_number(*n)),
            Expr::Variable(name) => write!(f, "${name}"),
            Expr::Function(name, args) => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.start {
            PathStart::Root => f.write_str("/")?,
            PathStart::Context => {}
            PathStart::Filter(primary) => write!(f, "{primary}/")?,
        }
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}::", step.axis.name())?;
            match &step.test {
                NodeTest::Name { prefix, local, .. } => match prefix {
                    Some(p) => write!(f, "{p}:{local}")?,
                    None => f.write_str(local)?,
                },
                NodeTest::NamespaceWildcard { prefix, .. } => write!(f, "{prefix}:*")?,
                NodeTest::Wildcard => f.write_str("*")?,
                NodeTest::Text => f.write_str("text()")?,
                NodeTest::Comment => f.write_str("comment()")?,
                NodeTest::Node => f.write_str("node()")?,
                NodeTest::ProcessingInstruction => f.write_str("processing-instruction()")?,
            }
            step.predicates.iter().try_for_each(|p| write!(f, "[{p}]"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_parse_number_is_strict() {
        assert_eq!(parse_number(" 42 "), 42.0);
        assert_eq!(parse_number("-1.5"), -1.5);
        assert_eq!(parse_number(".5"), 0.5);
        assert!(parse_number("1e3").is_nan());
        assert!(parse_number("+1").is_nan());
        assert!(parse_number("").is_nan());
        assert!(parse_number("abc").is_nan());
    }

    #[test]
    fn test_boolean_conversion() {
        assert!(!Value::Number(f64::NAN).to_boolean());
        assert!(!Value::String(String::new()).to_boolean());
        assert!(Value::String("false".into()).to_boolean());
        assert!(!Value::Nodes(Vec::new()).to_boolean());
    }

    #[test]
    fn test_document_order_sorting() {
        let doc = XmlDocument::parse(r#"<a x="1"><b/><c><d/></c></a>"#).expect("should parse");
        let a = doc.document_element().expect("root");
        let b = doc.children(a)[0];
        let c = doc.children(a)[1];
        let d = doc.children(c)[0];
        let mut nodes = vec![
            NodeRef::Node(d),
            NodeRef::Attribute(a, 0),
            NodeRef::Node(b),
            NodeRef::Node(a),
            NodeRef::Node(d),
        ];
        sort_document_order(&doc, &mut nodes);
        assert_eq!(
            nodes,
            vec![
                NodeRef::Node(a),
                NodeRef::Attribute(a, 0),
                NodeRef::Node(b),
                NodeRef::Node(d),
            ]
        );
    }

    #[test]
    fn test_unresolved_prefix_is_rejected() {
        let err = XPath::parse_with_namespaces("atom:entry", &|_| None).unwrap_err();
        assert!(matches!(err, XsltError::XPathSyntax { message, .. } if message.contains("atom")));
    }
}
