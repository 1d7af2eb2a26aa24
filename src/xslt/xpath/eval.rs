//! Expression evaluation.

use super::functions;
use super::{sort_document_order, Axis, BinaryOp, Expr, NodeRef, PathExpr, PathStart, Step, Value};
use crate::error_handling::XsltError;
use crate::xml::XmlDocument;

/// Evaluation context: the focus (node, position, size) plus variable bindings.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    pub doc: &'a XmlDocument,
    pub node: NodeRef,
    /// 1-based
    pub position: usize,
    pub size: usize,
    /// What `current()` returns; unlike `node` it does not change inside predicates.
    pub current: NodeRef,
    /// Innermost bindings last
    pub locals: &'a [(String, Value)],
    pub globals: &'a [(String, Value)],
}

impl<'a> EvalContext<'a> {
    /// A context focused on `node`, with no variables in scope.
    pub fn new(doc: &'a XmlDocument, node: NodeRef) -> Self {
        Self {
            doc,
            node,
            position: 1,
            size: 1,
            current: node,
            locals: &[],
            globals: &[],
        }
    }

    pub fn with_variables(
        self,
        locals: &'a [(String, Value)],
        globals: &'a [(String, Value)],
    ) -> Self {
        Self {
            locals,
            globals,
            ..self
        }
    }

    /// Moves the focus without changing `current()`.
    pub fn at(self, node: NodeRef, position: usize, size: usize) -> Self {
        Self {
            node,
            position,
            size,
            ..self
        }
    }

    pub fn variable(&self, name: &str) -> Option<&'a Value> {
        self.locals
            .iter()
            .rev()
            .chain(self.globals.iter().rev())
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

pub(super) fn evaluate(expr: &Expr, ctx: &EvalContext<'_>) -> Result<Value, XsltError> {
    match expr {
        Expr::Literal(s) => Ok(Value::String(s.clone())),
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Variable(name) => ctx
            .variable(name)
            .cloned()
            .ok_or_else(|| XsltError::UnknownVariable(name.clone())),
        Expr::Negate(inner) => Ok(Value::Number(-evaluate(inner, ctx)?.to_number(ctx.doc))),
        Expr::Function(name, args) => functions::call(name, args, ctx),
        Expr::Path(path) => Ok(Value::Nodes(eval_path(path, ctx)?)),
        Expr::Filter(primary, predicates) => {
            let mut nodes = node_set(primary, ctx)?;
            for predicate in predicates {
                nodes = apply_predicate(predicate, nodes, ctx)?;
            }
            Ok(Value::Nodes(nodes))
        }
        Expr::Binary(left, op, right) => eval_binary(left, *op, right, ctx),
    }
}

fn eval_binary(
    left: &Expr,
    op: BinaryOp,
    right: &Expr,
    ctx: &EvalContext<'_>,
) -> Result<Value, XsltError> {
    let doc = ctx.doc;
    match op {
        BinaryOp::Or => Ok(Value::Boolean(
            evaluate(left, ctx)?.to_boolean() || evaluate(right, ctx)?.to_boolean(),
        )),
        BinaryOp::And => Ok(Value::Boolean(
            evaluate(left, ctx)?.to_boolean() && evaluate(right, ctx)?.to_boolean(),
        )),
        BinaryOp::Union => {
            let mut nodes = node_set(left, ctx)?;
            nodes.extend(node_set(right, ctx)?);
            sort_document_order(doc, &mut nodes);
            Ok(Value::Nodes(nodes))
        }
        BinaryOp::Equal
        | BinaryOp::NotEqual
        | BinaryOp::Less
        | BinaryOp::LessEqual
        | BinaryOp::Greater
        | BinaryOp::GreaterEqual => {
            let l = evaluate(left, ctx)?;
            let r = evaluate(right, ctx)?;
            Ok(Value::Boolean(compare(doc, op, &l, &r)))
        }
        BinaryOp::Add
        | BinaryOp::Subtract
        | BinaryOp::Multiply
        | BinaryOp::Divide
        | BinaryOp::Modulo => {
            let l = evaluate(left, ctx)?.to_number(doc);
            let r = evaluate(right, ctx)?.to_number(doc);
            Ok(Value::Number(match op {
                BinaryOp::Add => l + r,
                BinaryOp::Subtract => l - r,
                BinaryOp::Multiply => l * r,
                BinaryOp::Divide => l / r,
                _ => l % r,
            }))
        }
    }
}

/// Evaluates `expr` and requires a node-set.
pub(super) fn node_set(expr: &Expr, ctx: &EvalContext<'_>) -> Result<Vec<NodeRef>, XsltError> {
    match evaluate(expr, ctx)? {
        Value::Nodes(nodes) => Ok(nodes),
        _ => Err(XsltError::NotANodeSet(expr.to_string())),
    }
}

/// XPath 1.0 comparison, including the existential node-set rules.
fn compare(doc: &XmlDocument, op: BinaryOp, left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Nodes(a), Value::Nodes(b)) => {
            let right_strings: Vec<Value> =
                b.iter().map(|n| Value::String(n.string_value(doc))).collect();
            a.iter().any(|n| {
                let l = Value::String(n.string_value(doc));
                right_strings.iter().any(|r| compare_scalars(doc, op, &l, r))
            })
        }
        (Value::Nodes(a), Value::Boolean(_)) => {
            compare_scalars(doc, op, &Value::Boolean(!a.is_empty()), right)
        }
        (Value::Boolean(_), Value::Nodes(b)) => {
            compare_scalars(doc, op, left, &Value::Boolean(!b.is_empty()))
        }
        (Value::Nodes(a), scalar) => a
            .iter()
            .any(|n| compare_scalars(doc, op, &Value::String(n.string_value(doc)), scalar)),
        (scalar, Value::Nodes(b)) => b
            .iter()
            .any(|n| compare_scalars(doc, op, scalar, &Value::String(n.string_value(doc)))),
        _ => compare_scalars(doc, op, left, right),
    }
}

fn compare_scalars(doc: &XmlDocument, op: BinaryOp, left: &Value, right: &Value) -> bool {
    match op {
        BinaryOp::Equal | BinaryOp::NotEqual => {
            let equal = if matches!(left, Value::Boolean(_)) || matches!(right, Value::Boolean(_)) {
                left.to_boolean() == right.to_boolean()
            } else if matches!(left, Value::Number(_)) || matches!(right, Value::Number(_)) {
                left.to_number(doc) == right.to_number(doc)
            } else {
                left.to_string_value(doc) == right.to_string_value(doc)
            };
            // NaN compares unequal to everything, so `NaN != NaN` holds
            if op == BinaryOp::Equal {
                equal
            } else {
                !equal
            }
        }
        _ => {
            let l = left.to_number(doc);
            let r = right.to_number(doc);
            match op {
                BinaryOp::Less => l < r,
                BinaryOp::LessEqual => l <= r,
                BinaryOp::Greater => l > r,
                _ => l >= r,
            }
        }
    }
}

fn eval_path(path: &PathExpr, ctx: &EvalContext<'_>) -> Result<Vec<NodeRef>, XsltError> {
    let mut nodes = match &path.start {
        PathStart::Root => vec![NodeRef::Node(root_of(ctx.doc, ctx.node))],
        PathStart::Context => vec![ctx.node],
        PathStart::Filter(primary) => node_set(primary, ctx)?,
    };
    for step in &path.steps {
        nodes = eval_step(step, &nodes, ctx)?;
    }
    Ok(nodes)
}

fn root_of(doc: &XmlDocument, node: NodeRef) -> crate::xml::NodeId {
    let mut current = match node {
        NodeRef::Node(id) => id,
        NodeRef::Attribute(el, _) => el,
    };
    while let Some(parent) = doc.parent(current) {
        current = parent;
    }
    current
}

fn eval_step(
    step: &Step,
    input: &[NodeRef],
    ctx: &EvalContext<'_>,
) -> Result<Vec<NodeRef>, XsltError> {
    let doc = ctx.doc;
    let mut out = Vec::new();
    for &node in input {
        let mut candidates: Vec<NodeRef> = axis_nodes(doc, node, step.axis)
            .into_iter()
            .filter(|&n| step.test.matches(doc, n, step.axis))
            .collect();
        for predicate in &step.predicates {
            candidates = apply_predicate(predicate, candidates, ctx)?;
        }
        out.extend(candidates);
    }
    // A single forward step from one node already yields document order
    if input.len() > 1 || step.axis.is_reverse() || step.axis == Axis::Following {
        sort_document_order(doc, &mut out);
    }
    Ok(out)
}

/// Keeps the nodes for which `predicate` holds. A numeric result is compared
/// with the node's position.
pub(crate) fn apply_predicate(
    predicate: &Expr,
    nodes: Vec<NodeRef>,
    ctx: &EvalContext<'_>,
) -> Result<Vec<NodeRef>, XsltError> {
    let size = nodes.len();
    let mut kept = Vec::with_capacity(size);
    for (i, node) in nodes.into_iter().enumerate() {
        let inner = ctx.at(node, i + 1, size);
        let keep = match evaluate(predicate, &inner)? {
            Value::Number(n) => n == (i + 1) as f64,
            other => other.to_boolean(),
        };
        if keep {
            kept.push(node);
        }
    }
    Ok(kept)
}

/// Nodes on `axis` from `node`, in proximity order (reverse axes nearest first).
pub(crate) fn axis_nodes(doc: &XmlDocument, node: NodeRef, axis: Axis) -> Vec<NodeRef> {
    match (axis, node) {
        (Axis::Self_, _) => vec![node],
        (Axis::Child, NodeRef::Node(id)) => {
            doc.children(id).iter().map(|&c| NodeRef::Node(c)).collect()
        }
        (Axis::Descendant, NodeRef::Node(id)) => doc.descendants(id).map(NodeRef::Node).collect(),
        (Axis::DescendantOrSelf, NodeRef::Node(id)) => {
            let mut nodes = vec![node];
            nodes.extend(doc.descendants(id).map(NodeRef::Node));
            nodes
        }
        (Axis::DescendantOrSelf, NodeRef::Attribute(..)) => vec![node],
        (Axis::Parent, _) => node.parent(doc).map(NodeRef::Node).into_iter().collect(),
        (Axis::Ancestor | Axis::AncestorOrSelf, _) => {
            let mut nodes = Vec::new();
            if axis == Axis::AncestorOrSelf {
                nodes.push(node);
            }
            let mut current = node.parent(doc);
            while let Some(id) = current {
                nodes.push(NodeRef::Node(id));
                current = doc.parent(id);
            }
            nodes
        }
        (Axis::Attribute, NodeRef::Node(id)) => doc
            .attributes(id)
            .iter()
            .enumerate()
            .filter(|(_, a)| a.name != "xmlns" && !a.name.starts_with("xmlns:"))
            .map(|(i, _)| NodeRef::Attribute(id, i))
            .collect(),
        (Axis::FollowingSibling, NodeRef::Node(id)) => siblings(doc, id, true),
        (Axis::PrecedingSibling, NodeRef::Node(id)) => siblings(doc, id, false),
        (Axis::Following, _) => {
            let mut nodes = Vec::new();
            let mut current = match node {
                NodeRef::Node(id) => Some(id),
                NodeRef::Attribute(el, _) => {
                    nodes.extend(doc.descendants(el).map(NodeRef::Node));
                    Some(el)
                }
            };
            while let Some(id) = current {
                for sibling in siblings(doc, id, true) {
                    nodes.push(sibling);
                    if let NodeRef::Node(s) = sibling {
                        nodes.extend(doc.descendants(s).map(NodeRef::Node));
                    }
                }
                current = doc.parent(id);
            }
            nodes
        }
        (Axis::Preceding, _) => {
            let mut nodes = Vec::new();
            let mut current = match node {
                NodeRef::Node(id) => Some(id),
                NodeRef::Attribute(el, _) => Some(el),
            };
            while let Some(id) = current {
                for sibling in siblings(doc, id, false) {
                    if let NodeRef::Node(s) = sibling {
                        let mut subtree: Vec<NodeRef> =
                            doc.descendants(s).map(NodeRef::Node).collect();
                        subtree.reverse();
                        nodes.extend(subtree);
                    }
                    nodes.push(sibling);
                }
                current = doc.parent(id);
            }
            nodes
        }
        // Attributes have no children or siblings
        (_, NodeRef::Attribute(..)) => Vec::new(),
    }
}

fn siblings(doc: &XmlDocument, id: crate::xml::NodeId, following: bool) -> Vec<NodeRef> {
    let Some(parent) = doc.parent(id) else {
        return Vec::new();
    };
    let children = doc.children(parent);
    let Some(index) = children.iter().position(|&c| c == id) else {
        return Vec::new();
    };
    if following {
        children[index + 1..].iter().map(|&c| NodeRef::Node(c)).collect()
    } else {
        children[..index].iter().rev().map(|&c| NodeRef::Node(c)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::XPath;
    use super::*;

    const CATALOG: &str = r#"<catalog>
        <book id="b1" year="2001"><title>Alpha</title><price>10</price></book>
        <book id="b2" year="1999"><title>Beta</title><price>25.5</price></book>
        <book id="b3" year="2010"><title>Gamma</title><price>7</price></book>
    </catalog>"#;

    fn eval(doc: &XmlDocument, expr: &str) -> Value {
        let ctx = EvalContext::new(doc, NodeRef::Node(doc.root()));
        XPath::parse(expr)
            .expect("should parse")
            .evaluate(&ctx)
            .expect("should evaluate")
    }

    fn strings(doc: &XmlDocument, value: Value) -> Vec<String> {
        match value {
            Value::Nodes(nodes) => nodes.iter().map(|n| n.string_value(doc)).collect(),
            other => panic!("expected nodes, got {other:?}"),
        }
    }

    #[test]
    fn test_child_and_descendant_paths() {
        let doc = XmlDocument::parse(CATALOG).expect("should parse");
        assert_eq!(
            strings(&doc, eval(&doc, "/catalog/book/title")),
            vec!["Alpha", "Beta", "Gamma"]
        );
        assert_eq!(strings(&doc, eval(&doc, "//title[. = 'Beta']")), vec!["Beta"]);
        assert_eq!(strings(&doc, eval(&doc, "//book/@id")), vec!["b1", "b2", "b3"]);
    }

    #[test]
    fn test_positional_predicates() {
        let doc = XmlDocument::parse(CATALOG).expect("should parse");
        assert_eq!(strings(&doc, eval(&doc, "//book[2]/title")), vec!["Beta"]);
        assert_eq!(
            strings(&doc, eval(&doc, "//book[last()]/title")),
            vec!["Gamma"]
        );
        assert_eq!(
            strings(&doc, eval(&doc, "//book[position() > 1][1]/title")),
            vec!["Beta"]
        );
    }

    #[test]
    fn test_reverse_axis_positions_count_from_context() {
        let doc = XmlDocument::parse(CATALOG).expect("should parse");
        assert_eq!(
            strings(&doc, eval(&doc, "//book[3]/preceding-sibling::book[1]/title")),
            vec!["Beta"]
        );
        assert_eq!(
            strings(&doc, eval(&doc, "//title[. = 'Gamma']/ancestor::*[1]/@id")),
            vec!["b3"]
        );
    }

    #[test]
    fn test_node_set_comparisons_are_existential() {
        let doc = XmlDocument::parse(CATALOG).expect("should parse");
        assert_eq!(eval(&doc, "//price > 20"), Value::Boolean(true));
        assert_eq!(eval(&doc, "//price > 30"), Value::Boolean(false));
        assert_eq!(eval(&doc, "//title = 'Gamma'"), Value::Boolean(true));
        assert_eq!(eval(&doc, "//title != 'Gamma'"), Value::Boolean(true));
        assert_eq!(eval(&doc, "//missing = ''"), Value::Boolean(false));
        assert_eq!(eval(&doc, "//missing = false()"), Value::Boolean(true));
    }

    #[test]
    fn test_arithmetic_and_number_conversion() {
        let doc = XmlDocument::parse(CATALOG).expect("should parse");
        assert_eq!(eval(&doc, "7 mod 3"), Value::Number(1.0));
        assert_eq!(eval(&doc, "-7 mod 3"), Value::Number(-1.0));
        assert_eq!(eval(&doc, "1 div 4"), Value::Number(0.25));
        assert_eq!(eval(&doc, "//book[1]/price * 2"), Value::Number(20.0));
        match eval(&doc, "'abc' + 1") {
            Value::Number(n) => assert!(n.is_nan()),
            other => panic!("expected number, got {other:?}"),
        }
    }

    #[test]
    fn test_union_is_sorted_and_deduplicated() {
        let doc = XmlDocument::parse(CATALOG).expect("should parse");
        assert_eq!(
            strings(&doc, eval(&doc, "//book[3]/title | //book[1]/title | //title[1]")),
            vec!["Alpha", "Beta", "Gamma"]
        );
    }

    #[test]
    fn test_variables_and_unknown_variable() {
        let doc = XmlDocument::parse(CATALOG).expect("should parse");
        let locals = vec![("min".to_string(), Value::Number(9.0))];
        let ctx = EvalContext::new(&doc, NodeRef::Node(doc.root())).with_variables(&locals, &[]);
        let expr = XPath::parse("count(//book[price > $min])").expect("should parse");
        assert_eq!(expr.evaluate(&ctx).expect("evaluates"), Value::Number(2.0));

        let missing = XPath::parse("$nope").expect("should parse");
        assert_eq!(
            missing.evaluate(&ctx).unwrap_err(),
            XsltError::UnknownVariable("nope".into())
        );
    }

    #[test]
    fn test_path_from_scalar_is_not_a_node_set() {
        let doc = XmlDocument::parse(CATALOG).expect("should parse");
        let ctx = EvalContext::new(&doc, NodeRef::Node(doc.root()));
        let expr = XPath::parse("'x'/a").expect("should parse");
        assert!(matches!(expr.evaluate(&ctx), Err(XsltError::NotANodeSet(_))));
    }

    #[test]
    fn test_following_and_preceding_axes() {
        let doc = XmlDocument::parse("<r><a><b/></a><c/><d><e/></d></r>").expect("should parse");
        let names = |expr: &str| -> Vec<String> {
            match eval(&doc, expr) {
                Value::Nodes(nodes) => nodes.iter().map(|n| n.name(&doc)).collect(),
                other => panic!("expected nodes, got {other:?}"),
            }
        };
        assert_eq!(names("//b/following::*"), vec!["c", "d", "e"]);
        assert_eq!(names("//e/preceding::*"), vec!["a", "b", "c"]);
    }
}
