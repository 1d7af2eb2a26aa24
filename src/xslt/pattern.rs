//! Template match patterns.
//!
//! A pattern is a restricted location path (child and attribute steps joined
//! by `/` or `//`, optionally rooted) or a union of them. A node matches when
//! evaluating the path from some ancestor would select it, which is checked
//! right to left without evaluating the path forwards.

use crate::error_handling::XsltError;
use crate::xml::XmlDocument;

use super::xpath::{
    self, Axis, EvalContext, Expr, NodeRef, NodeTest, PathExpr, PathStart, Step, Value,
};

/// One alternative of a match pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    path: PathExpr,
}

impl Pattern {
    /// Parses `source` into its union alternatives, resolving prefixes with
    /// `resolve`.
    pub fn parse_union(
        source: &str,
        resolve: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Vec<Pattern>, XsltError> {
        let parsed = xpath::XPath::parse_with_namespaces(source, resolve)?;
        let mut alternatives = Vec::new();
        collect_alternatives(parsed.expr(), source, &mut alternatives)?;
        Ok(alternatives)
    }

    /// The XSLT default priority of this alternative.
    pub fn default_priority(&self) -> f64 {
        match self.path.steps.as_slice() {
            [step] if self.path.start == PathStart::Context && step.predicates.is_empty() => {
                match &step.test {
                    NodeTest::Name { .. } => 0.0,
                    NodeTest::NamespaceWildcard { .. } => -0.25,
                    _ => -0.5,
                }
            }
            _ => 0.5,
        }
    }

    /// Whether `node` matches. Predicates see `locals` and `globals`.
    pub fn matches(
        &self,
        doc: &XmlDocument,
        node: NodeRef,
        locals: &[(String, Value)],
        globals: &[(String, Value)],
    ) -> Result<bool, XsltError> {
        let ctx = EvalContext::new(doc, node).with_variables(locals, globals);
        match_steps(&self.path.start, &self.path.steps, node, &ctx)
    }
}

fn collect_alternatives(
    expr: &Expr,
    source: &str,
    out: &mut Vec<Pattern>,
) -> Result<(), XsltError> {
    match expr {
        Expr::Binary(left, xpath::BinaryOp::Union, right) => {
            collect_alternatives(left, source, out)?;
            collect_alternatives(right, source, out)
        }
        Expr::Path(path) if is_pattern_path(path) => {
            out.push(Pattern { path: path.clone() });
            Ok(())
        }
        _ => Err(XsltError::XPathSyntax {
            expr: source.to_string(),
            position: 0,
            message: "not a valid match pattern".to_string(),
        }),
    }
}

fn is_pattern_path(path: &PathExpr) -> bool {
    if matches!(path.start, PathStart::Filter(_)) {
        return false;
    }
    path.steps.iter().enumerate().all(|(i, step)| {
        matches!(step.axis, Axis::Child | Axis::Attribute)
            // `//` between steps, or a leading `//`
            || (step.is_descendant_or_self() && i + 1 < path.steps.len())
    })
}

fn match_steps(
    start: &PathStart,
    steps: &[Step],
    node: NodeRef,
    ctx: &EvalContext<'_>,
) -> Result<bool, XsltError> {
    let doc = ctx.doc;
    let Some((last, rest)) = steps.split_last() else {
        return Ok(match start {
            PathStart::Root => node == NodeRef::Node(doc.root()),
            _ => true,
        });
    };

    if last.is_descendant_or_self() {
        // `node` must be reachable at any depth below what `rest` matches
        let mut current = Some(node);
        while let Some(candidate) = current {
            if match_steps(start, rest, candidate, ctx)? {
                return Ok(true);
            }
            current = candidate.parent(doc).map(NodeRef::Node);
        }
        return Ok(false);
    }

    if !step_selects(last, node, ctx)? {
        return Ok(false);
    }
    match node.parent(doc) {
        Some(parent) => match_steps(start, rest, NodeRef::Node(parent), ctx),
        None => Ok(false),
    }
}

/// Whether `step`, applied to the parent of `node`, would select `node`.
fn step_selects(step: &Step, node: NodeRef, ctx: &EvalContext<'_>) -> Result<bool, XsltError> {
    let doc = ctx.doc;
    let on_axis = match step.axis {
        Axis::Attribute => node.is_attribute(),
        _ => match node {
            NodeRef::Node(id) => doc.parent(id).is_some(),
            NodeRef::Attribute(..) => false,
        },
    };
    if !on_axis || !step.test.matches(doc, node, step.axis) {
        return Ok(false);
    }
    if step.predicates.is_empty() {
        return Ok(true);
    }

    let Some(parent) = node.parent(doc) else {
        return Ok(false);
    };
    let mut candidates: Vec<NodeRef> = xpath::axis_nodes(doc, NodeRef::Node(parent), step.axis)
        .into_iter()
        .filter(|&n| step.test.matches(doc, n, step.axis))
        .collect();
    for predicate in &step.predicates {
        candidates = xpath::apply_predicate(predicate, candidates, ctx)?;
        if !candidates.contains(&node) {
            return Ok(false);
        }
    }
    Ok(true)
}
