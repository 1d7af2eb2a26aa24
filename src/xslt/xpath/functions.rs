//! Core function library.

use super::eval::{evaluate, node_set, EvalContext};
use super::{parse_number, Expr, NodeRef, Value};
use crate::error_handling::XsltError;

fn arity(
    name: &str,
    args: &[Expr],
    min: usize,
    max: usize,
    expected: &'static str,
) -> Result<(), XsltError> {
    if args.len() < min || args.len() > max {
        return Err(XsltError::ArgumentCount {
            function: name.to_string(),
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

fn string_arg(args: &[Expr], i: usize, ctx: &EvalContext<'_>) -> Result<String, XsltError> {
    Ok(evaluate(&args[i], ctx)?.to_string_value(ctx.doc))
}

fn number_arg(args: &[Expr], i: usize, ctx: &EvalContext<'_>) -> Result<f64, XsltError> {
    Ok(evaluate(&args[i], ctx)?.to_number(ctx.doc))
}

/// String argument `i`, or the context node's string-value when omitted.
fn string_or_context(args: &[Expr], i: usize, ctx: &EvalContext<'_>) -> Result<String, XsltError> {
    if args.len() > i {
        string_arg(args, i, ctx)
    } else {
        Ok(ctx.node.string_value(ctx.doc))
    }
}

/// First node of the optional node-set argument, or the context node.
fn node_or_context(args: &[Expr], ctx: &EvalContext<'_>) -> Result<Option<NodeRef>, XsltError> {
    match args.first() {
        Some(arg) => Ok(node_set(arg, ctx)?.first().copied()),
        None => Ok(Some(ctx.node)),
    }
}

pub(super) fn call(name: &str, args: &[Expr], ctx: &EvalContext<'_>) -> Result<Value, XsltError> {
    let doc = ctx.doc;
    let value = match name {
        "last" => {
            arity(name, args, 0, 0, "0")?;
            Value::Number(ctx.size as f64)
        }
        "position" => {
            arity(name, args, 0, 0, "0")?;
            Value::Number(ctx.position as f64)
        }
        "current" => {
            arity(name, args, 0, 0, "0")?;
            Value::Nodes(vec![ctx.current])
        }
        "count" => {
            arity(name, args, 1, 1, "1")?;
            Value::Number(node_set(&args[0], ctx)?.len() as f64)
        }
        "id" => {
            arity(name, args, 1, 1, "1")?;
            let ids = match evaluate(&args[0], ctx)? {
                Value::Nodes(nodes) => nodes
                    .iter()
                    .map(|n| n.string_value(doc))
                    .collect::<Vec<_>>()
                    .join(" "),
                other => other.to_string_value(doc),
            };
            let mut nodes: Vec<NodeRef> = ids
                .split_whitespace()
                .filter_map(|id| doc.get_element_by_id(id))
                .map(NodeRef::Node)
                .collect();
            super::sort_document_order(doc, &mut nodes);
            Value::Nodes(nodes)
        }
        "name" | "local-name" | "namespace-uri" => {
            arity(name, args, 0, 1, "0 or 1")?;
            let node = node_or_context(args, ctx)?;
            Value::String(node.map_or_else(String::new, |n| match name {
                "name" => n.name(doc),
                "local-name" => n.local_name(doc),
                _ => n.namespace_uri(doc),
            }))
        }
        "generate-id" => {
            arity(name, args, 0, 1, "0 or 1")?;
            let node = node_or_context(args, ctx)?;
            Value::String(node.map_or_else(String::new, |n| match n {
                NodeRef::Node(id) => format!("n{}", id.index()),
                NodeRef::Attribute(el, i) => format!("n{}a{}", el.index(), i),
            }))
        }
        "string" => {
            arity(name, args, 0, 1, "0 or 1")?;
            Value::String(string_or_context(args, 0, ctx)?)
        }
        "concat" => {
            if args.len() < 2 {
                return Err(XsltError::ArgumentCount {
                    function: name.to_string(),
                    expected: "2 or more",
                    got: args.len(),
                });
            }
            let mut out = String::new();
            for i in 0..args.len() {
                out.push_str(&string_arg(args, i, ctx)?);
            }
            Value::String(out)
        }
        "starts-with" | "contains" | "substring-before" | "substring-after" => {
            arity(name, args, 2, 2, "2")?;
            let haystack = string_arg(args, 0, ctx)?;
            let needle = string_arg(args, 1, ctx)?;
            match name {
                "starts-with" => Value::Boolean(haystack.starts_with(&needle)),
                "contains" => Value::Boolean(haystack.contains(&needle)),
                "substring-before" => Value::String(
                    haystack
                        .split_once(&needle)
                        .map(|(before, _)| before.to_string())
                        .unwrap_or_default(),
                ),
                _ => Value::String(
                    haystack
                        .split_once(&needle)
                        .map(|(_, after)| after.to_string())
                        .unwrap_or_default(),
                ),
            }
        }
        "substring" => {
            arity(name, args, 2, 3, "2 or 3")?;
            let s = string_arg(args, 0, ctx)?;
            let start = round(number_arg(args, 1, ctx)?);
            let end = if args.len() == 3 {
                start + round(number_arg(args, 2, ctx)?)
            } else {
                f64::INFINITY
            };
            // Characters at 1-based positions p with start <= p < end
            Value::String(
                s.chars()
                    .enumerate()
                    .filter(|&(i, _)| {
                        let p = (i + 1) as f64;
                        p >= start && p < end
                    })
                    .map(|(_, c)| c)
                    .collect(),
            )
        }
        "string-length" => {
            arity(name, args, 0, 1, "0 or 1")?;
            Value::Number(string_or_context(args, 0, ctx)?.chars().count() as f64)
        }
        "normalize-space" => {
            arity(name, args, 0, 1, "0 or 1")?;
            let s = string_or_context(args, 0, ctx)?;
            Value::String(s.split_whitespace().collect::<Vec<_>>().join(" "))
        }
        "translate" => {
            arity(name, args, 3, 3, "3")?;
            let s = string_arg(args, 0, ctx)?;
            let from: Vec<char> = string_arg(args, 1, ctx)?.chars().collect();
            let to: Vec<char> = string_arg(args, 2, ctx)?.chars().collect();
            Value::String(
                s.chars()
                    .filter_map(|c| match from.iter().position(|&f| f == c) {
                        Some(i) => to.get(i).copied(),
                        None => Some(c),
                    })
                    .collect(),
            )
        }
        "boolean" => {
            arity(name, args, 1, 1, "1")?;
            Value::Boolean(evaluate(&args[0], ctx)?.to_boolean())
        }
        "not" => {
            arity(name, args, 1, 1, "1")?;
            Value::Boolean(!evaluate(&args[0], ctx)?.to_boolean())
        }
        "true" | "false" => {
            arity(name, args, 0, 0, "0")?;
            Value::Boolean(name == "true")
        }
        "number" => {
            arity(name, args, 0, 1, "0 or 1")?;
            match args.first() {
                Some(arg) => Value::Number(evaluate(arg, ctx)?.to_number(doc)),
                None => Value::Number(parse_number(&ctx.node.string_value(doc))),
            }
        }
        "sum" => {
            arity(name, args, 1, 1, "1")?;
            Value::Number(
                node_set(&args[0], ctx)?
                    .iter()
                    .map(|n| parse_number(&n.string_value(doc)))
                    .sum(),
            )
        }
        "floor" | "ceiling" | "round" => {
            arity(name, args, 1, 1, "1")?;
            let n = number_arg(args, 0, ctx)?;
            Value::Number(match name {
                "floor" => n.floor(),
                "ceiling" => n.ceil(),
                _ => round(n),
            })
        }
        _ => return Err(XsltError::UnknownFunction(name.to_string())),
    };
    Ok(value)
}

/// XPath `round()`: halves round towards positive infinity.
fn round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() {
        n
    } else {
        (n + 0.5).floor()
    }
}
