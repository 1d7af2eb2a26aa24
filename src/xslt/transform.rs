//! Applies a compiled stylesheet to a source document.

use std::cmp::Ordering;

use crate::config::{MAX_TEMPLATE_DEPTH, MAX_XML_DEPTH};
use crate::error_handling::XsltError;
use crate::xml::{is_comment_text, is_qname, NodeData, NodeId, XmlDocument};

use super::stylesheet::{Avt, AvtPart, Binding, BindingValue, Instruction, SortKey, Stylesheet};
use super::xpath::{EvalContext, NodeRef, Value, XPath};

type Bindings = Vec<(String, Value)>;

/// The node being processed, with its position in the current node list.
#[derive(Clone, Copy)]
struct Focus {
    node: NodeRef,
    position: usize,
    size: usize,
}

enum SortValue {
    Text(String),
    Number(f64),
}

pub(crate) struct Transformer<'s, 'd> {
    stylesheet: &'s Stylesheet,
    source: &'d XmlDocument,
    output: XmlDocument,
    globals: Bindings,
    depth: usize,
    /// Elements entered through the built-in rule
    walk_depth: usize,
}

impl<'s, 'd> Transformer<'s, 'd> {
    /// Runs `stylesheet` over `source`, returning the result tree as a fragment.
    pub(crate) fn run(
        stylesheet: &'s Stylesheet,
        source: &'d XmlDocument,
        parameters: &[(String, String)],
    ) -> Result<XmlDocument, XsltError> {
        let mut transformer = Self {
            stylesheet,
            source,
            output: XmlDocument::new(),
            globals: Vec::new(),
            depth: 0,
            walk_depth: 0,
        };
        let root = Focus {
            node: NodeRef::Node(source.root()),
            position: 1,
            size: 1,
        };

        for global in &stylesheet.globals {
            let name = &global.binding.name;
            let overridden = parameters
                .iter()
                .find(|(n, _)| global.is_param && n == name)
                .map(|(_, v)| Value::String(v.clone()));
            let value = match overridden {
                Some(value) => value,
                None => transformer.binding_value(&global.binding, root, &mut Vec::new())?,
            };
            transformer.globals.push((name.clone(), value));
        }

        let out = transformer.output.root();
        transformer.apply_templates(vec![root.node], None, &[], out)?;
        Ok(transformer.output)
    }

    fn context<'a>(&'a self, focus: Focus, locals: &'a [(String, Value)]) -> EvalContext<'a> {
        EvalContext::new(self.source, focus.node)
            .at(focus.node, focus.position, focus.size)
            .with_variables(locals, &self.globals)
    }

    fn eval(
        &self,
        xpath: &XPath,
        focus: Focus,
        locals: &[(String, Value)],
    ) -> Result<Value, XsltError> {
        xpath.evaluate(&self.context(focus, locals))
    }

    fn string(
        &self,
        xpath: &XPath,
        focus: Focus,
        locals: &[(String, Value)],
    ) -> Result<String, XsltError> {
        xpath.evaluate_string(&self.context(focus, locals))
    }

    fn avt(
        &self,
        avt: &Avt,
        focus: Focus,
        locals: &[(String, Value)],
    ) -> Result<String, XsltError> {
        let mut out = String::new();
        for part in &avt.parts {
            match part {
                AvtPart::Literal(s) => out.push_str(s),
                AvtPart::Expr(xpath) => out.push_str(&self.string(xpath, focus, locals)?),
            }
        }
        Ok(out)
    }

    /// Best matching template for `node` in `mode`: highest priority, then
    /// last in the stylesheet.
    fn find_rule(&self, node: NodeRef, mode: Option<&str>) -> Result<Option<usize>, XsltError> {
        let mut best: Option<(f64, usize)> = None;
        for rule in &self.stylesheet.rules {
            if rule.mode.as_deref() != mode {
                continue;
            }
            if best.is_some_and(|(priority, _)| rule.priority < priority) {
                continue;
            }
            if rule.pattern.matches(self.source, node, &[], &self.globals)? {
                best = Some((rule.priority, rule.template));
            }
        }
        Ok(best.map(|(_, template)| template))
    }

    fn apply_templates(
        &mut self,
        nodes: Vec<NodeRef>,
        mode: Option<&str>,
        params: &[(String, Value)],
        out: NodeId,
    ) -> Result<(), XsltError> {
        let size = nodes.len();
        for (i, node) in nodes.into_iter().enumerate() {
            let focus = Focus {
                node,
                position: i + 1,
                size,
            };
            match self.find_rule(node, mode)? {
                Some(template) => self.invoke(template, focus, params, out)?,
                None => self.builtin(focus, mode, out)?,
            }
        }
        Ok(())
    }

    /// Built-in rules: recurse into the root and elements, copy text and
    /// attribute values, drop comments.
    fn builtin(&mut self, focus: Focus, mode: Option<&str>, out: NodeId) -> Result<(), XsltError> {
        let source = self.source;
        match focus.node {
            NodeRef::Node(id) => match source.data(id) {
                NodeData::Document => {
                    let children = source.children(id).iter().map(|&c| NodeRef::Node(c)).collect();
                    self.apply_templates(children, mode, &[], out)
                }
                NodeData::Element(_) => {
                    if self.walk_depth >= MAX_XML_DEPTH {
                        return Err(XsltError::RecursionLimit(MAX_XML_DEPTH));
                    }
                    self.walk_depth += 1;
                    let children = source.children(id).iter().map(|&c| NodeRef::Node(c)).collect();
                    let result = self.apply_templates(children, mode, &[], out);
                    self.walk_depth -= 1;
                    result
                }
                NodeData::Text(text) => {
                    self.output.append_text(out, text);
                    Ok(())
                }
                NodeData::Comment(_) => Ok(()),
            },
            NodeRef::Attribute(..) => {
                let value = focus.node.string_value(source);
                self.output.append_text(out, &value);
                Ok(())
            }
        }
    }

    fn invoke(
        &mut self,
        template: usize,
        focus: Focus,
        params: &[(String, Value)],
        out: NodeId,
    ) -> Result<(), XsltError> {
        if self.depth >= MAX_TEMPLATE_DEPTH {
            return Err(XsltError::RecursionLimit(MAX_TEMPLATE_DEPTH));
        }
        self.depth += 1;
        let stylesheet = self.stylesheet;
        let template = &stylesheet.templates[template];

        let mut locals = Vec::new();
        let mut result = Ok(());
        for param in &template.params {
            let passed = params.iter().find(|(n, _)| *n == param.name).map(|(_, v)| v.clone());
            let value = match passed {
                Some(value) => value,
                None => match self.binding_value(param, focus, &mut locals) {
                    Ok(value) => value,
                    Err(e) => {
                        result = Err(e);
                        break;
                    }
                },
            };
            locals.push((param.name.clone(), value));
        }
        if result.is_ok() {
            result = self.execute(&template.body, focus, &mut locals, out);
        }
        self.depth -= 1;
        result
    }

    fn binding_value(
        &mut self,
        binding: &Binding,
        focus: Focus,
        locals: &mut Bindings,
    ) -> Result<Value, XsltError> {
        match &binding.value {
            BindingValue::Select(xpath) => self.eval(xpath, focus, locals),
            BindingValue::Content(body) => {
                Ok(Value::String(self.execute_to_string(body, focus, locals)?))
            }
            BindingValue::Empty => Ok(Value::String(String::new())),
        }
    }

    fn evaluate_params(
        &mut self,
        params: &[Binding],
        focus: Focus,
        locals: &mut Bindings,
    ) -> Result<Bindings, XsltError> {
        let mut values = Vec::with_capacity(params.len());
        for param in params {
            values.push((param.name.clone(), self.binding_value(param, focus, locals)?));
        }
        Ok(values)
    }

    /// Instantiates `body` into a detached scratch element and returns its text.
    fn execute_to_string(
        &mut self,
        body: &[Instruction],
        focus: Focus,
        locals: &mut Bindings,
    ) -> Result<String, XsltError> {
        let scratch = self.output.create_element("scratch");
        self.execute(body, focus, locals, scratch)?;
        Ok(self.output.text_content(scratch))
    }

    fn execute(
        &mut self,
        body: &[Instruction],
        focus: Focus,
        locals: &mut Bindings,
        out: NodeId,
    ) -> Result<(), XsltError> {
        let mark = locals.len();
        for instruction in body {
            self.instruction(instruction, focus, locals, out)?;
        }
        // Variables are visible to following siblings only
        locals.truncate(mark);
        Ok(())
    }

    fn instruction(
        &mut self,
        instruction: &Instruction,
        focus: Focus,
        locals: &mut Bindings,
        out: NodeId,
    ) -> Result<(), XsltError> {
        match instruction {
            Instruction::Text(text) => self.output.append_text(out, text),
            Instruction::ValueOf(xpath) => {
                let text = self.string(xpath, focus, locals)?;
                self.output.append_text(out, &text);
            }
            Instruction::LiteralElement { name, attributes, body } => {
                let element = self.output.create_element(name.clone());
                self.output.append_child(out, element);
                for (attr, avt) in attributes {
                    let value = self.avt(avt, focus, locals)?;
                    self.output.set_attribute(element, attr, value);
                }
                self.execute(body, focus, locals, element)?;
            }
            Instruction::Element { name, body } => {
                let name = checked_name(self.avt(name, focus, locals)?)?;
                let element = self.output.create_element(name);
                self.output.append_child(out, element);
                self.execute(body, focus, locals, element)?;
            }
            Instruction::Attribute { name, body } => {
                let name = checked_name(self.avt(name, focus, locals)?)?;
                let value = self.execute_to_string(body, focus, locals)?;
                self.output.set_attribute(out, &name, value);
            }
            Instruction::Comment(body) => {
                let text = self.execute_to_string(body, focus, locals)?;
                if !is_comment_text(&text) {
                    return Err(XsltError::InvalidComment(text));
                }
                let comment = self.output.create_comment(text);
                self.output.append_child(out, comment);
            }
            Instruction::Copy(body) => self.copy(focus, body, locals, out)?,
            Instruction::CopyOf(xpath) => match self.eval(xpath, focus, locals)? {
                Value::Nodes(nodes) => {
                    for node in nodes {
                        self.copy_node(node, out);
                    }
                }
                other => {
                    let text = other.to_string_value(self.source);
                    self.output.append_text(out, &text);
                }
            },
            Instruction::If { test, body } => {
                if self.eval(test, focus, locals)?.to_boolean() {
                    self.execute(body, focus, locals, out)?;
                }
            }
            Instruction::Choose { whens, otherwise } => {
                let mut chosen = otherwise;
                for (test, body) in whens {
                    if self.eval(test, focus, locals)?.to_boolean() {
                        chosen = body;
                        break;
                    }
                }
                self.execute(chosen, focus, locals, out)?;
            }
            Instruction::ForEach { select, sorts, body } => {
                let nodes = self.select(select, focus, locals)?;
                let nodes = self.sort(nodes, sorts, locals)?;
                let size = nodes.len();
                for (i, node) in nodes.into_iter().enumerate() {
                    let inner = Focus {
                        node,
                        position: i + 1,
                        size,
                    };
                    self.execute(body, inner, locals, out)?;
                }
            }
            Instruction::ApplyTemplates { select, mode, sorts, params } => {
                let nodes = match select {
                    Some(xpath) => self.select(xpath, focus, locals)?,
                    None => match focus.node {
                        NodeRef::Node(id) => {
                            self.source.children(id).iter().map(|&c| NodeRef::Node(c)).collect()
                        }
                        NodeRef::Attribute(..) => Vec::new(),
                    },
                };
                let nodes = self.sort(nodes, sorts, locals)?;
                let params = self.evaluate_params(params, focus, locals)?;
                self.apply_templates(nodes, mode.as_deref(), &params, out)?;
            }
            Instruction::CallTemplate { name, params } => {
                let template = *self
                    .stylesheet
                    .named
                    .get(name)
                    .ok_or_else(|| XsltError::UnknownTemplate(name.clone()))?;
                let params = self.evaluate_params(params, focus, locals)?;
                self.invoke(template, focus, &params, out)?;
            }
            Instruction::Variable(binding) => {
                let value = self.binding_value(binding, focus, locals)?;
                locals.push((binding.name.clone(), value));
            }
        }
        Ok(())
    }

    fn select(
        &self,
        xpath: &XPath,
        focus: Focus,
        locals: &[(String, Value)],
    ) -> Result<Vec<NodeRef>, XsltError> {
        xpath.select(&self.context(focus, locals))
    }

    /// `xsl:copy`: a shallow copy of the current node, with `body` as content.
    fn copy(
        &mut self,
        focus: Focus,
        body: &[Instruction],
        locals: &mut Bindings,
        out: NodeId,
    ) -> Result<(), XsltError> {
        let source = self.source;
        match focus.node {
            NodeRef::Node(id) => match source.data(id) {
                NodeData::Document => self.execute(body, focus, locals, out)?,
                NodeData::Element(element) => {
                    let copy = self.output.create_element(element.name.clone());
                    self.output.append_child(out, copy);
                    self.execute(body, focus, locals, copy)?;
                }
                NodeData::Text(text) => self.output.append_text(out, text),
                NodeData::Comment(text) => {
                    let comment = self.output.create_comment(text.clone());
                    self.output.append_child(out, comment);
                }
            },
            NodeRef::Attribute(..) => self.copy_node(focus.node, out),
        }
        Ok(())
    }

    /// `xsl:copy-of` for one node: a deep copy.
    fn copy_node(&mut self, node: NodeRef, out: NodeId) {
        let source = self.source;
        match node {
            NodeRef::Node(id) => match source.data(id) {
                NodeData::Document => self.output.import_children(out, source, id),
                NodeData::Text(text) => self.output.append_text(out, text),
                _ => {
                    let copy = self.output.import_node(source, id);
                    self.output.append_child(out, copy);
                }
            },
            NodeRef::Attribute(..) => {
                let name = node.name(source);
                let value = node.string_value(source);
                self.output.set_attribute(out, &name, value);
            }
        }
    }

    /// Orders `nodes` by `sorts`. Each key is evaluated with the node as
    /// focus, within the unsorted list.
    fn sort(
        &self,
        nodes: Vec<NodeRef>,
        sorts: &[SortKey],
        locals: &[(String, Value)],
    ) -> Result<Vec<NodeRef>, XsltError> {
        if sorts.is_empty() {
            return Ok(nodes);
        }
        let size = nodes.len();
        let mut keyed = Vec::with_capacity(size);
        for (i, node) in nodes.into_iter().enumerate() {
            let focus = Focus {
                node,
                position: i + 1,
                size,
            };
            let mut keys = Vec::with_capacity(sorts.len());
            for sort in sorts {
                let value = self.eval(&sort.select, focus, locals)?;
                keys.push(if sort.numeric {
                    SortValue::Number(value.to_number(self.source))
                } else {
                    SortValue::Text(value.to_string_value(self.source))
                });
            }
            keyed.push((keys, node));
        }

        // Stable, so equal keys keep document order
        keyed.sort_by(|(a, _), (b, _)| {
            for ((x, y), sort) in a.iter().zip(b).zip(sorts) {
                let ordering = match (x, y) {
                    (SortValue::Number(x), SortValue::Number(y)) => compare_numbers(*x, *y),
                    (SortValue::Text(x), SortValue::Text(y)) => x.cmp(y),
                    _ => Ordering::Equal,
                };
                let ordering = if sort.descending { ordering.reverse() } else { ordering };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
        Ok(keyed.into_iter().map(|(_, node)| node).collect())
    }
}

fn checked_name(name: String) -> Result<String, XsltError> {
    if is_qname(&name) {
        Ok(name)
    } else {
        Err(XsltError::InvalidName(name))
    }
}

/// NaN sorts before every number.
fn compare_numbers(x: f64, y: f64) -> Ordering {
    match (x.is_nan(), y.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    }
}
