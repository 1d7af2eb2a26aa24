//! Arena-backed XML document model.
//!
//! One `XmlDocument` type represents fetched XML, XSLT stylesheets, transform
//! results and the host page. Nodes live in a `Vec` and are addressed by
//! `NodeId`; node 0 is always the document node.

mod parser;
mod serialize;

use std::fmt;

/// Index of a node within its `XmlDocument`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// An attribute on an element, with its qualified name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// Element name and attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Qualified name as written, e.g. `xsl:template`
    pub name: String,
    pub attributes: Vec<Attribute>,
}

impl Element {
    /// The part of the name after the prefix.
    pub fn local_name(&self) -> &str {
        split_qname(&self.name).1
    }

    /// The namespace prefix, if the name has one.
    pub fn prefix(&self) -> Option<&str> {
        split_qname(&self.name).0
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }
}

/// What a node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Document,
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Splits `prefix:local` into its parts.
pub fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

/// Whether `name` is a qualified name: one or two NCNames joined by `:`.
pub fn is_qname(name: &str) -> bool {
    let is_ncname = |part: &str| {
        let mut chars = part.chars();
        chars.next().is_some_and(|c| c.is_alphabetic() || c == '_')
            && chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '.' | '_'))
    };
    match name.split_once(':') {
        Some((prefix, local)) => is_ncname(prefix) && is_ncname(local),
        None => is_ncname(name),
    }
}

/// Whether `text` can be written as comment content: no `--` and no
/// trailing `-`.
pub fn is_comment_text(text: &str) -> bool {
    !text.contains("--") && !text.ends_with('-')
}

/// An XML document or document fragment.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    nodes: Vec<Node>,
}

impl Default for XmlDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlDocument {
    /// Creates a document containing only the document node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// The document node.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The first element child of the document node.
    pub fn document_element(&self) -> Option<NodeId> {
        self.children(self.root())
            .iter()
            .copied()
            .find(|&id| self.element(id).is_some())
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.0].data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    /// Qualified element name.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.name.as_str())
    }

    pub fn local_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(Element::local_name)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|e| e.attribute(name))
    }

    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        match &self.nodes[id.0].data {
            NodeData::Element(element) => &element.attributes,
            _ => &[],
        }
    }

    /// Resolves `prefix` (or the default namespace for `None`) in scope at `id`.
    pub fn lookup_namespace(&self, id: NodeId, prefix: Option<&str>) -> Option<&str> {
        let wanted = match prefix {
            Some("xml") => return Some("http://www.w3.org/XML/1998/namespace"),
            Some(p) => format!("xmlns:{p}"),
            None => "xmlns".to_string(),
        };
        let mut current = Some(id);
        while let Some(node) = current {
            if let Some(uri) = self.attribute(node, &wanted) {
                return (!uri.is_empty()).then_some(uri);
            }
            current = self.parent(node);
        }
        None
    }

    /// Namespace URI of an element's name.
    pub fn namespace_uri(&self, id: NodeId) -> Option<&str> {
        let prefix = self.element(id)?.prefix();
        self.lookup_namespace(id, prefix)
    }

    /// Concatenated text of all descendant text nodes (the XPath string-value).
    pub fn text_content(&self, id: NodeId) -> String {
        match &self.nodes[id.0].data {
            NodeData::Text(text) | NodeData::Comment(text) => text.clone(),
            NodeData::Document | NodeData::Element(_) => {
                let mut out = String::new();
                for node in self.descendants(id) {
                    if let NodeData::Text(text) = self.data(node) {
                        out.push_str(text);
                    }
                }
                out
            }
        }
    }

    /// Descendants of `id` in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let mut stack: Vec<NodeId> = self.children(id).to_vec();
        stack.reverse();
        Descendants { doc: self, stack }
    }

    /// First element (in document order) whose `id` attribute equals `id`.
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.root())
            .find(|&node| self.attribute(node, "id") == Some(id))
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Creates a detached element.
    pub fn create_element(&mut self, name: impl Into<String>) -> NodeId {
        self.push(NodeData::Element(Element {
            name: name.into(),
            attributes: Vec::new(),
        }))
    }

    /// Creates a detached text node.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeData::Text(text.into()))
    }

    /// Creates a detached comment node.
    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeData::Comment(text.into()))
    }

    /// Appends `child` as the last child of `parent`, detaching it first if needed.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Appends text to `parent`, merging with a trailing text child.
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(&last) = self.nodes[parent.0].children.last() {
            if let NodeData::Text(existing) = &mut self.nodes[last.0].data {
                existing.push_str(text);
                return;
            }
        }
        let node = self.create_text(text);
        self.append_child(parent, node);
    }

    /// Sets (or replaces) an attribute. Ignored for non-element nodes.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let NodeData::Element(element) = &mut self.nodes[id.0].data {
            match element.attributes.iter_mut().find(|a| a.name == name) {
                Some(existing) => existing.value = value,
                None => element.attributes.push(Attribute {
                    name: name.to_string(),
                    value,
                }),
            }
        }
    }

    fn detach(&mut self, child: NodeId) {
        if let Some(parent) = self.nodes[child.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != child);
        }
    }

    /// Detaches every child of `id`.
    ///
    /// Detached nodes stay in the arena but are unreachable from the root.
    pub fn remove_children(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.nodes[id.0].children);
        for child in children {
            self.nodes[child.0].parent = None;
        }
    }

    /// Deep-copies `node` from `source` into this document, returning the detached copy.
    ///
    /// Importing a document node copies it as an element-less container: use
    /// `import_children` to copy a whole fragment instead.
    pub fn import_node(&mut self, source: &XmlDocument, node: NodeId) -> NodeId {
        let copy = self.push(source.data(node).clone());
        // (source node, parent copy), popped in document order
        let mut pending: Vec<(NodeId, NodeId)> =
            source.children(node).iter().rev().map(|&c| (c, copy)).collect();
        while let Some((original, parent)) = pending.pop() {
            let child = self.push(source.data(original).clone());
            self.append_child(parent, child);
            pending.extend(source.children(original).iter().rev().map(|&c| (c, child)));
        }
        copy
    }

    /// Deep-copies every child of `source_parent` and appends the copies to `parent`.
    pub fn import_children(&mut self, parent: NodeId, source: &XmlDocument, source_parent: NodeId) {
        for &child in source.children(source_parent) {
            let copy = self.import_node(source, child);
            self.append_child(parent, copy);
        }
    }

    /// Replaces the content of `target` with copies of the children of `source_parent`.
    pub fn replace_children(
        &mut self,
        target: NodeId,
        source: &XmlDocument,
        source_parent: NodeId,
    ) {
        self.remove_children(target);
        self.import_children(target, source, source_parent);
    }

    /// Number of nodes in the arena, including detached ones.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the document node is the only node.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }
}

impl fmt::Display for XmlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xml_string())
    }
}

/// Preorder iterator over the descendants of a node.
pub struct Descendants<'a> {
    doc: &'a XmlDocument,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let next = self.stack.pop()?;
        self.stack
            .extend(self.doc.children(next).iter().rev().copied());
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> XmlDocument {
        XmlDocument::parse(
            r#"<html xmlns="http://www.w3.org/1999/xhtml"><body><div id="a">one</div><p id="b">two <b>three</b></p></body></html>"#,
        )
        .expect("sample parses")
    }

    #[test]
    fn test_name_and_comment_checks() {
        assert!(is_qname("item"));
        assert!(is_qname("atom:entry"));
        assert!(is_qname("_x-1.y"));
        assert!(!is_qname(""));
        assert!(!is_qname("1st"));
        assert!(!is_qname("a b"));
        assert!(!is_qname("a:"));
        assert!(!is_qname("a:b:c"));

        assert!(is_comment_text(" note - ok "));
        assert!(!is_comment_text("a--b"));
        assert!(!is_comment_text("trailing-"));
    }

    #[test]
    fn test_get_element_by_id() {
        let doc = sample();
        let p = doc.get_element_by_id("b").expect("p exists");
        assert_eq!(doc.name(p), Some("p"));
        assert!(doc.get_element_by_id("missing").is_none());
    }

    #[test]
    fn test_text_content_concatenates_descendants() {
        let doc = sample();
        let p = doc.get_element_by_id("b").expect("p exists");
        assert_eq!(doc.text_content(p), "two three");
    }

    #[test]
    fn test_descendants_are_in_document_order() {
        let doc = sample();
        let names: Vec<&str> = doc
            .descendants(doc.root())
            .filter_map(|n| doc.name(n))
            .collect();
        assert_eq!(names, vec!["html", "body", "div", "p", "b"]);
    }

    #[test]
    fn test_default_namespace_resolution() {
        let doc = sample();
        let div = doc.get_element_by_id("a").expect("div exists");
        assert_eq!(doc.namespace_uri(div), Some("http://www.w3.org/1999/xhtml"));
    }

    #[test]
    fn test_replace_children_imports_copies() {
        let mut page = sample();
        let fragment = XmlDocument::parse_fragment("<em>new</em> text").expect("fragment parses");
        let div = page.get_element_by_id("a").expect("div exists");

        page.replace_children(div, &fragment, fragment.root());

        assert_eq!(page.serialize_node(div), "<div id=\"a\"><em>new</em> text</div>");
        // The source fragment is untouched
        assert_eq!(fragment.to_xml_string(), "<em>new</em> text");
    }

    #[test]
    fn test_append_text_merges_adjacent_text() {
        let mut doc = XmlDocument::new();
        let root = doc.create_element("r");
        doc.append_child(doc.root(), root);
        doc.append_text(root, "a");
        doc.append_text(root, "b");
        assert_eq!(doc.children(root).len(), 1);
        assert_eq!(doc.text_content(root), "ab");
    }

    #[test]
    fn test_set_attribute_replaces_existing() {
        let mut doc = XmlDocument::new();
        let el = doc.create_element("a");
        doc.set_attribute(el, "href", "x");
        doc.set_attribute(el, "href", "y");
        assert_eq!(doc.attribute(el, "href"), Some("y"));
        assert_eq!(doc.attributes(el).len(), 1);
    }

    #[test]
    fn test_split_qname() {
        assert_eq!(split_qname("xsl:template"), (Some("xsl"), "template"));
        assert_eq!(split_qname("div"), (None, "div"));
    }
}
