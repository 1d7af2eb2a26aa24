//! XML serialization.

use quick_xml::escape::escape;

use super::{NodeData, NodeId, XmlDocument};

impl XmlDocument {
    /// Serializes the whole document (every child of the document node).
    pub fn to_xml_string(&self) -> String {
        self.inner_xml(self.root())
    }

    /// Serializes `id` including its own tag.
    pub fn serialize_node(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    /// Serializes the children of `id`.
    pub fn inner_xml(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(id) {
            self.write_node(child, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        let mut stack = vec![Visit::Open(id)];
        while let Some(visit) = stack.pop() {
            let id = match visit {
                Visit::Open(id) => id,
                Visit::Close(name) => {
                    out.push_str("</");
                    out.push_str(name);
                    out.push('>');
                    continue;
                }
            };
            match self.data(id) {
                NodeData::Document => {
                    stack.extend(self.children(id).iter().rev().map(|&c| Visit::Open(c)));
                }
                NodeData::Element(element) => {
                    out.push('<');
                    out.push_str(&element.name);
                    for attr in &element.attributes {
                        out.push(' ');
                        out.push_str(&attr.name);
                        out.push_str("=\"");
                        out.push_str(&escape(attr.value.as_str()));
                        out.push('"');
                    }
                    let children = self.children(id);
                    if children.is_empty() {
                        out.push_str("/>");
                        continue;
                    }
                    out.push('>');
                    stack.push(Visit::Close(&element.name));
                    stack.extend(children.iter().rev().map(|&c| Visit::Open(c)));
                }
                NodeData::Text(text) => out.push_str(&escape(text.as_str())),
                NodeData::Comment(text) => {
                    out.push_str("<!--");
                    out.push_str(text);
                    out.push_str("-->");
                }
            }
        }
    }
}

/// Pending work for the serializer's explicit stack.
enum Visit<'a> {
    Open(NodeId),
    Close(&'a str),
}
