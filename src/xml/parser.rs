//! XML parsing with quick-xml.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{NodeId, XmlDocument};
use crate::config::MAX_XML_DEPTH;
use crate::error_handling::XmlError;

impl XmlDocument {
    /// Parses a complete document.
    ///
    /// The markup must have exactly one root element. Text (including
    /// whitespace) and comments inside it are preserved, CDATA sections become
    /// text, and the XML declaration, doctype and processing instructions are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns an `XmlError` for malformed markup, mismatched or unclosed
    /// tags, or a missing or repeated root element. Elements nested more than
    /// `MAX_XML_DEPTH` levels deep fail with `XmlError::TooDeep`.
    pub fn parse(text: &str) -> Result<Self, XmlError> {
        parse_markup(text, false)
    }

    /// Parses markup that may contain any number of top-level nodes.
    ///
    /// The nodes become children of the returned document's root, the way
    /// assigning `innerHTML` would create them.
    pub fn parse_fragment(text: &str) -> Result<Self, XmlError> {
        parse_markup(text, true)
    }
}

fn parse_markup(text: &str, fragment: bool) -> Result<XmlDocument, XmlError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(false);

    let mut doc = XmlDocument::new();
    let mut stack: Vec<NodeId> = vec![doc.root()];

    loop {
        let event = reader.read_event().map_err(|e| XmlError::Syntax {
            position: reader.buffer_position() as u64,
            message: e.to_string(),
        })?;
        let parent = stack.last().copied().unwrap_or_else(|| doc.root());
        let at_top = stack.len() == 1;

        match event {
            Event::Start(e) => {
                check_single_root(&doc, fragment, at_top)?;
                // The document node sits at the bottom of the stack
                if stack.len() > MAX_XML_DEPTH {
                    return Err(XmlError::TooDeep(MAX_XML_DEPTH));
                }
                let element = create_element(&mut doc, &e, &reader)?;
                doc.append_child(parent, element);
                stack.push(element);
            }
            Event::Empty(e) => {
                check_single_root(&doc, fragment, at_top)?;
                if stack.len() > MAX_XML_DEPTH {
                    return Err(XmlError::TooDeep(MAX_XML_DEPTH));
                }
                let element = create_element(&mut doc, &e, &reader)?;
                doc.append_child(parent, element);
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(e) => {
                let content = e.unescape().map_err(|err| XmlError::Syntax {
                    position: reader.buffer_position() as u64,
                    message: err.to_string(),
                })?;
                if at_top && !fragment {
                    if content.trim().is_empty() {
                        continue;
                    }
                    return Err(XmlError::Syntax {
                        position: reader.buffer_position() as u64,
                        message: "text outside the root element".to_string(),
                    });
                }
                doc.append_text(parent, &content);
            }
            Event::CData(e) => {
                let content = String::from_utf8_lossy(&e.into_inner()).into_owned();
                doc.append_text(parent, &content);
            }
            Event::Comment(e) => {
                let content = String::from_utf8_lossy(&e).into_owned();
                let comment = doc.create_comment(content);
                doc.append_child(parent, comment);
            }
            Event::Eof => break,
            // Declaration, doctype and processing instructions carry no content we keep
            _ => {}
        }
    }

    if stack.len() > 1 {
        let open = stack
            .last()
            .and_then(|&id| doc.name(id))
            .unwrap_or_default()
            .to_string();
        return Err(XmlError::UnclosedElement(open));
    }
    if !fragment && doc.document_element().is_none() {
        return Err(XmlError::NoRootElement);
    }
    Ok(doc)
}

fn check_single_root(doc: &XmlDocument, fragment: bool, at_top: bool) -> Result<(), XmlError> {
    if !fragment && at_top && doc.document_element().is_some() {
        return Err(XmlError::MultipleRootElements);
    }
    Ok(())
}

fn create_element(
    doc: &mut XmlDocument,
    start: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
) -> Result<NodeId, XmlError> {
    let syntax = |message: String| XmlError::Syntax {
        position: reader.buffer_position() as u64,
        message,
    };

    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let element = doc.create_element(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| syntax(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| syntax(e.to_string()))?;
        doc.set_attribute(element, &key, value.into_owned());
    }
    Ok(element)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::NodeData;

    #[test]
    fn test_parse_simple_document() {
        let doc = XmlDocument::parse(
            r#"<?xml version="1.0"?><catalog><book id="1" lang="en">Rust &amp; XML</book></catalog>"#,
        )
        .expect("should parse");
        let root = doc.document_element().expect("has root");
        assert_eq!(doc.name(root), Some("catalog"));
        let book = doc.children(root)[0];
        assert_eq!(doc.attribute(book, "lang"), Some("en"));
        assert_eq!(doc.text_content(book), "Rust & XML");
    }

    #[test]
    fn test_parse_preserves_whitespace_and_comments() {
        let doc = XmlDocument::parse("<a> <b/> <!-- note --></a>").expect("should parse");
        let a = doc.document_element().expect("has root");
        let kinds: Vec<&NodeData> = doc.children(a).iter().map(|&c| doc.data(c)).collect();
        assert_eq!(kinds.len(), 4);
        assert_eq!(kinds[0], &NodeData::Text(" ".to_string()));
        assert_eq!(kinds[3], &NodeData::Comment(" note ".to_string()));
    }

    #[test]
    fn test_cdata_becomes_text() {
        let doc = XmlDocument::parse("<a><![CDATA[<raw>]]></a>").expect("should parse");
        let a = doc.document_element().expect("has root");
        assert_eq!(doc.text_content(a), "<raw>");
    }

    #[test]
    fn test_mismatched_tags_rejected() {
        let err = XmlDocument::parse("<a><b></a>").unwrap_err();
        assert!(matches!(err, XmlError::Syntax { .. }));
    }

    #[test]
    fn test_unclosed_element_rejected() {
        let err = XmlDocument::parse("<a><b>").unwrap_err();
        // The reader may flag the truncation itself; otherwise the open <b> is reported
        assert!(
            matches!(&err, XmlError::UnclosedElement(name) if name == "b")
                || matches!(err, XmlError::Syntax { .. }),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn test_empty_input_has_no_root() {
        assert_eq!(XmlDocument::parse("  ").unwrap_err(), XmlError::NoRootElement);
    }

    #[test]
    fn test_multiple_roots_rejected() {
        assert_eq!(
            XmlDocument::parse("<a/><b/>").unwrap_err(),
            XmlError::MultipleRootElements
        );
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |depth: usize| "<a>".repeat(depth) + &"</a>".repeat(depth);

        let doc = XmlDocument::parse(&nested(MAX_XML_DEPTH)).expect("limit depth is accepted");
        assert_eq!(doc.len(), MAX_XML_DEPTH + 1);

        assert_eq!(
            XmlDocument::parse(&nested(MAX_XML_DEPTH + 1)).unwrap_err(),
            XmlError::TooDeep(MAX_XML_DEPTH)
        );
        assert_eq!(
            XmlDocument::parse(&nested(200_000)).unwrap_err(),
            XmlError::TooDeep(MAX_XML_DEPTH)
        );
        assert_eq!(
            XmlDocument::parse_fragment(&nested(MAX_XML_DEPTH + 1)).unwrap_err(),
            XmlError::TooDeep(MAX_XML_DEPTH)
        );
    }

    #[test]
    fn test_fragment_allows_several_top_level_nodes() {
        let doc = XmlDocument::parse_fragment("<li>1</li>text<li>2</li>").expect("should parse");
        assert_eq!(doc.children(doc.root()).len(), 3);
        assert!(XmlDocument::parse_fragment("").expect("empty ok").is_empty());
    }
}
