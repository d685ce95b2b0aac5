//! Builds a [`Document`] from markup by driving a `quick-xml` reader.

use crate::document::Document;
use crate::error::DomError;
use crate::node::{Attribute, Element, NodeId, NodeKind};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event as XmlEvent};

impl Document {
    /// Parses a complete, well-formed XML document.
    ///
    /// Namespace declarations are kept as ordinary attributes and names are
    /// stored as written, prefix included.
    pub fn parse(source: &str) -> Result<Document, DomError> {
        let mut reader = Reader::from_str(source);
        reader.config_mut().trim_text(false);
        reader.config_mut().check_end_names = true;

        let mut doc = Document::new();
        let mut stack: Vec<NodeId> = vec![doc.root()];

        loop {
            let pos = reader.buffer_position() as u64;
            let event = reader.read_event().map_err(|e| DomError::Syntax {
                position: reader.buffer_position() as u64,
                message: e.to_string(),
            })?;
            let parent = *stack.last().unwrap_or(&doc.root());
            let at_top_level = stack.len() == 1;

            match event {
                XmlEvent::Start(e) => {
                    let element = open_element(&mut doc, parent, &e, pos)?;
                    stack.push(element);
                }
                XmlEvent::Empty(e) => {
                    open_element(&mut doc, parent, &e, pos)?;
                }
                XmlEvent::End(_) => {
                    if !at_top_level {
                        stack.pop();
                    }
                }
                XmlEvent::Text(e) => {
                    let text = e.unescape().map_err(|err| syntax(pos, err))?;
                    if at_top_level {
                        if !text.trim().is_empty() {
                            return Err(DomError::ContentOutsideRoot(pos));
                        }
                    } else {
                        doc.append_text(parent, &text);
                    }
                }
                XmlEvent::CData(e) => {
                    if at_top_level {
                        return Err(DomError::ContentOutsideRoot(pos));
                    }
                    let text = String::from_utf8_lossy(&e).into_owned();
                    let node = doc.create_node(NodeKind::CData(text));
                    doc.append_child(parent, node);
                }
                XmlEvent::Comment(e) => {
                    let text = String::from_utf8_lossy(&e).into_owned();
                    let node = doc.create_node(NodeKind::Comment(text));
                    doc.append_child(parent, node);
                }
                XmlEvent::PI(e) => {
                    let content = String::from_utf8_lossy(&e).into_owned();
                    let (target, data) = match content.split_once(char::is_whitespace) {
                        Some((target, data)) => (target.to_string(), data.trim_start().to_string()),
                        None => (content.clone(), String::new()),
                    };
                    let node = doc.create_node(NodeKind::ProcessingInstruction { target, data });
                    doc.append_child(parent, node);
                }
                XmlEvent::Decl(_) | XmlEvent::DocType(_) => {}
                XmlEvent::Eof => break,
            }
        }

        if stack.len() > 1 {
            let open = stack
                .last()
                .and_then(|&id| doc.name(id))
                .unwrap_or_default()
                .to_string();
            return Err(DomError::Unclosed(open));
        }
        if doc.document_element().is_none() {
            return Err(DomError::NoRootElement);
        }
        Ok(doc)
    }
}

fn syntax(position: u64, err: impl std::fmt::Display) -> DomError {
    DomError::Syntax {
        position,
        message: err.to_string(),
    }
}

fn open_element(
    doc: &mut Document,
    parent: NodeId,
    start: &BytesStart,
    pos: u64,
) -> Result<NodeId, DomError> {
    if parent == doc.root() && doc.document_element().is_some() {
        return Err(DomError::ContentOutsideRoot(pos));
    }

    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(|e| syntax(pos, e))?;
        let name = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| syntax(pos, e))?.into_owned();
        element.attributes.push(Attribute { name, value });
    }

    let id = doc.create_node(NodeKind::Element(element));
    doc.append_child(parent, id);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_elements_attributes_and_text() {
        let doc = Document::parse(
            r#"<?xml version="1.0"?><page xmlns:i18n="http://apache.org/cocoon/i18n/2.1" lang="en"><title>Fish &amp; Chips</title><!-- note --><br/></page>"#,
        )
        .unwrap();
        let page = doc.document_element().unwrap();
        let element = doc.element(page).unwrap();
        assert_eq!(element.name, "page");
        assert_eq!(
            element.attribute("xmlns:i18n"),
            Some("http://apache.org/cocoon/i18n/2.1")
        );
        assert_eq!(element.attribute("lang"), Some("en"));

        let children = doc.children(page);
        assert_eq!(children.len(), 3);
        assert_eq!(doc.text_content(children[0]), "Fish & Chips");
        assert_eq!(doc.kind(children[1]), &NodeKind::Comment(" note ".to_string()));
        assert_eq!(doc.name(children[2]), Some("br"));
    }

    #[test]
    fn test_parse_keeps_cdata_and_processing_instructions() {
        let doc = Document::parse("<?style href='a'?><s><![CDATA[a < b]]></s>").unwrap();
        let root_children = doc.children(doc.root());
        assert_eq!(
            doc.kind(root_children[0]),
            &NodeKind::ProcessingInstruction {
                target: "style".into(),
                data: "href='a'".into()
            }
        );
        let s = doc.document_element().unwrap();
        assert_eq!(doc.kind(doc.children(s)[0]), &NodeKind::CData("a < b".into()));
        assert_eq!(doc.text_content(s), "a < b");
    }

    #[test]
    fn test_parse_rejects_malformed_markup() {
        assert!(matches!(
            Document::parse("<a><b></a>"),
            Err(DomError::Syntax { .. })
        ));
        assert!(Document::parse("<a>").is_err());
        assert!(matches!(Document::parse("   "), Err(DomError::NoRootElement)));
        assert!(matches!(
            Document::parse("<a/><b/>"),
            Err(DomError::ContentOutsideRoot(_))
        ));
        assert!(matches!(
            Document::parse("<a/>trailing"),
            Err(DomError::ContentOutsideRoot(_))
        ));
        assert!(matches!(
            Document::parse("<a>&nbsp;</a>"),
            Err(DomError::Syntax { .. })
        ));
        assert!(matches!(
            Document::parse(r#"<a x="1" x="2"/>"#),
            Err(DomError::Syntax { .. })
        ));
    }
}
