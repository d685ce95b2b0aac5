//! Conversion of nested key/value data into a document.

use crate::document::Document;
use crate::error::DomError;
use crate::node::NodeId;
use serde_json::Value;

/// Whether `name` can be used as an element name as-is.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_alphabetic() || first == '_') {
        return false;
    }
    if name.get(..3).is_some_and(|p| p.eq_ignore_ascii_case("xml")) {
        return false;
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

impl Document {
    /// Converts `value` into a document rooted at a `root_name` element.
    ///
    /// Object keys become child elements, sequences repeat their key's element,
    /// scalars become text and `null` an empty element. Keys that are not legal
    /// element names become `<entry key="...">`.
    pub fn from_value(root_name: &str, value: &Value) -> Result<Document, DomError> {
        if !is_valid_name(root_name) {
            return Err(DomError::InvalidName(root_name.to_string()));
        }
        let (mut doc, root) = Document::with_root_element(root_name);
        match value {
            Value::Array(items) => {
                for item in items {
                    let child = doc.append_element(root, "item");
                    fill(&mut doc, child, item);
                }
            }
            other => fill(&mut doc, root, other),
        }
        Ok(doc)
    }
}

fn keyed_element(doc: &mut Document, parent: NodeId, key: &str) -> NodeId {
    if is_valid_name(key) {
        doc.append_element(parent, key)
    } else {
        let entry = doc.append_element(parent, "entry");
        doc.set_attribute(entry, "key", key);
        entry
    }
}

fn fill(doc: &mut Document, element: NodeId, value: &Value) {
    match value {
        Value::Null => {}
        Value::Bool(b) => doc.append_text(element, if *b { "true" } else { "false" }),
        Value::Number(n) => doc.append_text(element, &n.to_string()),
        Value::String(s) => doc.append_text(element, s),
        Value::Array(items) => {
            for item in items {
                let child = doc.append_element(element, "item");
                fill(doc, child, item);
            }
        }
        Value::Object(map) => {
            for (key, child_value) in map {
                match child_value {
                    Value::Array(items) => {
                        for item in items {
                            let child = keyed_element(doc, element, key);
                            fill(doc, child, item);
                        }
                    }
                    _ => {
                        let child = keyed_element(doc, element, key);
                        fill(doc, child, child_value);
                    }
                }
            }
        }
    }
}
