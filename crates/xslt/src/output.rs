//! Defines the `OutputBuilder` trait, which decouples the template executor
//! from the tree it writes into.

use std::any::Any;
use vista_dom::{Document, NodeId, NodeKind};
use vista_xpath::TreeFragment;

/// The semantic actions of building a result tree.
pub trait OutputBuilder {
    fn start_element(&mut self, name: &str);
    fn end_element(&mut self);

    /// Sets an attribute on the currently open element. Returns `false` when there
    /// is no open element or it already received child content.
    fn set_attribute(&mut self, name: &str, value: &str) -> bool;

    /// Binds `prefix` (empty for the default namespace) on the open element
    /// unless the result already has that binding in scope.
    fn declare_namespace(&mut self, prefix: &str, uri: &str);

    fn add_text(&mut self, text: &str);
    fn add_comment(&mut self, text: &str);
}

/// Builds a [`Document`].
pub struct ResultTree {
    doc: Document,
    /// Open nodes and whether each already has children.
    stack: Vec<(NodeId, bool)>,
}

impl Default for ResultTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultTree {
    pub fn new() -> Self {
        let doc = Document::new();
        let root = doc.root();
        ResultTree {
            doc,
            stack: vec![(root, false)],
        }
    }

    pub fn into_document(self) -> Document {
        self.doc
    }

    /// The namespace `prefix` is bound to at `id`; the default namespace is ""
    /// when nothing declares it.
    fn namespace_in_scope(&self, id: NodeId, prefix: &str) -> Option<&str> {
        let attribute = if prefix.is_empty() {
            "xmlns".to_string()
        } else {
            format!("xmlns:{}", prefix)
        };
        let mut current = Some(id);
        while let Some(node) = current {
            if let Some(uri) = self.doc.attribute(node, &attribute) {
                return Some(uri);
            }
            current = self.doc.parent(node);
        }
        prefix.is_empty().then_some("")
    }

    fn current(&mut self) -> NodeId {
        match self.stack.last_mut() {
            Some((id, has_content)) => {
                *has_content = true;
                *id
            }
            None => self.doc.root(),
        }
    }
}

impl OutputBuilder for ResultTree {
    fn start_element(&mut self, name: &str) {
        let parent = self.current();
        let id = self.doc.append_element(parent, name);
        self.stack.push((id, false));
    }

    fn end_element(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    fn set_attribute(&mut self, name: &str, value: &str) -> bool {
        match self.stack.last() {
            Some(&(id, false)) if self.stack.len() > 1 => {
                self.doc.set_attribute(id, name, value);
                true
            }
            _ => false,
        }
    }

    fn declare_namespace(&mut self, prefix: &str, uri: &str) {
        let Some(&(id, false)) = self.stack.last() else {
            return;
        };
        if self.stack.len() < 2 || self.namespace_in_scope(id, prefix) == Some(uri) {
            return;
        }
        let name = if prefix.is_empty() {
            "xmlns".to_string()
        } else {
            format!("xmlns:{}", prefix)
        };
        self.doc.set_attribute(id, &name, uri);
    }

    fn add_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let parent = self.current();
        self.doc.append_text(parent, text);
    }

    fn add_comment(&mut self, text: &str) {
        let parent = self.current();
        let comment = self.doc.create_node(NodeKind::Comment(text.to_string()));
        self.doc.append_child(parent, comment);
    }
}

/// A tree built from the content of a variable or parameter.
#[derive(Debug)]
pub struct ResultFragment(pub Document);

impl TreeFragment for ResultFragment {
    fn string_value(&self) -> String {
        self.0.text_content(self.0.root())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Collects the string value of whatever is written into it. Used for attribute,
/// comment and message content.
#[derive(Debug, Default)]
pub struct TextBuilder {
    text: String,
}

impl TextBuilder {
    pub fn into_string(self) -> String {
        self.text
    }
}

impl OutputBuilder for TextBuilder {
    fn start_element(&mut self, _name: &str) {}

    fn end_element(&mut self) {}

    fn set_attribute(&mut self, _name: &str, _value: &str) -> bool {
        false
    }

    fn declare_namespace(&mut self, _prefix: &str, _uri: &str) {}

    fn add_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn add_comment(&mut self, _text: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_tree_builds_nested_elements() {
        let mut tree = ResultTree::new();
        tree.start_element("ul");
        assert!(tree.set_attribute("class", "menu"));
        tree.start_element("li");
        tree.add_text("Home");
        tree.add_text("");
        tree.end_element();
        tree.add_comment(" end ");
        tree.end_element();

        let doc = tree.into_document();
        assert_eq!(
            doc.node_to_xml(doc.root()),
            "<ul class=\"menu\"><li>Home</li><!-- end --></ul>"
        );
    }

    #[test]
    fn test_attributes_are_refused_after_content() {
        let mut tree = ResultTree::new();
        assert!(!tree.set_attribute("orphan", "x"));
        tree.start_element("p");
        tree.add_text("text");
        assert!(!tree.set_attribute("late", "x"));
        tree.end_element();
        let doc = tree.into_document();
        assert_eq!(doc.node_to_xml(doc.root()), "<p>text</p>");
    }

    #[test]
    fn test_namespaces_are_declared_once_per_scope() {
        let mut tree = ResultTree::new();
        tree.start_element("h:r");
        tree.declare_namespace("h", "urn:h");
        tree.start_element("h:b");
        tree.declare_namespace("h", "urn:h");
        tree.declare_namespace("", "");
        tree.end_element();
        tree.start_element("x:c");
        tree.declare_namespace("x", "urn:x");
        tree.declare_namespace("h", "urn:other");
        tree.end_element();
        tree.end_element();

        let doc = tree.into_document();
        assert_eq!(
            doc.node_to_xml(doc.root()),
            r#"<h:r xmlns:h="urn:h"><h:b/><x:c xmlns:x="urn:x" xmlns:h="urn:other"/></h:r>"#
        );
    }

    #[test]
    fn test_fragment_string_value_is_its_text() {
        let mut tree = ResultTree::new();
        tree.start_element("b");
        tree.add_text("x");
        tree.end_element();
        tree.add_text("y");
        let fragment = ResultFragment(tree.into_document());
        assert_eq!(fragment.string_value(), "xy");
    }

    #[test]
    fn test_text_builder_keeps_only_text() {
        let mut text = TextBuilder::default();
        text.add_text("a");
        text.start_element("b");
        text.add_text("c");
        text.add_comment("ignored");
        text.end_element();
        assert_eq!(text.into_string(), "ac");
    }
}
