//! The arena-backed document tree.

use crate::node::{Element, NodeId, NodeKind};

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An owned XML document. Nodes live in an arena and are addressed by
/// [`NodeId`]; detached nodes stay allocated but are unreachable from the root.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty document holding only the root node.
    pub fn new() -> Self {
        Document {
            nodes: vec![NodeData {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// A document whose root element is a fresh `name` element.
    pub fn with_root_element(name: &str) -> (Self, NodeId) {
        let mut doc = Document::new();
        let element = doc.append_element(doc.root(), name);
        (doc, element)
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Element name or processing-instruction target.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(element) => Some(&element.name),
            NodeKind::ProcessingInstruction { target, .. } => Some(target),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Descendants of `id` in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            result.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        result
    }

    /// The single element child of the root, if the document has one.
    pub fn document_element(&self) -> Option<NodeId> {
        self.children(self.root())
            .iter()
            .copied()
            .find(|&c| self.element(c).is_some())
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|e| e.attribute(name))
    }

    /// The XPath string value: concatenated text for roots and elements, own
    /// content for everything else.
    pub fn text_content(&self, id: NodeId) -> String {
        match &self.nodes[id.0].kind {
            NodeKind::Root | NodeKind::Element(_) => {
                let mut out = String::new();
                for node in self.descendants(id) {
                    if let NodeKind::Text(text) | NodeKind::CData(text) = &self.nodes[node.0].kind {
                        out.push_str(text);
                    }
                }
                out
            }
            NodeKind::Text(text) | NodeKind::CData(text) | NodeKind::Comment(text) => text.clone(),
            NodeKind::ProcessingInstruction { data, .. } => data.clone(),
        }
    }

    /// Allocates a detached node.
    pub fn create_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.create_node(NodeKind::Element(Element::new(name)))
    }

    /// Moves `child` under `parent` as its last child. Appending a node to itself
    /// or to one of its own descendants is ignored.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if self.is_ancestor_or_self(child, parent) || child == self.root() {
            log::warn!("Refusing to append node {:?} under {:?}", child, parent);
            return;
        }
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    pub fn append_element(&mut self, parent: NodeId, name: &str) -> NodeId {
        let element = self.create_element(name);
        self.append_child(parent, element);
        element
    }

    /// Appends text, merging with a trailing text node. Empty text is dropped.
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(&last) = self.nodes[parent.0].children.last() {
            if let NodeKind::Text(existing) = &mut self.nodes[last.0].kind {
                existing.push_str(text);
                return;
            }
        }
        let node = self.create_node(NodeKind::Text(text.to_string()));
        self.append_child(parent, node);
    }

    /// Sets an attribute on an element; a no-op for other node kinds.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        if let Some(element) = self.element_mut(id) {
            element.set_attribute(name, value);
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Option<String> {
        self.element_mut(id)?.remove_attribute(name)
    }

    /// Unlinks a node from its parent. The subtree stays intact.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    /// Replaces a node with a text node at the same position and returns the new node.
    pub fn replace_with_text(&mut self, id: NodeId, text: &str) -> NodeId {
        let replacement = self.create_node(NodeKind::Text(text.to_string()));
        if let Some(parent) = self.nodes[id.0].parent.take() {
            let siblings = &mut self.nodes[parent.0].children;
            if let Some(slot) = siblings.iter_mut().find(|c| **c == id) {
                *slot = replacement;
            }
            self.nodes[replacement.0].parent = Some(parent);
        }
        replacement
    }

    /// Deep-copies `node` from `source` under `parent`. Copying a root copies its
    /// children.
    pub fn append_copy(&mut self, parent: NodeId, source: &Document, node: NodeId) {
        match source.kind(node) {
            NodeKind::Root => {
                for &child in source.children(node) {
                    self.append_copy(parent, source, child);
                }
            }
            NodeKind::Text(text) => self.append_text(parent, text),
            kind => {
                let copy = self.create_node(kind.clone());
                self.append_child(parent, copy);
                for &child in source.children(node) {
                    self.append_copy(copy, source, child);
                }
            }
        }
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes[id.0].parent;
        }
        false
    }

    /// Number of allocated nodes, detached ones included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_and_traverse() {
        let (mut doc, page) = Document::with_root_element("page");
        let title = doc.append_element(page, "title");
        doc.append_text(title, "Hello");
        doc.append_text(title, ", world");
        let body = doc.append_element(page, "body");
        doc.set_attribute(body, "class", "main");

        assert_eq!(doc.document_element(), Some(page));
        assert_eq!(doc.children(title).len(), 1, "adjacent text merges");
        assert_eq!(doc.text_content(page), "Hello, world");
        assert_eq!(doc.descendants(doc.root()), vec![page, title, doc.children(title)[0], body]);
        assert_eq!(doc.attribute(body, "class"), Some("main"));
        assert_eq!(doc.parent(body), Some(page));
    }

    #[test]
    fn test_set_attribute_keeps_order() {
        let (mut doc, e) = Document::with_root_element("a");
        doc.set_attribute(e, "x", "1");
        doc.set_attribute(e, "y", "2");
        doc.set_attribute(e, "x", "3");
        let names: Vec<_> = doc
            .element(e)
            .unwrap()
            .attributes
            .iter()
            .map(|a| (a.name.as_str(), a.value.as_str()))
            .collect();
        assert_eq!(names, vec![("x", "3"), ("y", "2")]);
        assert_eq!(doc.remove_attribute(e, "y"), Some("2".to_string()));
        assert_eq!(doc.remove_attribute(e, "y"), None);
    }

    #[test]
    fn test_replace_with_text_keeps_position() {
        let (mut doc, p) = Document::with_root_element("p");
        doc.append_text(p, "a");
        let marker = doc.append_element(p, "marker");
        let tail = doc.append_element(p, "b");
        let replacement = doc.replace_with_text(marker, "X");
        assert_eq!(doc.children(p)[1], replacement);
        assert_eq!(doc.children(p)[2], tail);
        assert_eq!(doc.parent(marker), None);
        assert_eq!(doc.text_content(p), "aX");
    }

    #[test]
    fn test_append_child_moves_and_refuses_cycles() {
        let (mut doc, a) = Document::with_root_element("a");
        let b = doc.append_element(a, "b");
        let c = doc.append_element(b, "c");
        doc.append_child(a, c);
        assert_eq!(doc.children(a), &[b, c]);
        assert!(doc.children(b).is_empty());

        doc.append_child(c, a);
        assert_eq!(doc.parent(a), Some(doc.root()));
    }

    #[test]
    fn test_append_copy_between_documents() {
        let (mut source, list) = Document::with_root_element("list");
        let item = source.append_element(list, "item");
        source.set_attribute(item, "id", "1");
        source.append_text(item, "one");

        let (mut target, out) = Document::with_root_element("out");
        target.append_copy(out, &source, list);
        let copied = target.children(out)[0];
        assert_eq!(target.name(copied), Some("list"));
        let copied_item = target.children(copied)[0];
        assert_eq!(target.attribute(copied_item, "id"), Some("1"));
        assert_eq!(target.text_content(copied_item), "one");
    }
}
