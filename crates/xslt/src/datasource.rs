//! An implementation of the `DataSourceNode` trait for `vista_dom::Document`.

use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use vista_dom::{Document, NodeId, NodeKind};
use vista_xpath::{DataSourceNode, NodeType, QName};

/// A read-only view of a document with precomputed document order, so node
/// handles can be compared cheaply.
pub struct DomTree<'a> {
    doc: &'a Document,
    order: Vec<u32>,
}

impl<'a> DomTree<'a> {
    pub fn new(doc: &'a Document) -> Self {
        let mut order = vec![u32::MAX; doc.node_count()];
        order[doc.root().index()] = 0;
        for (position, id) in doc.descendants(doc.root()).into_iter().enumerate() {
            order[id.index()] = position as u32 + 1;
        }
        DomTree { doc, order }
    }

    pub fn document(&self) -> &'a Document {
        self.doc
    }

    /// The XPath root node, parent of the document element.
    pub fn root(&'a self) -> DomNode<'a> {
        DomNode {
            tree: self,
            node: NodeRef::Node(self.doc.root()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Node(NodeId),
    /// An attribute, addressed by its owner and its index in the owner's list.
    Attribute(NodeId, usize),
}

/// A node handle implementing the XPath data model over a [`DomTree`].
#[derive(Clone, Copy)]
pub struct DomNode<'a> {
    tree: &'a DomTree<'a>,
    node: NodeRef,
}

impl<'a> DomNode<'a> {
    pub fn node_ref(&self) -> NodeRef {
        self.node
    }

    pub fn document(&self) -> &'a Document {
        self.tree.doc
    }

    /// The underlying arena id; attributes report their owner element.
    pub fn id(&self) -> NodeId {
        match self.node {
            NodeRef::Node(id) | NodeRef::Attribute(id, _) => id,
        }
    }

    fn with(&self, node: NodeRef) -> Self {
        DomNode {
            tree: self.tree,
            node,
        }
    }

    fn sort_key(&self) -> (u32, usize) {
        match self.node {
            NodeRef::Node(id) => (self.tree.order[id.index()], 0),
            NodeRef::Attribute(owner, index) => (self.tree.order[owner.index()], index + 1),
        }
    }
}

impl Debug for DomNode<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.node {
            NodeRef::Node(id) => write!(f, "DomNode({:?}, {:?})", id, self.tree.doc.kind(id)),
            NodeRef::Attribute(owner, index) => write!(f, "DomAttribute({:?}, {})", owner, index),
        }
    }
}

impl PartialEq for DomNode<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}
impl Eq for DomNode<'_> {}

impl Hash for DomNode<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node.hash(state);
    }
}

impl PartialOrd for DomNode<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DomNode<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl<'a> DataSourceNode<'a> for DomNode<'a> {
    fn node_type(&self) -> NodeType {
        match self.node {
            NodeRef::Attribute(..) => NodeType::Attribute,
            NodeRef::Node(id) => match self.tree.doc.kind(id) {
                NodeKind::Root => NodeType::Root,
                NodeKind::Element(_) => NodeType::Element,
                NodeKind::Text(_) | NodeKind::CData(_) => NodeType::Text,
                NodeKind::Comment(_) => NodeType::Comment,
                NodeKind::ProcessingInstruction { .. } => NodeType::ProcessingInstruction,
            },
        }
    }

    fn name(&self) -> Option<QName<'a>> {
        let doc: &'a Document = self.tree.doc;
        match self.node {
            NodeRef::Node(id) => doc.name(id).map(QName::parse),
            NodeRef::Attribute(owner, index) => doc
                .element(owner)
                .and_then(|e| e.attributes.get(index))
                .map(|a| QName::parse(&a.name)),
        }
    }

    fn string_value(&self) -> String {
        match self.node {
            NodeRef::Node(id) => self.tree.doc.text_content(id),
            NodeRef::Attribute(owner, index) => self
                .tree
                .doc
                .element(owner)
                .and_then(|e| e.attributes.get(index))
                .map(|a| a.value.clone())
                .unwrap_or_default(),
        }
    }

    fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
        let this = *self;
        let doc: &'a Document = self.tree.doc;
        match self.node {
            NodeRef::Node(id) => match doc.element(id) {
                Some(element) => Box::new(
                    element
                        .attributes
                        .iter()
                        .enumerate()
                        .filter(|(_, a)| !a.is_namespace_declaration())
                        .map(move |(index, _)| this.with(NodeRef::Attribute(id, index))),
                ),
                None => Box::new(std::iter::empty()),
            },
            NodeRef::Attribute(..) => Box::new(std::iter::empty()),
        }
    }

    fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
        let this = *self;
        let doc: &'a Document = self.tree.doc;
        match self.node {
            NodeRef::Node(id) => Box::new(
                doc.children(id)
                    .iter()
                    .map(move |&child| this.with(NodeRef::Node(child))),
            ),
            NodeRef::Attribute(..) => Box::new(std::iter::empty()),
        }
    }

    fn parent(&self) -> Option<Self> {
        match self.node {
            NodeRef::Node(id) => self.tree.doc.parent(id).map(|p| self.with(NodeRef::Node(p))),
            NodeRef::Attribute(owner, _) => Some(self.with(NodeRef::Node(owner))),
        }
    }

    fn namespace_declarations(&self) -> Vec<(&'a str, &'a str)> {
        let doc: &'a Document = self.tree.doc;
        let NodeRef::Node(id) = self.node else {
            return Vec::new();
        };
        doc.element(id)
            .map(|element| {
                element
                    .attributes
                    .iter()
                    .filter(|a| a.is_namespace_declaration())
                    .map(|a| (a.name.strip_prefix("xmlns:").unwrap_or(""), a.value.as_str()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use vista_xpath::{EvaluationContext, XPathValue, evaluate, parse_expression};

    #[test]
    fn test_xpath_over_dom_tree() {
        let doc = Document::parse(
            r#"<menu xmlns:x="urn:x" lang="en"><item id="a">Home</item><item id="b">News</item></menu>"#,
        )
        .unwrap();
        let tree = DomTree::new(&doc);
        let root = tree.root();
        let vars = HashMap::new();
        let ctx = EvaluationContext::new(root, root, 1, 1, &vars, false);

        let expr = parse_expression("/menu/item[@id='b']").unwrap();
        let value = evaluate(&expr, &ctx).unwrap();
        assert_eq!(value.to_string(), "News");

        // Namespace declarations are not attributes in the data model.
        let expr = parse_expression("count(/menu/@*)").unwrap();
        assert_eq!(evaluate(&expr, &ctx).unwrap(), XPathValue::Number(1.0));
    }

    #[test]
    fn test_document_order_places_attributes_after_their_element() {
        let doc = Document::parse(r#"<a x="1"><b/></a>"#).unwrap();
        let tree = DomTree::new(&doc);
        let a = tree.root().children().next().unwrap();
        let x = a.attributes().next().unwrap();
        let b = a.children().next().unwrap();
        assert!(tree.root() < a);
        assert!(a < x);
        assert!(x < b);
        assert_eq!(x.parent(), Some(a));
    }

    #[test]
    fn test_namespace_declarations_of_an_element() {
        let doc = Document::parse(r#"<h:r xmlns:h="urn:h" xmlns="urn:d" id="1"><b/></h:r>"#).unwrap();
        let tree = DomTree::new(&doc);
        let r = tree.root().children().next().unwrap();
        assert_eq!(r.namespace_declarations(), vec![("h", "urn:h"), ("", "urn:d")]);
        let b = r.children().next().unwrap();
        assert!(b.namespace_declarations().is_empty());
        assert!(r.attributes().next().unwrap().namespace_declarations().is_empty());
    }
}
