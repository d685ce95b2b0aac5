//! The read-only tree abstraction the XPath engine evaluates against.
use std::hash::Hash;

/// A qualified name split into an optional prefix and a local part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QName<'a> {
    pub prefix: Option<&'a str>,
    pub local_part: &'a str,
}

impl<'a> QName<'a> {
    /// Splits `prefix:local` at the first colon.
    pub fn parse(qualified: &'a str) -> Self {
        match qualified.split_once(':') {
            Some((prefix, local_part)) => QName {
                prefix: Some(prefix),
                local_part,
            },
            None => QName {
                prefix: None,
                local_part: qualified,
            },
        }
    }

    /// Compares against a name test as written in an expression. Unprefixed tests
    /// compare local parts only.
    pub fn matches_test(&self, test: &str) -> bool {
        match test.split_once(':') {
            Some((prefix, local)) => self.prefix == Some(prefix) && self.local_part == local,
            None => self.local_part == test,
        }
    }
}

impl std::fmt::Display for QName<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.prefix {
            Some(prefix) => write!(f, "{}:{}", prefix, self.local_part),
            None => write!(f, "{}", self.local_part),
        }
    }
}

/// Node kinds of the XPath 1.0 data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Root,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
}

/// A cheap, copyable handle to a node in some read-only tree.
///
/// `Ord` must follow document order; the engine relies on it to return node-sets
/// in the order XSLT processes them.
pub trait DataSourceNode<'a>:
    std::fmt::Debug + Clone + Copy + PartialEq + Eq + Hash + PartialOrd + Ord
{
    fn node_type(&self) -> NodeType;

    /// Element or attribute name, or the target of a processing instruction.
    fn name(&self) -> Option<QName<'a>>;

    /// The XPath `string()` value of the node.
    fn string_value(&self) -> String;

    fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a>;

    fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a>;

    fn parent(&self) -> Option<Self>;

    /// Namespaces declared on this element as `(prefix, uri)`, with an empty
    /// prefix for the default namespace. Trees without namespace support declare
    /// none.
    fn namespace_declarations(&self) -> Vec<(&'a str, &'a str)> {
        Vec::new()
    }
}
