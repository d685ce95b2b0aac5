//! Markup serialization.

use crate::document::Document;
use crate::node::{NodeId, NodeKind};
use quick_xml::escape::partial_escape;

/// Knobs for [`Document::to_xml_with`].
#[derive(Debug, Clone, Default)]
pub struct SerializeOptions {
    pub omit_declaration: bool,
    /// Indents elements whose children are all elements or comments.
    pub indent: bool,
    /// Elements whose text children are written as CDATA sections.
    pub cdata_section_elements: Vec<String>,
}

impl Document {
    /// `<?xml version="1.0"?>`, a newline, then each top-level node followed by a newline.
    pub fn to_xml(&self) -> String {
        self.to_xml_with(&SerializeOptions::default())
    }

    pub fn to_xml_with(&self, options: &SerializeOptions) -> String {
        let mut out = String::new();
        if !options.omit_declaration {
            out.push_str("<?xml version=\"1.0\"?>\n");
        }
        for &child in self.children(self.root()) {
            write_node(self, child, options, 0, &mut out);
            out.push('\n');
        }
        out
    }

    /// Serializes a single subtree without declaration.
    pub fn node_to_xml(&self, id: NodeId) -> String {
        let mut out = String::new();
        let options = SerializeOptions::default();
        if id == self.root() {
            for &child in self.children(id) {
                write_node(self, child, &options, 0, &mut out);
            }
        } else {
            write_node(self, id, &options, 0, &mut out);
        }
        out
    }
}

pub fn escape_text(text: &str) -> String {
    partial_escape(text).into_owned()
}

pub fn escape_attribute(value: &str) -> String {
    partial_escape(value).replace('"', "&quot;")
}

fn write_cdata(text: &str, out: &mut String) {
    out.push_str("<![CDATA[");
    out.push_str(&text.replace("]]>", "]]]]><![CDATA[>"));
    out.push_str("]]>");
}

fn write_node(doc: &Document, id: NodeId, options: &SerializeOptions, depth: usize, out: &mut String) {
    match doc.kind(id) {
        NodeKind::Root => {
            for &child in doc.children(id) {
                write_node(doc, child, options, depth, out);
            }
        }
        NodeKind::Text(text) => {
            let in_cdata_element = doc
                .parent(id)
                .and_then(|p| doc.name(p))
                .is_some_and(|name| options.cdata_section_elements.iter().any(|c| c == name));
            if in_cdata_element {
                write_cdata(text, out);
            } else {
                out.push_str(&escape_text(text));
            }
        }
        NodeKind::CData(text) => write_cdata(text, out),
        NodeKind::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeKind::ProcessingInstruction { target, data } => {
            out.push_str("<?");
            out.push_str(target);
            if !data.is_empty() {
                out.push(' ');
                out.push_str(data);
            }
            out.push_str("?>");
        }
        NodeKind::Element(element) => {
            out.push('<');
            out.push_str(&element.name);
            for attr in &element.attributes {
                out.push(' ');
                out.push_str(&attr.name);
                out.push_str("=\"");
                out.push_str(&escape_attribute(&attr.value));
                out.push('"');
            }
            let children = doc.children(id);
            if children.is_empty() {
                out.push_str("/>");
                return;
            }
            out.push('>');

            let indent_children = options.indent
                && children
                    .iter()
                    .all(|&c| matches!(doc.kind(c), NodeKind::Element(_) | NodeKind::Comment(_)));
            for &child in children {
                if indent_children {
                    out.push('\n');
                    out.push_str(&"  ".repeat(depth + 1));
                }
                write_node(doc, child, options, depth + 1, out);
            }
            if indent_children {
                out.push('\n');
                out.push_str(&"  ".repeat(depth));
            }
            out.push_str("</");
            out.push_str(&element.name);
            out.push('>');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_xml_escapes_and_collapses_empty_elements() {
        let (mut doc, root) = Document::with_root_element("a");
        doc.set_attribute(root, "title", "x \"y\" & <z>");
        let b = doc.append_element(root, "b");
        doc.append_text(b, "1 < 2 & 3 > 2");
        doc.append_element(root, "c");

        assert_eq!(
            doc.to_xml(),
            "<?xml version=\"1.0\"?>\n<a title=\"x &quot;y&quot; &amp; &lt;z&gt;\"><b>1 &lt; 2 &amp; 3 &gt; 2</b><c/></a>\n"
        );
    }

    #[test]
    fn test_serialized_output_is_well_formed() {
        let source = r#"<page xmlns="http://www.w3.org/1999/xhtml"><p class="a&amp;b">x<!--c--><?pi data?><![CDATA[<raw>]]></p></page>"#;
        let doc = Document::parse(source).unwrap();
        let xml = doc.to_xml();
        let reparsed = roxmltree::Document::parse(&xml).unwrap();
        let p = reparsed.root_element().first_element_child().unwrap();
        assert_eq!(p.attribute("class"), Some("a&b"));
        assert_eq!(doc.node_to_xml(doc.root()), source);
    }

    #[test]
    fn test_cdata_section_elements_and_indent() {
        let (mut doc, root) = Document::with_root_element("html");
        let script = doc.append_element(root, "script");
        doc.append_text(script, "if (a < b) {}");
        let options = SerializeOptions {
            omit_declaration: true,
            indent: true,
            cdata_section_elements: vec!["script".to_string()],
        };
        assert_eq!(
            doc.to_xml_with(&options),
            "<html>\n  <script><![CDATA[if (a < b) {}]]></script>\n</html>\n"
        );
    }
}
