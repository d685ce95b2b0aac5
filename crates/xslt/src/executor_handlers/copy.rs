use crate::ast::Template;
use crate::error::XsltError;
use crate::executor::{Focus, TemplateExecutor};
use crate::output::{OutputBuilder, ResultFragment};
use vista_dom::{Document, NodeId, NodeKind};
use vista_xpath::{DataSourceNode, Expression, NodeType, XPathValue};

/// Shallow copy of the context node; the body supplies attributes and content.
pub(crate) fn handle_copy<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    body: &Template,
    focus: Focus<N>,
    builder: &mut dyn OutputBuilder,
) -> Result<(), XsltError> {
    let node = focus.node;
    match node.node_type() {
        NodeType::Element => {
            let name = node.name().map(|q| q.to_string()).unwrap_or_default();
            builder.start_element(&name);
            copy_namespaces(node, builder);
            executor.execute_template(body, focus, builder)?;
            builder.end_element();
        }
        NodeType::Root => executor.execute_template(body, focus, builder)?,
        NodeType::Attribute => copy_attribute(executor, node, builder),
        NodeType::Text => builder.add_text(&node.string_value()),
        NodeType::Comment => builder.add_comment(&node.string_value()),
        NodeType::ProcessingInstruction => {}
    }
    Ok(())
}

pub(crate) fn handle_copy_of<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    select: &Expression,
    focus: Focus<N>,
    builder: &mut dyn OutputBuilder,
) -> Result<(), XsltError> {
    match executor.evaluate(select, focus)? {
        XPathValue::NodeSet(nodes) => {
            for node in nodes {
                copy_data_source_node(executor, node, builder);
            }
        }
        XPathValue::Fragment(fragment) => match fragment.downcast_ref::<ResultFragment>() {
            Some(ResultFragment(doc)) => {
                for &child in doc.children(doc.root()) {
                    copy_fragment_node(doc, child, builder);
                }
            }
            None => builder.add_text(&fragment.0.string_value()),
        },
        other => builder.add_text(&other.to_string()),
    }
    Ok(())
}

/// Deep copy of `node` and its attributes and descendants.
fn copy_data_source_node<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    node: N,
    builder: &mut dyn OutputBuilder,
) {
    match node.node_type() {
        NodeType::Element => {
            let name = node.name().map(|q| q.to_string()).unwrap_or_default();
            builder.start_element(&name);
            copy_namespaces(node, builder);
            for attribute in node.attributes() {
                copy_attribute(executor, attribute, builder);
            }
            for child in node.children() {
                copy_data_source_node(executor, child, builder);
            }
            builder.end_element();
        }
        NodeType::Root => {
            for child in node.children() {
                copy_data_source_node(executor, child, builder);
            }
        }
        NodeType::Attribute => copy_attribute(executor, node, builder),
        NodeType::Text => builder.add_text(&node.string_value()),
        NodeType::Comment => builder.add_comment(&node.string_value()),
        NodeType::ProcessingInstruction => {}
    }
}

/// Replays a fragment node into `builder`. Namespace declarations are plain
/// attributes in a fragment, so they travel with the element.
fn copy_fragment_node(doc: &Document, id: NodeId, builder: &mut dyn OutputBuilder) {
    match doc.kind(id) {
        NodeKind::Element(element) => {
            builder.start_element(&element.name);
            for attribute in &element.attributes {
                builder.set_attribute(&attribute.name, &attribute.value);
            }
            for &child in doc.children(id) {
                copy_fragment_node(doc, child, builder);
            }
            builder.end_element();
        }
        NodeKind::Text(text) | NodeKind::CData(text) => builder.add_text(text),
        NodeKind::Comment(text) => builder.add_comment(text),
        NodeKind::Root | NodeKind::ProcessingInstruction { .. } => {}
    }
}

/// Declares what the copied element needs: its own declarations plus the
/// binding of its prefix, or of the default namespace when it has none.
/// Attribute prefixes are declared as the attributes are copied.
fn copy_namespaces<'a, N: DataSourceNode<'a>>(element: N, builder: &mut dyn OutputBuilder) {
    for (prefix, uri) in element.namespace_declarations() {
        builder.declare_namespace(prefix, uri);
    }

    let prefix = element.name().and_then(|q| q.prefix).unwrap_or("");
    if let Some(uri) = namespace_in_scope(element, prefix) {
        builder.declare_namespace(prefix, uri);
    }
}

fn copy_attribute_namespace<'a, N: DataSourceNode<'a>>(attribute: N, builder: &mut dyn OutputBuilder) {
    let Some(prefix) = attribute.name().and_then(|q| q.prefix) else {
        return;
    };
    if prefix == "xml" {
        return;
    }
    if let Some(uri) = attribute.parent().and_then(|owner| namespace_in_scope(owner, prefix)) {
        builder.declare_namespace(prefix, uri);
    }
}

/// The nearest declaration of `prefix` on `node` or its ancestors.
fn namespace_in_scope<'a, N: DataSourceNode<'a>>(node: N, prefix: &str) -> Option<&'a str> {
    let mut current = Some(node);
    while let Some(candidate) = current {
        let declared = candidate
            .namespace_declarations()
            .into_iter()
            .find(|(declared, _)| *declared == prefix);
        if let Some((_, uri)) = declared {
            return Some(uri);
        }
        current = candidate.parent();
    }
    None
}

fn copy_attribute<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    attribute: N,
    builder: &mut dyn OutputBuilder,
) {
    let name = attribute.name().map(|q| q.to_string()).unwrap_or_default();
    copy_attribute_namespace(attribute, builder);
    if !builder.set_attribute(&name, &attribute.string_value()) {
        executor.diagnose(format!("attribute '{}' cannot be added after child content", name));
    }
}
