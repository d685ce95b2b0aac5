use crate::ast::{SortKey, Variable};
use crate::error::XsltError;
use crate::executor::{Focus, TemplateExecutor};
use crate::executor_handlers::for_each::sort_node_set;
use crate::output::OutputBuilder;
use vista_xpath::{DataSourceNode, Expression, NodeType, XPathValue};

#[allow(clippy::too_many_arguments)]
pub(crate) fn handle_apply_templates<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    select: Option<&Expression>,
    mode: Option<&str>,
    params: &[Variable],
    sort_keys: &[SortKey],
    focus: Focus<N>,
    builder: &mut dyn OutputBuilder,
) -> Result<(), XsltError> {
    let mut nodes_to_process = match select {
        Some(sel) => executor.select_nodes(sel, focus)?,
        None => focus.node.children().collect(),
    };
    sort_node_set(executor, &mut nodes_to_process, sort_keys)?;
    let passed = executor.evaluate_params(params, focus)?;
    apply_templates_to_nodes(executor, &nodes_to_process, mode, &passed, builder)
}

/// Processes each node with its best matching rule, falling back to the built-in rules.
pub(crate) fn apply_templates_to_nodes<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    nodes: &[N],
    mode: Option<&str>,
    passed: &[(String, XPathValue<N>)],
    builder: &mut dyn OutputBuilder,
) -> Result<(), XsltError> {
    let context_size = nodes.len();
    for (i, &node) in nodes.iter().enumerate() {
        let focus = Focus {
            node,
            position: i + 1,
            size: context_size,
        };
        match executor.find_matching_rule(node, mode)? {
            Some(rule) => executor.invoke_template(&rule.body, &rule.params, passed, focus, builder)?,
            None => apply_builtin_template(executor, node, mode, builder)?,
        }
    }
    Ok(())
}

fn apply_builtin_template<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    node: N,
    mode: Option<&str>,
    builder: &mut dyn OutputBuilder,
) -> Result<(), XsltError> {
    match node.node_type() {
        NodeType::Root | NodeType::Element => {
            let children: Vec<N> = node.children().collect();
            apply_templates_to_nodes(executor, &children, mode, &[], builder)?;
        }
        NodeType::Text | NodeType::Attribute => builder.add_text(&node.string_value()),
        NodeType::Comment | NodeType::ProcessingInstruction => {}
    }
    Ok(())
}
