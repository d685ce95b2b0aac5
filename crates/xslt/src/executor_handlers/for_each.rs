use crate::ast::{SortDataType, SortKey, SortOrder, Template};
use crate::error::XsltError;
use crate::executor::{Focus, TemplateExecutor};
use crate::output::OutputBuilder;
use std::cmp::Ordering;
use vista_xpath::{DataSourceNode, Expression, XPathValue};

pub(crate) fn handle_for_each<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    select: &Expression,
    sort_keys: &[SortKey],
    body: &Template,
    focus: Focus<N>,
    builder: &mut dyn OutputBuilder,
) -> Result<(), XsltError> {
    let mut nodes = executor.select_nodes(select, focus)?;
    sort_node_set(executor, &mut nodes, sort_keys)?;
    let inner_context_size = nodes.len();
    for (i, node) in nodes.into_iter().enumerate() {
        let inner = Focus {
            node,
            position: i + 1,
            size: inner_context_size,
        };
        executor.execute_template(body, inner, builder)?;
    }
    Ok(())
}

/// Stable sort by the given keys, each evaluated with the node as context.
/// In number order `NaN` sorts before every number.
pub(crate) fn sort_node_set<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &TemplateExecutor<'s, 'a, N>,
    nodes: &mut Vec<N>,
    sort_keys: &[SortKey],
) -> Result<(), XsltError> {
    if sort_keys.is_empty() {
        return Ok(());
    }

    let size = nodes.len();
    let mut keyed = Vec::with_capacity(size);
    for (i, &node) in nodes.iter().enumerate() {
        let focus = Focus {
            node,
            position: i + 1,
            size,
        };
        let values = sort_keys
            .iter()
            .map(|key| executor.evaluate(&key.select, focus))
            .collect::<Result<Vec<XPathValue<N>>, XsltError>>()?;
        keyed.push((node, values));
    }

    keyed.sort_by(|(_, a), (_, b)| {
        sort_keys
            .iter()
            .zip(a.iter().zip(b.iter()))
            .map(|(key, (val_a, val_b))| {
                let ordering = match key.data_type {
                    SortDataType::Number => compare_numbers(val_a.to_number(), val_b.to_number()),
                    SortDataType::Text => val_a.to_string().cmp(&val_b.to_string()),
                };
                if key.order == SortOrder::Descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    });

    *nodes = keyed.into_iter().map(|(node, _)| node).collect();
    Ok(())
}

fn compare_numbers(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}
