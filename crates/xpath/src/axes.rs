//! Node collection along each XPath axis.
//!
//! Every function returns nodes in axis order: document order for forward axes,
//! nearest-first for reverse ones.

use crate::ast::Axis;
use crate::datasource::{DataSourceNode, NodeType};

pub fn collect<'a, N: DataSourceNode<'a>>(axis: Axis, node: N) -> Vec<N> {
    match axis {
        Axis::Child => node.children().collect(),
        Axis::Attribute => node.attributes().collect(),
        Axis::SelfAxis => vec![node],
        Axis::Parent => node.parent().into_iter().collect(),
        Axis::Descendant => descendants(node),
        Axis::DescendantOrSelf => {
            let mut nodes = vec![node];
            nodes.extend(descendants(node));
            nodes
        }
        Axis::Ancestor => ancestors(node),
        Axis::AncestorOrSelf => {
            let mut nodes = vec![node];
            nodes.extend(ancestors(node));
            nodes
        }
        Axis::FollowingSibling => following_siblings(node),
        Axis::PrecedingSibling => preceding_siblings(node),
        Axis::Following => following(node),
        Axis::Preceding => preceding(node),
    }
}

/// Descendants in document order, attributes excluded.
pub fn descendants<'a, N: DataSourceNode<'a>>(node: N) -> Vec<N> {
    let mut results = Vec::new();
    let mut stack: Vec<N> = node.children().collect();
    stack.reverse();
    while let Some(current) = stack.pop() {
        results.push(current);
        let mut children: Vec<N> = current.children().collect();
        children.reverse();
        stack.extend(children);
    }
    results
}

fn ancestors<'a, N: DataSourceNode<'a>>(node: N) -> Vec<N> {
    let mut results = Vec::new();
    let mut current = node.parent();
    while let Some(p) = current {
        results.push(p);
        current = p.parent();
    }
    results
}

fn is_attribute<'a, N: DataSourceNode<'a>>(node: N) -> bool {
    node.node_type() == NodeType::Attribute
}

fn following_siblings<'a, N: DataSourceNode<'a>>(node: N) -> Vec<N> {
    if is_attribute(node) {
        return vec![];
    }
    match node.parent() {
        Some(parent) => parent.children().skip_while(|s| *s != node).skip(1).collect(),
        None => vec![],
    }
}

fn preceding_siblings<'a, N: DataSourceNode<'a>>(node: N) -> Vec<N> {
    if is_attribute(node) {
        return vec![];
    }
    match node.parent() {
        Some(parent) => {
            let mut siblings: Vec<N> = parent.children().take_while(|s| *s != node).collect();
            siblings.reverse();
            siblings
        }
        None => vec![],
    }
}

fn following<'a, N: DataSourceNode<'a>>(node: N) -> Vec<N> {
    let mut results = Vec::new();
    // An attribute's following nodes begin with its element's content.
    let mut current = if is_attribute(node) {
        match node.parent() {
            Some(owner) => {
                results.extend(descendants(owner));
                owner
            }
            None => return results,
        }
    } else {
        node
    };
    loop {
        for sibling in following_siblings(current) {
            results.push(sibling);
            results.extend(descendants(sibling));
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }
    results
}

fn preceding<'a, N: DataSourceNode<'a>>(node: N) -> Vec<N> {
    let mut results = Vec::new();
    let mut current = match (is_attribute(node), node.parent()) {
        (true, Some(owner)) => owner,
        (true, None) => return results,
        (false, _) => node,
    };
    loop {
        for sibling in preceding_siblings(current) {
            let mut subtree = vec![sibling];
            subtree.extend(descendants(sibling));
            subtree.reverse();
            results.extend(subtree);
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::mock::menu_tree;

    fn ids<'a, N: DataSourceNode<'a>>(nodes: Vec<N>, id: impl Fn(&N) -> usize) -> Vec<usize> {
        nodes.iter().map(id).collect()
    }

    #[test]
    fn test_forward_axes_are_in_document_order() {
        let tree = menu_tree();
        let root = tree.node(0);
        assert_eq!(
            ids(collect(Axis::Descendant, root), |n| n.id),
            vec![1, 3, 5, 6, 8, 9, 10]
        );
        assert_eq!(ids(collect(Axis::FollowingSibling, tree.node(3)), |n| n.id), vec![6, 9]);
        assert_eq!(ids(collect(Axis::Following, tree.node(5)), |n| n.id), vec![6, 8, 9, 10]);
        assert_eq!(ids(collect(Axis::Attribute, tree.node(1)), |n| n.id), vec![2]);
    }

    #[test]
    fn test_reverse_axes_are_nearest_first() {
        let tree = menu_tree();
        assert_eq!(ids(collect(Axis::Ancestor, tree.node(8)), |n| n.id), vec![6, 1, 0]);
        assert_eq!(ids(collect(Axis::PrecedingSibling, tree.node(9)), |n| n.id), vec![6, 3]);
        assert_eq!(ids(collect(Axis::Preceding, tree.node(9)), |n| n.id), vec![8, 6, 5, 3]);
    }

    #[test]
    fn test_attributes_have_no_siblings() {
        let tree = menu_tree();
        assert!(collect(Axis::FollowingSibling, tree.node(4)).is_empty());
        assert_eq!(ids(collect(Axis::Parent, tree.node(4)), |n| n.id), vec![3]);
    }
}
