//! XSLT `match` patterns, parsed with the XPath grammar and matched right to left.

use crate::error::XsltError;
use std::fmt;
use vista_xpath::ast::{Axis, BinaryOperator, Expression, LocationPath, NodeTest, NodeTypeTest, Step};
use vista_xpath::engine::evaluate_step;
use vista_xpath::{DataSourceNode, EvaluationContext, NodeType, XPathError, node_test_matches, parse_expression};

/// One alternative of a (possibly union) match pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct PathPattern {
    path: LocationPath,
    text: String,
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Parses a pattern into its union alternatives.
pub fn parse(text: &str) -> Result<Vec<PathPattern>, XsltError> {
    let error = |message: String| XsltError::Pattern {
        pattern: text.to_string(),
        message,
    };
    let expr = parse_expression(text).map_err(|e| error(e.to_string()))?;
    let mut paths = Vec::new();
    collect_alternatives(expr, &mut paths).map_err(error)?;
    Ok(paths
        .into_iter()
        .map(|path| PathPattern {
            path,
            text: text.trim().to_string(),
        })
        .collect())
}

fn collect_alternatives(expr: Expression, out: &mut Vec<LocationPath>) -> Result<(), String> {
    match expr {
        Expression::BinaryOp {
            left,
            op: BinaryOperator::Union,
            right,
        } => {
            collect_alternatives(*left, out)?;
            collect_alternatives(*right, out)
        }
        Expression::LocationPath(path) if path.start_point.is_none() => {
            for step in &path.steps {
                let allowed = matches!(step.axis, Axis::Child | Axis::Attribute) || is_descendant_marker(step);
                if !allowed {
                    return Err(format!("axis {:?} is not allowed in patterns", step.axis));
                }
            }
            out.push(path);
            Ok(())
        }
        _ => Err("patterns must be location paths joined by '|'".to_string()),
    }
}

/// The `descendant-or-self::node()` step that `//` expands to.
fn is_descendant_marker(step: &Step) -> bool {
    step.axis == Axis::DescendantOrSelf
        && step.node_test == NodeTest::NodeType(NodeTypeTest::Node)
        && step.predicates.is_empty()
}

impl PathPattern {
    /// The XSLT 1.0 default priority of this alternative.
    pub fn default_priority(&self) -> f64 {
        match self.path.steps.as_slice() {
            [step] if !self.path.is_absolute && step.predicates.is_empty() => match &step.node_test {
                NodeTest::Name(_) => 0.0,
                NodeTest::PrefixWildcard(_) => -0.25,
                NodeTest::Wildcard | NodeTest::NodeType(_) => -0.5,
            },
            _ => 0.5,
        }
    }

    /// Whether `node` matches. Predicates are evaluated with the variables of `e_ctx`.
    pub fn matches<'a, N>(&self, node: N, e_ctx: &EvaluationContext<'a, '_, N>) -> Result<bool, XPathError>
    where
        N: DataSourceNode<'a> + 'a,
    {
        match_steps(&self.path.steps, self.path.is_absolute, node, e_ctx)
    }
}

fn match_steps<'a, N>(
    steps: &[Step],
    absolute: bool,
    node: N,
    e_ctx: &EvaluationContext<'a, '_, N>,
) -> Result<bool, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    let Some((last, rest)) = steps.split_last() else {
        return Ok(!absolute || node.node_type() == NodeType::Root);
    };

    if is_descendant_marker(last) {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if match_steps(rest, absolute, candidate, e_ctx)? {
                return Ok(true);
            }
            current = candidate.parent();
        }
        return Ok(false);
    }

    if !step_matches(last, node, e_ctx)? {
        return Ok(false);
    }
    match node.parent() {
        Some(parent) => match_steps(rest, absolute, parent, e_ctx),
        None => Ok(false),
    }
}

fn step_matches<'a, N>(step: &Step, node: N, e_ctx: &EvaluationContext<'a, '_, N>) -> Result<bool, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    let node_type = node.node_type();
    let axis_ok = match step.axis {
        Axis::Attribute => node_type == NodeType::Attribute,
        _ => !matches!(node_type, NodeType::Root | NodeType::Attribute),
    };
    if !axis_ok || !node_test_matches(node, &step.node_test, step.axis) {
        return Ok(false);
    }
    if step.predicates.is_empty() {
        return Ok(true);
    }
    let Some(parent) = node.parent() else {
        return Ok(false);
    };
    Ok(evaluate_step(step, parent, e_ctx)?.contains(&node))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::DomTree;
    use std::collections::HashMap;
    use vista_dom::Document;

    fn single(text: &str) -> PathPattern {
        let mut alternatives = parse(text).unwrap();
        assert_eq!(alternatives.len(), 1);
        alternatives.remove(0)
    }

    #[test]
    fn test_pattern_parsing() {
        assert_eq!(parse("item|note").unwrap().len(), 2);
        assert!(parse("/").is_ok());
        assert!(parse("/page//item[@id]").is_ok());
        assert!(parse("@lang").is_ok());
        assert!(parse("text()").is_ok());
        assert!(parse("ancestor::item").is_err());
        assert!(parse("$nav/item").is_err());
        assert!(parse("1 + 2").is_err());
    }

    #[test]
    fn test_default_priorities() {
        assert_eq!(single("item").default_priority(), 0.0);
        assert_eq!(single("@id").default_priority(), 0.0);
        assert_eq!(single("i18n:*").default_priority(), -0.25);
        assert_eq!(single("*").default_priority(), -0.5);
        assert_eq!(single("node()").default_priority(), -0.5);
        assert_eq!(single("menu/item").default_priority(), 0.5);
        assert_eq!(single("item[1]").default_priority(), 0.5);
        assert_eq!(single("/").default_priority(), 0.5);
    }

    #[test]
    fn test_matching() {
        let doc = Document::parse(
            r#"<page><menu><item id="a">A</item><item id="b">B</item></menu><item>C</item></page>"#,
        )
        .unwrap();
        let tree = DomTree::new(&doc);
        let root = tree.root();
        let vars = HashMap::new();
        let ctx = EvaluationContext::new(root, root, 1, 1, &vars, false);
        let page = root.children().next().unwrap();
        let menu = page.children().next().unwrap();
        let first = menu.children().next().unwrap();
        let second = menu.children().nth(1).unwrap();
        let loose = page.children().nth(1).unwrap();
        let text = first.children().next().unwrap();
        let id = first.attributes().next().unwrap();

        let matches = |pattern: &str, node| single(pattern).matches(node, &ctx).unwrap();
        assert!(matches("/", root));
        assert!(!matches("node()", root));
        assert!(matches("item", loose));
        assert!(matches("menu/item", first));
        assert!(!matches("menu/item", loose));
        assert!(matches("/page/item", loose));
        assert!(matches("page//item", first));
        assert!(matches("//item", loose));
        assert!(matches("item[2]", second));
        assert!(!matches("item[2]", first));
        assert!(matches("item[@id='a']", first));
        assert!(matches("text()", text));
        assert!(matches("@id", id));
        assert!(!matches("*", id));
        assert!(matches("item/@*", id));
    }
}
