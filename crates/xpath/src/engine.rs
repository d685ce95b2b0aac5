//! The evaluation engine for executing a parsed XPath AST against a generic `DataSourceNode`.

use super::ast::{Axis, BinaryOperator, Expression, LocationPath, NodeTest, NodeTypeTest, Step, UnaryOperator};
use super::{axes, functions, operators};
use crate::datasource::{DataSourceNode, NodeType};
use crate::error::XPathError;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A tree built while transforming rather than selected from the source, such as
/// the content of an XSLT variable.
pub trait TreeFragment: fmt::Debug + Send + Sync {
    fn string_value(&self) -> String;

    fn as_any(&self) -> &dyn Any;
}

/// A shared handle to a [`TreeFragment`]. Two handles are equal when they share
/// the same tree.
#[derive(Debug, Clone)]
pub struct Fragment(pub Arc<dyn TreeFragment>);

impl Fragment {
    pub fn new(tree: impl TreeFragment + 'static) -> Self {
        Fragment(Arc::new(tree))
    }

    /// The tree as its concrete type, if it is one.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref()
    }
}

impl PartialEq for Fragment {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Represents the possible result types of an XPath expression evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum XPathValue<N> {
    NodeSet(Vec<N>),
    String(String),
    Number(f64),
    Boolean(bool),
    /// Converts like a node-set holding one root node: always true, and its
    /// string is the text of the whole tree.
    Fragment(Fragment),
}

impl<'a, N: DataSourceNode<'a>> XPathValue<N> {
    /// Coerces the XPath value to a boolean as per XPath 1.0 rules.
    pub fn to_bool(&self) -> bool {
        match self {
            XPathValue::NodeSet(nodes) => !nodes.is_empty(),
            XPathValue::String(s) => !s.is_empty(),
            XPathValue::Number(n) => *n != 0.0 && !n.is_nan(),
            XPathValue::Boolean(b) => *b,
            XPathValue::Fragment(_) => true,
        }
    }

    /// Coerces the XPath value to a number as per XPath 1.0 rules.
    pub fn to_number(&self) -> f64 {
        match self {
            XPathValue::Number(n) => *n,
            XPathValue::String(s) => parse_number(s),
            XPathValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            XPathValue::NodeSet(nodes) => nodes
                .first()
                .map(|n| parse_number(&n.string_value()))
                .unwrap_or(f64::NAN),
            XPathValue::Fragment(fragment) => parse_number(&fragment.0.string_value()),
        }
    }

    pub fn is_node_set(&self) -> bool {
        matches!(self, XPathValue::NodeSet(_))
    }
}

impl<'a, N: DataSourceNode<'a>> fmt::Display for XPathValue<N> {
    /// Coerces the XPath value to a string as per XPath 1.0 rules.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XPathValue::NodeSet(nodes) => write!(
                f,
                "{}",
                nodes.first().map(|n| n.string_value()).unwrap_or_default()
            ),
            XPathValue::String(s) => write!(f, "{}", s),
            XPathValue::Number(n) => write!(f, "{}", format_number(*n)),
            XPathValue::Boolean(b) => write!(f, "{}", b),
            XPathValue::Fragment(fragment) => write!(f, "{}", fragment.0.string_value()),
        }
    }
}

/// Parses the XPath `Number` production: optional minus, digits, optional fraction.
/// Anything else, including exponents and `inf`, is NaN.
pub fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim();
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let mut seen_dot = false;
    let mut seen_digit = false;
    for c in digits.chars() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => return f64::NAN,
        }
    }
    if !seen_digit {
        return f64::NAN;
    }
    trimmed.parse().unwrap_or(f64::NAN)
}

/// Formats a number the way XPath's `string()` does.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{}Infinity", sign)
    } else if n == 0.0 {
        "0".to_string()
    } else {
        format!("{}", n)
    }
}

/// Key name to key value to the nodes declared under it, in document order.
pub type KeyIndexes<N> = HashMap<String, HashMap<String, Vec<N>>>;

/// A container for all state needed during expression evaluation.
/// `'a` is the lifetime of the underlying data source.
/// `'d` is the lifetime of the evaluation context itself.
pub struct EvaluationContext<'a, 'd, N: DataSourceNode<'a>> {
    pub context_node: N,
    pub root_node: N,
    /// What `current()` returns. Unlike the context node, it does not change
    /// inside predicates.
    pub current_node: N,
    pub context_position: usize, // 1-based index
    pub context_size: usize,
    pub variables: &'d HashMap<String, XPathValue<N>>,
    /// Read-only access to the pre-computed key indexes.
    pub key_indexes: Option<&'d KeyIndexes<N>>,
    /// Unknown variables are errors instead of empty strings.
    pub strict: bool,
    _marker: PhantomData<&'a ()>,
}

impl<'a, 'd, N: DataSourceNode<'a>> EvaluationContext<'a, 'd, N> {
    pub fn new(
        context_node: N,
        root_node: N,
        context_position: usize,
        context_size: usize,
        variables: &'d HashMap<String, XPathValue<N>>,
        strict: bool,
    ) -> Self {
        Self {
            context_node,
            root_node,
            current_node: context_node,
            context_position,
            context_size,
            variables,
            key_indexes: None,
            strict,
            _marker: PhantomData,
        }
    }

    pub fn with_current(mut self, node: N) -> Self {
        self.current_node = node;
        self
    }

    pub fn with_keys(mut self, key_indexes: &'d KeyIndexes<N>) -> Self {
        self.key_indexes = Some(key_indexes);
        self
    }

    /// The same context focused on another node.
    pub fn focus(&self, node: N, position: usize, size: usize) -> Self {
        Self {
            context_node: node,
            root_node: self.root_node,
            current_node: self.current_node,
            context_position: position,
            context_size: size,
            variables: self.variables,
            key_indexes: self.key_indexes,
            strict: self.strict,
            _marker: PhantomData,
        }
    }
}

/// Evaluates a compiled expression and returns a concrete `XPathValue`.
pub fn evaluate<'a, N>(
    expr: &Expression,
    e_ctx: &EvaluationContext<'a, '_, N>,
) -> Result<XPathValue<N>, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    match expr {
        Expression::Literal(s) => Ok(XPathValue::String(s.clone())),
        Expression::Number(n) => Ok(XPathValue::Number(*n)),
        Expression::LocationPath(path) => {
            let nodes = evaluate_location_path(path, e_ctx)?;
            Ok(XPathValue::NodeSet(nodes))
        }
        Expression::Variable(name) => match e_ctx.variables.get(name) {
            Some(value) => Ok(value.clone()),
            None if e_ctx.strict => Err(XPathError::UnknownVariable(name.clone())),
            None => {
                log::debug!("Reference to undeclared variable ${}", name);
                Ok(XPathValue::String(String::new()))
            }
        },
        Expression::FunctionCall { name, args } => {
            let mut evaluated_args = Vec::with_capacity(args.len());
            for arg in args {
                evaluated_args.push(evaluate(arg, e_ctx)?);
            }
            functions::evaluate_function(name, evaluated_args, e_ctx)
        }
        Expression::Filter { base, predicates } => match evaluate(base, e_ctx)? {
            XPathValue::NodeSet(nodes) => {
                Ok(XPathValue::NodeSet(apply_predicates(&nodes, predicates, e_ctx)?))
            }
            other => Err(XPathError::TypeError(format!(
                "predicates can only filter node-sets, got '{}'",
                other
            ))),
        },
        Expression::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => Ok(XPathValue::Boolean(
            evaluate(left, e_ctx)?.to_bool() && evaluate(right, e_ctx)?.to_bool(),
        )),
        Expression::BinaryOp {
            left,
            op: BinaryOperator::Or,
            right,
        } => Ok(XPathValue::Boolean(
            evaluate(left, e_ctx)?.to_bool() || evaluate(right, e_ctx)?.to_bool(),
        )),
        Expression::BinaryOp { left, op, right } => {
            let left_val = evaluate(left, e_ctx)?;
            let right_val = evaluate(right, e_ctx)?;
            operators::evaluate(*op, left_val, right_val)
        }
        Expression::UnaryOp { op, expr } => {
            let val = evaluate(expr, e_ctx)?;
            match op {
                UnaryOperator::Minus => Ok(XPathValue::Number(-val.to_number())),
            }
        }
    }
}

fn evaluate_location_path<'a, N>(
    path: &LocationPath,
    e_ctx: &EvaluationContext<'a, '_, N>,
) -> Result<Vec<N>, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    let mut current_nodes = if let Some(start_expr) = &path.start_point {
        match evaluate(start_expr, e_ctx)? {
            XPathValue::NodeSet(nodes) => nodes,
            // Paths from strings or numbers select nothing.
            _ => return Ok(vec![]),
        }
    } else if path.is_absolute {
        vec![e_ctx.root_node]
    } else {
        vec![e_ctx.context_node]
    };

    for step in &path.steps {
        let mut next = Vec::new();
        for &node in &current_nodes {
            next.extend(evaluate_step(step, node, e_ctx)?);
        }
        sort_document_order(&mut next);
        current_nodes = next;
    }
    Ok(current_nodes)
}

/// Applies one step to a single context node. The result is in axis order, so
/// reverse axes come back nearest-first.
pub fn evaluate_step<'a, N>(
    step: &Step,
    context: N,
    e_ctx: &EvaluationContext<'a, '_, N>,
) -> Result<Vec<N>, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    let tested: Vec<N> = axes::collect(step.axis, context)
        .into_iter()
        .filter(|node| node_test_matches(*node, &step.node_test, step.axis))
        .collect();
    apply_predicates(&tested, &step.predicates, e_ctx)
}

/// Whether a node passes a node test. Name tests and `*` only select the
/// principal node type of the axis.
pub fn node_test_matches<'a, N: DataSourceNode<'a>>(node: N, test: &NodeTest, axis: Axis) -> bool {
    let principal = if axis == Axis::Attribute {
        NodeType::Attribute
    } else {
        NodeType::Element
    };
    match test {
        NodeTest::Wildcard => node.node_type() == principal,
        NodeTest::PrefixWildcard(prefix) => {
            node.node_type() == principal
                && node.name().is_some_and(|q| q.prefix == Some(prefix.as_str()))
        }
        NodeTest::Name(name) => {
            node.node_type() == principal && node.name().is_some_and(|q| q.matches_test(name))
        }
        NodeTest::NodeType(ntt) => match ntt {
            NodeTypeTest::Text => node.node_type() == NodeType::Text,
            NodeTypeTest::Comment => node.node_type() == NodeType::Comment,
            NodeTypeTest::ProcessingInstruction => {
                node.node_type() == NodeType::ProcessingInstruction
            }
            NodeTypeTest::Node => true,
        },
    }
}

/// Filters nodes through each predicate in turn; positions follow the order of `nodes`.
fn apply_predicates<'a, N>(
    nodes: &[N],
    predicates: &[Expression],
    e_ctx: &EvaluationContext<'a, '_, N>,
) -> Result<Vec<N>, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    let mut final_nodes = nodes.to_vec();
    for predicate in predicates {
        let context_size = final_nodes.len();
        let mut kept = Vec::with_capacity(context_size);
        for (i, node) in final_nodes.iter().enumerate() {
            let predicate_ctx = e_ctx.focus(*node, i + 1, context_size);
            let keep = match evaluate(predicate, &predicate_ctx)? {
                XPathValue::Number(n) => n == (i + 1) as f64,
                other => other.to_bool(),
            };
            if keep {
                kept.push(*node);
            }
        }
        final_nodes = kept;
    }
    Ok(final_nodes)
}

pub(crate) fn sort_document_order<'a, N: DataSourceNode<'a>>(nodes: &mut Vec<N>) {
    nodes.sort();
    nodes.dedup();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::mock::{MockNode, MockTree, menu_tree};
    use crate::parser::parse_expression;

    fn eval<'a>(
        tree: &'a MockTree,
        vars: &HashMap<String, XPathValue<MockNode<'a>>>,
        xpath: &str,
    ) -> XPathValue<MockNode<'a>> {
        let root = tree.node(0);
        let e_ctx = EvaluationContext::new(root, root, 1, 1, vars, false);
        let expr = parse_expression(xpath).unwrap();
        evaluate(&expr, &e_ctx).unwrap()
    }

    fn node_ids(value: XPathValue<MockNode<'_>>) -> Vec<usize> {
        match value {
            XPathValue::NodeSet(nodes) => nodes.iter().map(|n| n.id).collect(),
            other => panic!("Expected a NodeSet, got {:?}", other),
        }
    }

    #[test]
    fn test_predicate_by_attribute() {
        let tree = menu_tree();
        let vars = HashMap::new();
        assert_eq!(node_ids(eval(&tree, &vars, "menu/item[@id='b']")), vec![6]);
    }

    #[test]
    fn test_predicate_by_position() {
        let tree = menu_tree();
        let vars = HashMap::new();
        assert_eq!(node_ids(eval(&tree, &vars, "menu/item[1]")), vec![3]);
        assert_eq!(node_ids(eval(&tree, &vars, "menu/item[last()]")), vec![6]);
        assert_eq!(node_ids(eval(&tree, &vars, "menu/*[position() = 3]")), vec![9]);
    }

    #[test]
    fn test_reverse_axis_positions_are_nearest_first() {
        let tree = menu_tree();
        let vars = HashMap::new();
        let note = tree.node(9);
        let e_ctx = EvaluationContext::new(note, tree.node(0), 1, 1, &vars, false);
        let expr = parse_expression("preceding-sibling::item[1]").unwrap();
        assert_eq!(node_ids(evaluate(&expr, &e_ctx).unwrap()), vec![6]);
    }

    #[test]
    fn test_results_are_in_document_order_without_duplicates() {
        let tree = menu_tree();
        let vars = HashMap::new();
        assert_eq!(
            node_ids(eval(&tree, &vars, "//text() | menu/item/text()")),
            vec![5, 8, 10]
        );
        assert_eq!(node_ids(eval(&tree, &vars, "//item/..")), vec![1]);
    }

    #[test]
    fn test_variable_evaluation() {
        let tree = menu_tree();
        let mut vars = HashMap::new();
        vars.insert("title".to_string(), XPathValue::String("Start".to_string()));
        vars.insert("items".to_string(), XPathValue::NodeSet(vec![tree.node(3), tree.node(6)]));

        assert_eq!(eval(&tree, &vars, "$title").to_string(), "Start");
        assert_eq!(node_ids(eval(&tree, &vars, "$items[2]")), vec![6]);
        assert_eq!(node_ids(eval(&tree, &vars, "$items/text()")), vec![5, 8]);
        assert_eq!(eval(&tree, &vars, "$missing").to_string(), "");
    }

    #[test]
    fn test_strict_mode_rejects_unknown_variables() {
        let tree = menu_tree();
        let vars = HashMap::new();
        let root = tree.node(0);
        let e_ctx = EvaluationContext::new(root, root, 1, 1, &vars, true);
        let expr = parse_expression("$missing").unwrap();
        assert_eq!(
            evaluate(&expr, &e_ctx),
            Err(XPathError::UnknownVariable("missing".into()))
        );
    }

    #[test]
    fn test_boolean_operators_short_circuit() {
        let tree = menu_tree();
        let vars = HashMap::new();
        let root = tree.node(0);
        let e_ctx = EvaluationContext::new(root, root, 1, 1, &vars, true);
        // The right operand would fail in strict mode if it were evaluated.
        let expr = parse_expression("false() and $missing").unwrap();
        assert_eq!(evaluate(&expr, &e_ctx), Ok(XPathValue::Boolean(false)));
        let expr = parse_expression("true() or $missing").unwrap();
        assert_eq!(evaluate(&expr, &e_ctx), Ok(XPathValue::Boolean(true)));
    }

    #[test]
    fn test_number_conversion_and_formatting() {
        assert_eq!(parse_number(" 12.5 "), 12.5);
        assert_eq!(parse_number("-3"), -3.0);
        assert!(parse_number("1e3").is_nan());
        assert!(parse_number("inf").is_nan());
        assert!(parse_number("").is_nan());
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(0.25), "0.25");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[derive(Debug)]
    struct TextFragment(&'static str);

    impl TreeFragment for TextFragment {
        fn string_value(&self) -> String {
            self.0.to_string()
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_fragment_variables_convert_like_a_root_node() {
        let tree = menu_tree();
        let mut vars = HashMap::new();
        let fragment = Fragment::new(TextFragment("12"));
        vars.insert("frag".to_string(), XPathValue::Fragment(fragment.clone()));
        vars.insert("blank".to_string(), XPathValue::Fragment(Fragment::new(TextFragment(""))));

        assert_eq!(eval(&tree, &vars, "$frag").to_string(), "12");
        assert_eq!(eval(&tree, &vars, "$frag + 1").to_number(), 13.0);
        assert_eq!(eval(&tree, &vars, "$frag = '12'"), XPathValue::Boolean(true));
        assert_eq!(eval(&tree, &vars, "boolean($blank)"), XPathValue::Boolean(true));
        assert_eq!(eval(&tree, &vars, "concat($frag, '!')").to_string(), "12!");
        assert_eq!(eval(&tree, &vars, "$frag"), XPathValue::Fragment(fragment));
        assert!(fragment_ref(&eval(&tree, &vars, "$frag")).is_some());
    }

    fn fragment_ref<N>(value: &XPathValue<N>) -> Option<&TextFragment> {
        match value {
            XPathValue::Fragment(fragment) => fragment.downcast_ref::<TextFragment>(),
            _ => None,
        }
    }
}
