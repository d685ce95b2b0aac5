//! Comparison, arithmetic and union operators with XPath 1.0 coercion rules.

use crate::ast::BinaryOperator;
use crate::datasource::DataSourceNode;
use crate::engine::{XPathValue, parse_number, sort_document_order};
use crate::error::XPathError;

pub fn evaluate<'a, N: DataSourceNode<'a>>(
    op: BinaryOperator,
    left: XPathValue<N>,
    right: XPathValue<N>,
) -> Result<XPathValue<N>, XPathError> {
    match op {
        BinaryOperator::Or => Ok(XPathValue::Boolean(left.to_bool() || right.to_bool())),
        BinaryOperator::And => Ok(XPathValue::Boolean(left.to_bool() && right.to_bool())),
        BinaryOperator::Equals
        | BinaryOperator::NotEquals
        | BinaryOperator::LessThan
        | BinaryOperator::LessThanOrEqual
        | BinaryOperator::GreaterThan
        | BinaryOperator::GreaterThanOrEqual => Ok(XPathValue::Boolean(compare(op, &left, &right))),
        BinaryOperator::Plus => arithmetic(left, right, |a, b| a + b),
        BinaryOperator::Minus => arithmetic(left, right, |a, b| a - b),
        BinaryOperator::Multiply => arithmetic(left, right, |a, b| a * b),
        BinaryOperator::Divide => arithmetic(left, right, |a, b| a / b),
        BinaryOperator::Modulo => arithmetic(left, right, |a, b| a % b),
        BinaryOperator::Union => union(left, right),
    }
}

fn arithmetic<'a, N: DataSourceNode<'a>>(
    left: XPathValue<N>,
    right: XPathValue<N>,
    f: impl Fn(f64, f64) -> f64,
) -> Result<XPathValue<N>, XPathError> {
    Ok(XPathValue::Number(f(left.to_number(), right.to_number())))
}

fn union<'a, N: DataSourceNode<'a>>(
    left: XPathValue<N>,
    right: XPathValue<N>,
) -> Result<XPathValue<N>, XPathError> {
    match (left, right) {
        (XPathValue::NodeSet(mut a), XPathValue::NodeSet(b)) => {
            a.extend(b);
            sort_document_order(&mut a);
            Ok(XPathValue::NodeSet(a))
        }
        _ => Err(XPathError::TypeError(
            "the union operator requires node-sets on both sides".to_string(),
        )),
    }
}

/// The primitive value a comparison operand reduces to.
#[derive(Debug, Clone, PartialEq)]
enum Atom {
    Str(String),
    Num(f64),
    Bool(bool),
}

fn atom<'a, N: DataSourceNode<'a>>(value: &XPathValue<N>) -> Atom {
    match value {
        XPathValue::Boolean(b) => Atom::Bool(*b),
        XPathValue::Number(n) => Atom::Num(*n),
        other => Atom::Str(other.to_string()),
    }
}

fn is_equality(op: BinaryOperator) -> bool {
    matches!(op, BinaryOperator::Equals | BinaryOperator::NotEquals)
}

/// Compares two values. Node-sets compare existentially: the comparison holds if
/// it holds for any member.
fn compare<'a, N: DataSourceNode<'a>>(op: BinaryOperator, left: &XPathValue<N>, right: &XPathValue<N>) -> bool {
    match (left, right) {
        (XPathValue::NodeSet(a), XPathValue::NodeSet(b)) => a.iter().any(|x| {
            let xs = x.string_value();
            b.iter()
                .any(|y| compare_atoms(op, &Atom::Str(xs.clone()), &Atom::Str(y.string_value())))
        }),
        (XPathValue::NodeSet(nodes), other) => compare_node_set(op, nodes, other, false),
        (other, XPathValue::NodeSet(nodes)) => compare_node_set(op, nodes, other, true),
        _ => compare_atoms(op, &atom(left), &atom(right)),
    }
}

fn compare_node_set<'a, N: DataSourceNode<'a>>(
    op: BinaryOperator,
    nodes: &[N],
    other: &XPathValue<N>,
    swapped: bool,
) -> bool {
    let ordered = |a: Atom, b: Atom| {
        if swapped {
            compare_atoms(op, &b, &a)
        } else {
            compare_atoms(op, &a, &b)
        }
    };
    match other {
        XPathValue::Boolean(b) => ordered(Atom::Bool(!nodes.is_empty()), Atom::Bool(*b)),
        XPathValue::Number(n) => nodes
            .iter()
            .any(|node| ordered(Atom::Num(parse_number(&node.string_value())), Atom::Num(*n))),
        XPathValue::String(s) => nodes
            .iter()
            .any(|node| ordered(Atom::Str(node.string_value()), Atom::Str(s.clone()))),
        XPathValue::Fragment(fragment) => {
            let s = fragment.0.string_value();
            nodes
                .iter()
                .any(|node| ordered(Atom::Str(node.string_value()), Atom::Str(s.clone())))
        }
        XPathValue::NodeSet(_) => false,
    }
}

fn to_num(atom: &Atom) -> f64 {
    match atom {
        Atom::Num(n) => *n,
        Atom::Bool(true) => 1.0,
        Atom::Bool(false) => 0.0,
        Atom::Str(s) => parse_number(s),
    }
}

fn to_bool(atom: &Atom) -> bool {
    match atom {
        Atom::Bool(b) => *b,
        Atom::Num(n) => *n != 0.0 && !n.is_nan(),
        Atom::Str(s) => !s.is_empty(),
    }
}

fn compare_atoms(op: BinaryOperator, left: &Atom, right: &Atom) -> bool {
    if is_equality(op) {
        let equal = match (left, right) {
            (Atom::Bool(_), _) | (_, Atom::Bool(_)) => to_bool(left) == to_bool(right),
            (Atom::Num(_), _) | (_, Atom::Num(_)) => to_num(left) == to_num(right),
            (Atom::Str(a), Atom::Str(b)) => a == b,
        };
        return if op == BinaryOperator::Equals { equal } else { !equal };
    }

    let (a, b) = (to_num(left), to_num(right));
    match op {
        BinaryOperator::LessThan => a < b,
        BinaryOperator::LessThanOrEqual => a <= b,
        BinaryOperator::GreaterThan => a > b,
        BinaryOperator::GreaterThanOrEqual => a >= b,
        _ => false,
    }
}
