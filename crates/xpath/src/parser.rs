//! A `nom`-based parser for the XPath 1.0 expression language.

use super::ast::*;
use crate::error::XPathError;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, multispace0},
    combinator::{map, opt, peek, recognize},
    multi::{many0, separated_list0},
    number::complete::double,
    sequence::{delimited, pair, preceded, terminated},
};

type Operand = fn(&str) -> IResult<&str, Expression>;
type Operator = fn(&str) -> IResult<&str, BinaryOperator>;

pub fn parse_expression(input: &str) -> Result<Expression, XPathError> {
    match expression(input.trim()) {
        Ok((rest, expr)) if rest.trim().is_empty() => Ok(expr),
        Ok((rest, _)) => Err(XPathError::XPathParse(
            input.to_string(),
            format!("unexpected input at '{}'", rest),
        )),
        Err(e) => Err(XPathError::XPathParse(input.to_string(), e.to_string())),
    }
}

fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: nom::error::ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

/// Parses `operand (operator operand)*` into a left-associative tree. A trailing
/// operator without an operand is left unconsumed.
fn binary_chain(input: &str, operand: Operand, operator: Operator) -> IResult<&str, Expression> {
    let (mut rest, mut left) = operand(input)?;
    loop {
        let (after_op, op) = match ws(operator).parse(rest) {
            Ok(ok) => ok,
            Err(nom::Err::Error(_)) => return Ok((rest, left)),
            Err(e) => return Err(e),
        };
        let (after_operand, right) = match operand(after_op) {
            Ok(ok) => ok,
            Err(nom::Err::Error(_)) => return Ok((rest, left)),
            Err(e) => return Err(e),
        };
        left = Expression::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        };
        rest = after_operand;
    }
}

// --- Expressions, lowest precedence first ---

fn expression(input: &str) -> IResult<&str, Expression> {
    binary_chain(input, and_expr, or_op)
}

fn and_expr(input: &str) -> IResult<&str, Expression> {
    binary_chain(input, equality_expr, and_op)
}

fn equality_expr(input: &str) -> IResult<&str, Expression> {
    binary_chain(input, relational_expr, equality_op)
}

fn relational_expr(input: &str) -> IResult<&str, Expression> {
    binary_chain(input, additive_expr, relational_op)
}

fn additive_expr(input: &str) -> IResult<&str, Expression> {
    binary_chain(input, multiplicative_expr, additive_op)
}

fn multiplicative_expr(input: &str) -> IResult<&str, Expression> {
    binary_chain(input, unary_expr, multiplicative_op)
}

fn unary_expr(input: &str) -> IResult<&str, Expression> {
    let (i, negated) = opt(negation).parse(input)?;
    if negated.is_some() {
        let (i, expr) = unary_expr(i)?;
        return Ok((
            i,
            Expression::UnaryOp {
                op: UnaryOperator::Minus,
                expr: Box::new(expr),
            },
        ));
    }
    union_expr(i)
}

fn union_expr(input: &str) -> IResult<&str, Expression> {
    binary_chain(input, path_expr, union_op)
}

fn negation(input: &str) -> IResult<&str, char> {
    ws(char('-')).parse(input)
}

fn open_paren(input: &str) -> IResult<&str, char> {
    ws(char('(')).parse(input)
}

// --- Operators ---

fn or_op(input: &str) -> IResult<&str, BinaryOperator> {
    map(keyword("or"), |_| BinaryOperator::Or).parse(input)
}

fn and_op(input: &str) -> IResult<&str, BinaryOperator> {
    map(keyword("and"), |_| BinaryOperator::And).parse(input)
}

fn equality_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        map(tag("="), |_| BinaryOperator::Equals),
        map(tag("!="), |_| BinaryOperator::NotEquals),
    ))
    .parse(input)
}

fn relational_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        map(tag("<="), |_| BinaryOperator::LessThanOrEqual),
        map(tag("&lt;="), |_| BinaryOperator::LessThanOrEqual),
        map(tag(">="), |_| BinaryOperator::GreaterThanOrEqual),
        map(tag("&gt;="), |_| BinaryOperator::GreaterThanOrEqual),
        map(tag("<"), |_| BinaryOperator::LessThan),
        map(tag("&lt;"), |_| BinaryOperator::LessThan),
        map(tag(">"), |_| BinaryOperator::GreaterThan),
        map(tag("&gt;"), |_| BinaryOperator::GreaterThan),
    ))
    .parse(input)
}

fn additive_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        map(char('+'), |_| BinaryOperator::Plus),
        map(char('-'), |_| BinaryOperator::Minus),
    ))
    .parse(input)
}

fn multiplicative_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        map(char('*'), |_| BinaryOperator::Multiply),
        map(keyword("div"), |_| BinaryOperator::Divide),
        map(keyword("mod"), |_| BinaryOperator::Modulo),
    ))
    .parse(input)
}

fn union_op(input: &str) -> IResult<&str, BinaryOperator> {
    map(char('|'), |_| BinaryOperator::Union).parse(input)
}

/// An operator name that is not the prefix of a longer name (`or` but not `order`).
fn keyword<'a>(word: &'static str) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    terminated(
        tag(word),
        peek(nom::combinator::not(take_while1(is_name_char))),
    )
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
}

// --- Paths ---

/// A filter expression (primary plus predicates) or a location path, optionally
/// continued by further steps.
fn path_expr(input: &str) -> IResult<&str, Expression> {
    let (i, start) = alt((filter_expr, map(location_path, Expression::LocationPath))).parse(input)?;
    let (i, more) = many0(pair(path_separator, step)).parse(i)?;
    if more.is_empty() {
        return Ok((i, start));
    }

    let (start_point, is_absolute, mut steps) = match start {
        Expression::LocationPath(lp) => (lp.start_point, lp.is_absolute, lp.steps),
        other => (Some(Box::new(other)), false, vec![]),
    };
    append_steps(&mut steps, more);
    Ok((
        i,
        Expression::LocationPath(LocationPath {
            start_point,
            is_absolute,
            steps,
        }),
    ))
}

fn filter_expr(input: &str) -> IResult<&str, Expression> {
    let (i, base) = primary_expr(input)?;
    let (i, predicates) = many0(predicate).parse(i)?;
    if predicates.is_empty() {
        Ok((i, base))
    } else {
        Ok((
            i,
            Expression::Filter {
                base: Box::new(base),
                predicates,
            },
        ))
    }
}

fn primary_expr(input: &str) -> IResult<&str, Expression> {
    ws(alt((
        variable_reference,
        map(number, Expression::Number),
        map(string_literal, Expression::Literal),
        function_call,
        delimited(ws(char('(')), expression, ws(char(')'))),
    )))
    .parse(input)
}

fn path_separator(input: &str) -> IResult<&str, &str> {
    alt((tag("//"), tag("/"))).parse(input)
}

fn double_slash(input: &str) -> IResult<&str, &str> {
    tag("//").parse(input)
}

fn single_slash(input: &str) -> IResult<&str, char> {
    char('/').parse(input)
}

fn append_steps(steps: &mut Vec<Step>, more: Vec<(&str, Step)>) {
    for (separator, next) in more {
        if separator == "//" {
            steps.push(Step::descendant_or_self());
        }
        steps.push(next);
    }
}

fn location_path(input: &str) -> IResult<&str, LocationPath> {
    let (i, is_absolute, mut steps) = if let Ok((rest, _)) = double_slash(input) {
        let (rest, first) = step(rest)?;
        (rest, true, vec![Step::descendant_or_self(), first])
    } else if let Ok((rest, _)) = single_slash(input) {
        match step(rest) {
            Ok((rest, first)) => (rest, true, vec![first]),
            // A bare "/" selects the root.
            Err(_) => (rest, true, vec![]),
        }
    } else {
        let (rest, first) = step(input)?;
        (rest, false, vec![first])
    };

    let (i, more) = many0(pair(path_separator, step)).parse(i)?;
    append_steps(&mut steps, more);
    Ok((
        i,
        LocationPath {
            start_point: None,
            is_absolute,
            steps,
        },
    ))
}

fn step(input: &str) -> IResult<&str, Step> {
    let (i, (axis, node_test)) = alt((
        map(tag(".."), |_| (Axis::Parent, NodeTest::NodeType(NodeTypeTest::Node))),
        map(tag("."), |_| (Axis::SelfAxis, NodeTest::NodeType(NodeTypeTest::Node))),
        map(preceded(char('@'), node_test), |nt| (Axis::Attribute, nt)),
        map(pair(opt(axis), node_test), |(ax, nt)| (ax.unwrap_or(Axis::Child), nt)),
    ))
    .parse(input)?;
    let (i, predicates) = many0(predicate).parse(i)?;
    Ok((
        i,
        Step {
            axis,
            node_test,
            predicates,
        },
    ))
}

fn predicate(input: &str) -> IResult<&str, Expression> {
    delimited(ws(char('[')), expression, ws(char(']'))).parse(input)
}

fn axis(input: &str) -> IResult<&str, Axis> {
    terminated(
        alt((
            map(tag("child"), |_| Axis::Child),
            map(tag("descendant-or-self"), |_| Axis::DescendantOrSelf),
            map(tag("descendant"), |_| Axis::Descendant),
            map(tag("attribute"), |_| Axis::Attribute),
            map(tag("parent"), |_| Axis::Parent),
            map(tag("ancestor-or-self"), |_| Axis::AncestorOrSelf),
            map(tag("ancestor"), |_| Axis::Ancestor),
            map(tag("self"), |_| Axis::SelfAxis),
            map(tag("following-sibling"), |_| Axis::FollowingSibling),
            map(tag("preceding-sibling"), |_| Axis::PrecedingSibling),
            map(tag("following"), |_| Axis::Following),
            map(tag("preceding"), |_| Axis::Preceding),
        )),
        tag("::"),
    )
    .parse(input)
}

pub fn node_test(input: &str) -> IResult<&str, NodeTest> {
    alt((
        map(terminated(nc_name, tag(":*")), |prefix: &str| {
            NodeTest::PrefixWildcard(prefix.to_string())
        }),
        map(tag("*"), |_| NodeTest::Wildcard),
        node_type_test,
        map(q_name, NodeTest::Name),
    ))
    .parse(input)
}

fn node_type_test(input: &str) -> IResult<&str, NodeTest> {
    map(
        terminated(
            alt((
                tag("text"),
                tag("node"),
                tag("comment"),
                tag("processing-instruction"),
            )),
            pair(ws(char('(')), char(')')),
        ),
        |kind: &str| match kind {
            "text" => NodeTest::NodeType(NodeTypeTest::Text),
            "comment" => NodeTest::NodeType(NodeTypeTest::Comment),
            "processing-instruction" => NodeTest::NodeType(NodeTypeTest::ProcessingInstruction),
            _ => NodeTest::NodeType(NodeTypeTest::Node),
        },
    )
    .parse(input)
}

// --- Lexical pieces ---

/// XPath numbers are unsigned and have no exponent or `NaN`/`Infinity`
/// spellings, so `double` only runs once a digit or `.digit` starts the input.
fn number(input: &str) -> IResult<&str, f64> {
    preceded(peek(alt((digit1, recognize(pair(char('.'), digit1))))), double).parse(input)
}

fn string_literal(input: &str) -> IResult<&str, String> {
    map(
        alt((
            delimited(char('\''), take_while(|c| c != '\''), char('\'')),
            delimited(char('"'), take_while(|c| c != '"'), char('"')),
        )),
        |s: &str| s.to_string(),
    )
    .parse(input)
}

fn variable_reference(input: &str) -> IResult<&str, Expression> {
    map(preceded(char('$'), q_name), Expression::Variable).parse(input)
}

fn nc_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(is_name_char),
    ))
    .parse(input)
}

fn q_name(input: &str) -> IResult<&str, String> {
    map(recognize(pair(nc_name, opt(pair(char(':'), nc_name)))), |s: &str| {
        s.to_string()
    })
    .parse(input)
}

fn function_call(input: &str) -> IResult<&str, Expression> {
    let (i, name) = q_name(input)?;
    let (i, _) = peek(open_paren).parse(i)?;

    // Node-type tests look like calls but belong to the step grammar.
    if matches!(
        name.as_str(),
        "text" | "node" | "comment" | "processing-instruction"
    ) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        )));
    }

    let (i, args) = delimited(
        ws(char('(')),
        separated_list0(ws(char(',')), expression),
        ws(char(')')),
    )
    .parse(i)?;
    Ok((i, Expression::FunctionCall { name, args }))
}
