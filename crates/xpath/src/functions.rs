//! Built-in implementations of the XPath 1.0 core function library.

use super::engine::{EvaluationContext, XPathValue, parse_number};
use crate::datasource::{DataSourceNode, NodeType};
use crate::error::XPathError;
use std::collections::HashSet;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Dispatches a function call to the correct implementation.
pub fn evaluate_function<'a, 'd, N: DataSourceNode<'a>>(
    name: &str,
    args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<'a, 'd, N>,
) -> Result<XPathValue<N>, XPathError> {
    match name {
        // Node-set
        "last" => {
            arity(name, &args, 0, 0)?;
            Ok(XPathValue::Number(e_ctx.context_size as f64))
        }
        "position" => {
            arity(name, &args, 0, 0)?;
            Ok(XPathValue::Number(e_ctx.context_position as f64))
        }
        "count" => {
            arity(name, &args, 1, 1)?;
            Ok(XPathValue::Number(node_set(name, &args[0])?.len() as f64))
        }
        "local-name" => func_name(name, args, e_ctx, |q| q.local_part.to_string()),
        "name" => func_name(name, args, e_ctx, |q| q.to_string()),

        // XSLT additions
        "current" => {
            arity(name, &args, 0, 0)?;
            Ok(XPathValue::NodeSet(vec![e_ctx.current_node]))
        }
        "key" => func_key(name, args, e_ctx),
        "generate-id" => func_generate_id(name, args, e_ctx),
        "format-number" => func_format_number(name, args),

        // String
        "string" => {
            arity(name, &args, 0, 1)?;
            Ok(XPathValue::String(string_arg(args, 0, e_ctx)))
        }
        "concat" => {
            if args.len() < 2 {
                return Err(XPathError::function(name, "expected at least 2 arguments"));
            }
            Ok(XPathValue::String(args.iter().map(|a| a.to_string()).collect()))
        }
        "starts-with" => two_strings(name, args, |a, b| XPathValue::Boolean(a.starts_with(b))),
        "contains" => two_strings(name, args, |a, b| XPathValue::Boolean(a.contains(b))),
        "substring-before" => two_strings(name, args, |a, b| {
            XPathValue::String(a.find(b).map(|i| a[..i].to_string()).unwrap_or_default())
        }),
        "substring-after" => two_strings(name, args, |a, b| {
            XPathValue::String(
                a.find(b)
                    .map(|i| a[i + b.len()..].to_string())
                    .unwrap_or_default(),
            )
        }),
        "substring" => func_substring(name, args),
        "string-length" => {
            arity(name, &args, 0, 1)?;
            let s = string_arg(args, 0, e_ctx);
            Ok(XPathValue::Number(s.chars().count() as f64))
        }
        "normalize-space" => {
            arity(name, &args, 0, 1)?;
            let s = string_arg(args, 0, e_ctx);
            Ok(XPathValue::String(
                s.split_whitespace().collect::<Vec<_>>().join(" "),
            ))
        }
        "translate" => func_translate(name, args),

        // Boolean
        "boolean" => {
            arity(name, &args, 1, 1)?;
            Ok(XPathValue::Boolean(args[0].to_bool()))
        }
        "not" => {
            arity(name, &args, 1, 1)?;
            Ok(XPathValue::Boolean(!args[0].to_bool()))
        }
        "true" => {
            arity(name, &args, 0, 0)?;
            Ok(XPathValue::Boolean(true))
        }
        "false" => {
            arity(name, &args, 0, 0)?;
            Ok(XPathValue::Boolean(false))
        }
        "lang" => func_lang(name, args, e_ctx),

        // Number
        "number" => {
            arity(name, &args, 0, 1)?;
            let value = match args.into_iter().next() {
                Some(arg) => arg.to_number(),
                None => XPathValue::NodeSet(vec![e_ctx.context_node]).to_number(),
            };
            Ok(XPathValue::Number(value))
        }
        "sum" => {
            arity(name, &args, 1, 1)?;
            let total = node_set(name, &args[0])?
                .iter()
                .map(|n| parse_number(&n.string_value()))
                .sum();
            Ok(XPathValue::Number(total))
        }
        "floor" => number_fn(name, args, f64::floor),
        "ceiling" => number_fn(name, args, f64::ceil),
        "round" => number_fn(name, args, round),

        _ => Err(XPathError::function(name, "unknown XPath function")),
    }
}

fn arity<N>(name: &str, args: &[XPathValue<N>], min: usize, max: usize) -> Result<(), XPathError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("{}", min)
        } else {
            format!("{} to {}", min, max)
        };
        return Err(XPathError::function(
            name,
            format!("expected {} arguments, got {}", expected, args.len()),
        ));
    }
    Ok(())
}

fn node_set<'v, N>(name: &str, value: &'v XPathValue<N>) -> Result<&'v [N], XPathError> {
    match value {
        XPathValue::NodeSet(nodes) => Ok(nodes),
        _ => Err(XPathError::function(name, "argument must be a node-set")),
    }
}

/// The string value of argument `index`, or of the context node when it is absent.
fn string_arg<'a, N: DataSourceNode<'a>>(
    args: Vec<XPathValue<N>>,
    index: usize,
    e_ctx: &EvaluationContext<'a, '_, N>,
) -> String {
    match args.into_iter().nth(index) {
        Some(arg) => arg.to_string(),
        None => e_ctx.context_node.string_value(),
    }
}

fn two_strings<'a, N: DataSourceNode<'a>>(
    name: &str,
    args: Vec<XPathValue<N>>,
    f: impl Fn(&str, &str) -> XPathValue<N>,
) -> Result<XPathValue<N>, XPathError> {
    arity(name, &args, 2, 2)?;
    Ok(f(&args[0].to_string(), &args[1].to_string()))
}

fn number_fn<'a, N: DataSourceNode<'a>>(
    name: &str,
    args: Vec<XPathValue<N>>,
    f: impl Fn(f64) -> f64,
) -> Result<XPathValue<N>, XPathError> {
    arity(name, &args, 1, 1)?;
    Ok(XPathValue::Number(f(args[0].to_number())))
}

/// Rounds half up, keeping NaN and infinities.
fn round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() {
        n
    } else {
        (n + 0.5).floor()
    }
}

fn func_name<'a, 'd, N: DataSourceNode<'a>>(
    name: &str,
    args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<'a, 'd, N>,
    render: impl Fn(crate::datasource::QName<'a>) -> String,
) -> Result<XPathValue<N>, XPathError> {
    arity(name, &args, 0, 1)?;
    let node = match args.first() {
        Some(arg) => node_set(name, arg)?.first().copied(),
        None => Some(e_ctx.context_node),
    };
    let rendered = node.and_then(|n| n.name()).map(render).unwrap_or_default();
    Ok(XPathValue::String(rendered))
}

fn func_substring<'a, N: DataSourceNode<'a>>(
    name: &str,
    args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    arity(name, &args, 2, 3)?;
    let s = args[0].to_string();
    let start = round(args[1].to_number());
    let end = match args.get(2) {
        Some(len) => start + round(len.to_number()),
        None => f64::INFINITY,
    };
    let result = s
        .chars()
        .enumerate()
        .filter(|(i, _)| {
            let position = (*i + 1) as f64;
            position >= start && position < end
        })
        .map(|(_, c)| c)
        .collect();
    Ok(XPathValue::String(result))
}

fn func_translate<'a, N: DataSourceNode<'a>>(
    name: &str,
    args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    arity(name, &args, 3, 3)?;
    let source = args[0].to_string();
    let from: Vec<char> = args[1].to_string().chars().collect();
    let to: Vec<char> = args[2].to_string().chars().collect();
    let result = source
        .chars()
        .filter_map(|c| match from.iter().position(|&f| f == c) {
            Some(i) => to.get(i).copied(),
            None => Some(c),
        })
        .collect();
    Ok(XPathValue::String(result))
}

/// `lang()` looks up the nearest `xml:lang` and compares it case-insensitively,
/// ignoring any sub-tag suffix.
fn func_lang<'a, 'd, N: DataSourceNode<'a>>(
    name: &str,
    args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<'a, 'd, N>,
) -> Result<XPathValue<N>, XPathError> {
    arity(name, &args, 1, 1)?;
    let wanted = args[0].to_string().to_lowercase();
    let mut current = Some(e_ctx.context_node);
    while let Some(node) = current {
        if node.node_type() == NodeType::Element {
            let declared = node.attributes().find(|a| {
                a.name()
                    .is_some_and(|q| q.prefix == Some("xml") && q.local_part == "lang")
            });
            if let Some(attr) = declared {
                let lang = attr.string_value().to_lowercase();
                let matches = lang == wanted
                    || lang
                        .strip_prefix(wanted.as_str())
                        .is_some_and(|rest| rest.starts_with('-'));
                return Ok(XPathValue::Boolean(matches));
            }
        }
        current = node.parent();
    }
    Ok(XPathValue::Boolean(false))
}

/// Looks `value` up in the named key. A node-set value looks up the string value
/// of each of its nodes.
fn func_key<'a, 'd, N: DataSourceNode<'a>>(
    name: &str,
    args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<'a, 'd, N>,
) -> Result<XPathValue<N>, XPathError> {
    arity(name, &args, 2, 2)?;
    let mut args = args.into_iter();
    let key_name = args.next().map(|a| a.to_string()).unwrap_or_default();
    let Some(index) = e_ctx.key_indexes.and_then(|keys| keys.get(&key_name)) else {
        log::debug!("key(): no key named '{}'", key_name);
        return Ok(XPathValue::NodeSet(vec![]));
    };

    let values = match args.next() {
        Some(XPathValue::NodeSet(nodes)) => nodes.iter().map(|n| n.string_value()).collect(),
        Some(other) => vec![other.to_string()],
        None => vec![],
    };

    let mut seen = HashSet::new();
    let mut result: Vec<N> = values
        .iter()
        .filter_map(|value| index.get(value))
        .flatten()
        .copied()
        .filter(|node| seen.insert(*node))
        .collect();
    result.sort();
    Ok(XPathValue::NodeSet(result))
}

/// An identifier that is stable for a node within one transformation and is a
/// valid XML name.
fn func_generate_id<'a, 'd, N: DataSourceNode<'a>>(
    name: &str,
    args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<'a, 'd, N>,
) -> Result<XPathValue<N>, XPathError> {
    arity(name, &args, 0, 1)?;
    let node = match args.first() {
        Some(arg) => node_set(name, arg)?.iter().min().copied(),
        None => Some(e_ctx.context_node),
    };
    let id = node
        .map(|node| {
            let mut hasher = DefaultHasher::new();
            node.hash(&mut hasher);
            format!("id{}", hasher.finish())
        })
        .unwrap_or_default();
    Ok(XPathValue::String(id))
}

fn func_format_number<'a, N: DataSourceNode<'a>>(
    name: &str,
    args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    arity(name, &args, 2, 3)?;
    if args.len() == 3 {
        log::warn!("format-number(): named decimal formats are not supported, using the default");
    }
    let formatted = format_decimal(args[0].to_number(), &args[1].to_string())
        .map_err(|message| XPathError::function(name, message))?;
    Ok(XPathValue::String(formatted))
}

/// One half of a `format-number` picture such as `#,##0.00`.
#[derive(Debug, Default)]
struct Picture {
    prefix: String,
    suffix: String,
    min_integer: usize,
    grouping: usize,
    min_fraction: usize,
    max_fraction: usize,
    multiplier: f64,
}

fn parse_picture(text: &str) -> Result<Picture, String> {
    const DIGIT_CHARS: &[char] = &['#', '0', ',', '.'];
    let start = text.find(DIGIT_CHARS).ok_or_else(|| format!("picture '{}' has no digits", text))?;
    let end = text[start..]
        .find(|c: char| !DIGIT_CHARS.contains(&c))
        .map_or(text.len(), |i| start + i);
    let (prefix, digits, suffix) = (&text[..start], &text[start..end], &text[end..]);

    let (integer, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if fraction.contains(['.', ',']) {
        return Err(format!("invalid fraction in picture '{}'", text));
    }
    let affixes = format!("{}{}", prefix, suffix);
    let multiplier = if affixes.contains('%') {
        100.0
    } else if affixes.contains('\u{2030}') {
        1000.0
    } else {
        1.0
    };

    Ok(Picture {
        prefix: prefix.to_string(),
        suffix: suffix.to_string(),
        min_integer: integer.matches('0').count(),
        grouping: integer.rfind(',').map_or(0, |i| integer.len() - i - 1),
        min_fraction: fraction.matches('0').count(),
        max_fraction: fraction.len(),
        multiplier,
    })
}

/// Formats `n` with a JDK `DecimalFormat` style picture: `0` is a required
/// digit, `#` an optional one, `,` groups and `;` separates the negative form.
fn format_decimal(n: f64, picture: &str) -> Result<String, String> {
    let (positive, negative) = match picture.split_once(';') {
        Some((positive, negative)) => (parse_picture(positive)?, Some(parse_picture(negative)?)),
        None => (parse_picture(picture)?, None),
    };
    if n.is_nan() {
        return Ok("NaN".to_string());
    }

    let (prefix, suffix) = match (n.is_sign_negative() && n != 0.0, &negative) {
        (true, Some(negative)) => (negative.prefix.clone(), negative.suffix.clone()),
        (true, None) => (format!("-{}", positive.prefix), positive.suffix.clone()),
        (false, _) => (positive.prefix.clone(), positive.suffix.clone()),
    };
    let value = n.abs() * positive.multiplier;
    if value.is_infinite() {
        return Ok(format!("{}Infinity{}", prefix, suffix));
    }

    let rounded = format!("{:.*}", positive.max_fraction, value);
    let (integer, fraction) = rounded.split_once('.').unwrap_or((&rounded, ""));

    let mut fraction = fraction.to_string();
    while fraction.len() > positive.min_fraction && fraction.ends_with('0') {
        fraction.pop();
    }

    let significant = integer.trim_start_matches('0');
    let width = significant.len().max(positive.min_integer);
    let integer = format!("{:0>width$}", significant, width = width);
    let mut integer = group_digits(&integer, positive.grouping);
    if integer.is_empty() && fraction.is_empty() {
        integer.push('0');
    }

    let mut result = prefix;
    result.push_str(&integer);
    if !fraction.is_empty() {
        result.push('.');
        result.push_str(&fraction);
    }
    result.push_str(&suffix);
    Ok(result)
}

fn group_digits(digits: &str, size: usize) -> String {
    if size == 0 {
        return digits.to_string();
    }
    let mut grouped = String::with_capacity(digits.len() + digits.len() / size);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % size == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::mock::{MockNode, MockTree, menu_tree};
    use crate::parser::parse_expression;
    use std::collections::HashMap;

    fn eval_at<'a>(tree: &'a MockTree, context: usize, xpath: &str) -> Result<XPathValue<MockNode<'a>>, XPathError> {
        let vars = HashMap::new();
        let e_ctx = EvaluationContext::new(tree.node(context), tree.node(0), 1, 1, &vars, false);
        let expr = parse_expression(xpath).unwrap();
        crate::engine::evaluate(&expr, &e_ctx)
    }

    fn string_of(tree: &MockTree, xpath: &str) -> String {
        eval_at(tree, 0, xpath).unwrap().to_string()
    }

    #[test]
    fn test_string_functions() {
        let tree = menu_tree();
        assert_eq!(string_of(&tree, "concat('a', 'b', 1)"), "ab1");
        assert_eq!(string_of(&tree, "substring('12345', 2, 3)"), "234");
        assert_eq!(string_of(&tree, "substring('12345', 1.5, 2.6)"), "234");
        assert_eq!(string_of(&tree, "substring('12345', 0 div 0, 3)"), "");
        assert_eq!(string_of(&tree, "substring-before('2024-01', '-')"), "2024");
        assert_eq!(string_of(&tree, "substring-after('2024-01', '-')"), "01");
        assert_eq!(string_of(&tree, "normalize-space('  a   b ')"), "a b");
        assert_eq!(string_of(&tree, "translate('bar', 'abc', 'ABC')"), "BAr");
        assert_eq!(string_of(&tree, "translate('--a--', '-', '')"), "a");
        assert_eq!(string_of(&tree, "string-length('héllo')"), "5");
        assert_eq!(string_of(&tree, "starts-with('menu', 'me')"), "true");
        assert_eq!(string_of(&tree, "contains('menu', 'x')"), "false");
    }

    #[test]
    fn test_node_functions() {
        let tree = menu_tree();
        assert_eq!(string_of(&tree, "count(//item)"), "2");
        assert_eq!(string_of(&tree, "name(menu/*[last()])"), "note");
        assert_eq!(string_of(&tree, "local-name(menu/@lang)"), "lang");
        assert_eq!(string_of(&tree, "string(menu/item)"), "Home");
        assert_eq!(eval_at(&tree, 3, "string()").unwrap().to_string(), "Home");
        assert_eq!(eval_at(&tree, 3, "name()").unwrap().to_string(), "item");
    }

    #[test]
    fn test_number_functions() {
        let tree = menu_tree();
        assert_eq!(string_of(&tree, "round(2.5)"), "3");
        assert_eq!(string_of(&tree, "round(-2.5)"), "-2");
        assert_eq!(string_of(&tree, "floor(2.7) + ceiling(2.1)"), "5");
        assert_eq!(string_of(&tree, "number('12')"), "12");
        assert_eq!(string_of(&tree, "number('twelve')"), "NaN");
        assert_eq!(string_of(&tree, "7 mod 3"), "1");
        assert_eq!(string_of(&tree, "1 div 0"), "Infinity");
        assert_eq!(string_of(&tree, "sum(//item/@id)"), "NaN");
    }

    #[test]
    fn test_boolean_functions() {
        let tree = menu_tree();
        assert_eq!(string_of(&tree, "not(//missing)"), "true");
        assert_eq!(string_of(&tree, "boolean('')"), "false");
        assert_eq!(string_of(&tree, "true() and not(false())"), "true");
    }

    #[test]
    fn test_arity_and_unknown_functions_are_errors() {
        let tree = menu_tree();
        assert!(matches!(
            eval_at(&tree, 0, "count()"),
            Err(XPathError::FunctionError { .. })
        ));
        assert!(matches!(
            eval_at(&tree, 0, "format-date('x')"),
            Err(XPathError::FunctionError { .. })
        ));
        assert!(matches!(
            eval_at(&tree, 0, "count('x')"),
            Err(XPathError::FunctionError { .. })
        ));
    }

    #[test]
    fn test_current_survives_predicates() {
        let tree = menu_tree();
        let vars = HashMap::new();
        // Context is the second item; predicates see each item in turn.
        let e_ctx = EvaluationContext::new(tree.node(6), tree.node(0), 1, 1, &vars, false);
        let expr = parse_expression("../item[@id = current()/@id]").unwrap();
        let result = crate::engine::evaluate(&expr, &e_ctx).unwrap();
        assert_eq!(result, XPathValue::NodeSet(vec![tree.node(6)]));

        let e_ctx = e_ctx.with_current(tree.node(3));
        let result = crate::engine::evaluate(&expr, &e_ctx).unwrap();
        assert_eq!(result, XPathValue::NodeSet(vec![tree.node(3)]));
    }

    #[test]
    fn test_key_lookup() {
        let tree = menu_tree();
        let vars = HashMap::new();
        let mut by_id = HashMap::new();
        by_id.insert("a".to_string(), vec![tree.node(3)]);
        by_id.insert("b".to_string(), vec![tree.node(6)]);
        let mut keys = HashMap::new();
        keys.insert("item-by-id".to_string(), by_id);

        let e_ctx = EvaluationContext::new(tree.node(0), tree.node(0), 1, 1, &vars, true).with_keys(&keys);
        let lookup = |xpath: &str| crate::engine::evaluate(&parse_expression(xpath).unwrap(), &e_ctx).unwrap();

        assert_eq!(lookup("key('item-by-id', 'b')"), XPathValue::NodeSet(vec![tree.node(6)]));
        assert_eq!(lookup("key('item-by-id', 'z')"), XPathValue::NodeSet(vec![]));
        assert_eq!(lookup("key('missing', 'a')"), XPathValue::NodeSet(vec![]));
        // Node-set values look up each member and come back in document order.
        assert_eq!(
            lookup("key('item-by-id', //item/@id)"),
            XPathValue::NodeSet(vec![tree.node(3), tree.node(6)])
        );
        assert_eq!(lookup("string(key('item-by-id', 'a'))").to_string(), "Home");
    }

    #[test]
    fn test_generate_id() {
        let tree = menu_tree();
        let first = eval_at(&tree, 3, "generate-id()").unwrap().to_string();
        let again = string_of(&tree, "generate-id(menu/item[1])");
        let second = string_of(&tree, "generate-id(menu/item[2])");
        assert!(first.starts_with("id"));
        assert_eq!(first, again);
        assert_ne!(first, second);
        assert_eq!(string_of(&tree, "generate-id(//missing)"), "");
        assert_eq!(string_of(&tree, "generate-id(//item)"), first);
    }

    #[test]
    fn test_format_number() {
        let tree = menu_tree();
        assert_eq!(string_of(&tree, "format-number(1234.5, '#,##0.00')"), "1,234.50");
        assert_eq!(string_of(&tree, "format-number(1234567, '#,###')"), "1,234,567");
        assert_eq!(string_of(&tree, "format-number(7, '000')"), "007");
        assert_eq!(string_of(&tree, "format-number(0.256, '0.0%')"), "25.6%");
        assert_eq!(string_of(&tree, "format-number(2.5, '#.##')"), "2.5");
        assert_eq!(string_of(&tree, "format-number(0.5, '#.00')"), ".50");
        assert_eq!(string_of(&tree, "format-number(0, '#')"), "0");
        assert_eq!(string_of(&tree, "format-number(-3, '0.0')"), "-3.0");
        assert_eq!(string_of(&tree, "format-number(-3, '0;(0)')"), "(3)");
        assert_eq!(string_of(&tree, "format-number(12, '$#0 total')"), "$12 total");
        assert_eq!(string_of(&tree, "format-number('x', '0')"), "NaN");
        assert_eq!(string_of(&tree, "format-number(1 div 0, '0')"), "Infinity");
        assert!(matches!(
            eval_at(&tree, 0, "format-number(1, 'abc')"),
            Err(XPathError::FunctionError { .. })
        ));
    }
}
