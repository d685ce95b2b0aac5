//! An XPath 1.0 engine that evaluates against any tree implementing
//! [`DataSourceNode`].

pub mod ast;
pub mod axes;
pub mod datasource;
pub mod engine;
pub mod error;
pub mod functions;
pub mod operators;
pub mod parser;

pub use ast::{Axis, BinaryOperator, Expression, LocationPath, NodeTest, NodeTypeTest, Step};
pub use datasource::{DataSourceNode, NodeType, QName};
pub use engine::{
    EvaluationContext, Fragment, KeyIndexes, TreeFragment, XPathValue, evaluate, format_number, node_test_matches,
};
pub use error::XPathError;
pub use parser::parse_expression;
