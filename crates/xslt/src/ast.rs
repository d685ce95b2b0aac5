//! The compiled form of a stylesheet.

use crate::pattern::PathPattern;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use vista_dom::{Attribute, SerializeOptions};
use vista_xpath::Expression;

/// A sequence of instructions, the body of a template or instruction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Template(pub Vec<Instruction>);

impl Template {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AvtPart {
    Static(String),
    Dynamic(Expression),
}

/// An attribute value template such as `item-{@id}`.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValueTemplate {
    Static(String),
    Dynamic(Vec<AvtPart>),
}

/// How a variable or parameter gets its value.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableValue {
    Select(Expression),
    /// Content is instantiated into a result tree fragment.
    Content(Template),
    Empty,
}

/// `xsl:variable`, `xsl:param` and `xsl:with-param` share one shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub value: VariableValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDataType {
    Text,
    Number,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub select: Expression,
    pub order: SortOrder,
    pub data_type: SortDataType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct When {
    pub test: Expression,
    pub body: Template,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Text(String),
    LiteralElement {
        name: String,
        attributes: Vec<(String, AttributeValueTemplate)>,
        body: Template,
    },
    ApplyTemplates {
        select: Option<Expression>,
        mode: Option<String>,
        params: Vec<Variable>,
        sort_keys: Vec<SortKey>,
    },
    CallTemplate {
        name: String,
        params: Vec<Variable>,
    },
    ValueOf {
        select: Expression,
    },
    ForEach {
        select: Expression,
        sort_keys: Vec<SortKey>,
        body: Template,
    },
    If {
        test: Expression,
        body: Template,
    },
    Choose {
        whens: Vec<When>,
        otherwise: Option<Template>,
    },
    Copy {
        body: Template,
    },
    CopyOf {
        select: Expression,
    },
    Element {
        name: AttributeValueTemplate,
        body: Template,
    },
    Attribute {
        name: AttributeValueTemplate,
        body: Template,
    },
    Comment {
        body: Template,
    },
    Variable(Variable),
    Message {
        body: Template,
        terminate: bool,
    },
}

/// A template rule for one alternative of a match pattern.
#[derive(Debug, Clone)]
pub struct TemplateRule {
    pub pattern: PathPattern,
    pub priority: f64,
    pub mode: Option<String>,
    pub params: Vec<Variable>,
    pub body: Arc<Template>,
    /// Import precedence of the module that declared the rule; higher wins.
    pub precedence: usize,
    /// Declaration order across all modules; later wins among equals.
    pub position: usize,
}

/// `xsl:key`: nodes matching any of `patterns` are indexed under the string
/// values of `use_expr`.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyDefinition {
    pub name: String,
    pub patterns: Vec<PathPattern>,
    pub use_expr: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedTemplate {
    pub params: Vec<Variable>,
    pub body: Template,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVariable {
    pub variable: Variable,
    /// Parameters may be overridden by the caller.
    pub is_param: bool,
}

/// Settings from `xsl:output`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputSettings {
    pub method: Option<String>,
    pub omit_xml_declaration: bool,
    pub indent: bool,
    pub encoding: Option<String>,
    pub media_type: Option<String>,
    pub cdata_section_elements: Vec<String>,
}

impl OutputSettings {
    pub fn serialize_options(&self) -> SerializeOptions {
        SerializeOptions {
            omit_declaration: self.omit_xml_declaration,
            indent: self.indent,
            cdata_section_elements: self.cdata_section_elements.clone(),
        }
    }
}

/// A compiled, immutable stylesheet. Share it behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct Stylesheet {
    pub output: OutputSettings,
    pub rules: Vec<TemplateRule>,
    pub named_templates: HashMap<String, Arc<NamedTemplate>>,
    pub globals: Vec<GlobalVariable>,
    pub keys: Vec<KeyDefinition>,
    /// Non-XSLT namespace declarations of the principal stylesheet module.
    pub namespaces: Vec<Attribute>,
    pub base_dir: PathBuf,
}
