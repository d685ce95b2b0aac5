pub(super) mod instructions;
pub(super) mod stylesheet;
pub(super) mod variables;

use crate::ast::{AttributeValueTemplate, AvtPart};
use crate::compiler::{CompilerBuilder, Module};
use crate::error::XsltError;
use vista_dom::NodeId;
use vista_xpath::{Expression, parse_expression};

// Attribute and expression helpers shared by all handlers.

impl CompilerBuilder {
    pub(crate) fn optional_attribute<'d>(&self, module: &Module<'d>, id: NodeId, name: &str) -> Option<&'d str> {
        module.doc.attribute(id, name)
    }

    pub(crate) fn required_attribute<'d>(
        &self,
        module: &Module<'d>,
        id: NodeId,
        name: &str,
    ) -> Result<&'d str, XsltError> {
        self.optional_attribute(module, id, name).ok_or_else(|| {
            XsltError::Compilation(format!(
                "<{}> requires a '{}' attribute",
                module.doc.name(id).unwrap_or_default(),
                name
            ))
        })
    }

    pub(crate) fn expression(&self, text: &str) -> Result<Expression, XsltError> {
        Ok(parse_expression(text)?)
    }

    pub(crate) fn required_expression(
        &self,
        module: &Module<'_>,
        id: NodeId,
        name: &str,
    ) -> Result<Expression, XsltError> {
        let text = self.required_attribute(module, id, name)?;
        self.expression(text)
    }

    /// Parses an attribute value template. `{{` and `}}` escape braces; a `}`
    /// inside a quoted string does not end an expression.
    pub(crate) fn parse_avt(&self, text: &str) -> Result<AttributeValueTemplate, XsltError> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut expr = String::new();
                    let mut quote = None;
                    let mut closed = false;
                    for c in chars.by_ref() {
                        match (quote, c) {
                            (None, '}') => {
                                closed = true;
                                break;
                            }
                            (None, '"' | '\'') => quote = Some(c),
                            (Some(q), _) if q == c => quote = None,
                            _ => {}
                        }
                        expr.push(c);
                    }
                    if !closed {
                        return Err(XsltError::Compilation(format!(
                            "unterminated expression in attribute value template '{}'",
                            text
                        )));
                    }
                    if !literal.is_empty() {
                        parts.push(AvtPart::Static(std::mem::take(&mut literal)));
                    }
                    parts.push(AvtPart::Dynamic(self.expression(&expr)?));
                }
                _ => literal.push(c),
            }
        }

        if parts.is_empty() {
            return Ok(AttributeValueTemplate::Static(literal));
        }
        if !literal.is_empty() {
            parts.push(AvtPart::Static(literal));
        }
        Ok(AttributeValueTemplate::Dynamic(parts))
    }
}
