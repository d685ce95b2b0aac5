//! Handlers for `<xsl:variable>`, `<xsl:param>`, `<xsl:with-param>` and `<xsl:sort>`.

use crate::ast::{SortDataType, SortKey, SortOrder, Template, Variable, VariableValue};
use crate::compiler::{CompilerBuilder, Module};
use crate::error::XsltError;
use vista_dom::NodeId;

impl CompilerBuilder {
    /// Compiles any variable-shaped element. `select` wins over content.
    pub(crate) fn compile_variable(&self, module: &Module<'_>, id: NodeId) -> Result<Variable, XsltError> {
        let name = self.required_attribute(module, id, "name")?.to_string();
        let value = match self.optional_attribute(module, id, "select") {
            Some(select) => VariableValue::Select(self.expression(select)?),
            None => {
                let body = self.compile_nodes(module, module.doc.children(id))?;
                if body.is_empty() {
                    VariableValue::Empty
                } else {
                    VariableValue::Content(body)
                }
            }
        };
        Ok(Variable { name, value })
    }

    /// Splits a template's leading `xsl:param` children from its body.
    pub(crate) fn compile_template_body(
        &self,
        module: &Module<'_>,
        id: NodeId,
    ) -> Result<(Vec<Variable>, Template), XsltError> {
        let children = module.doc.children(id);
        let mut params = Vec::new();
        let mut rest = 0;
        for (index, &child) in children.iter().enumerate() {
            if module.xsl_name(child) == Some("param") {
                params.push(self.compile_variable(module, child)?);
                rest = index + 1;
            } else if module.doc.element(child).is_some() {
                break;
            }
        }
        Ok((params, self.compile_nodes(module, &children[rest..])?))
    }

    /// `xsl:with-param` children of `apply-templates` or `call-template`.
    pub(crate) fn compile_with_params(&self, module: &Module<'_>, id: NodeId) -> Result<Vec<Variable>, XsltError> {
        module
            .child_elements(id)
            .filter(|&c| module.xsl_name(c) == Some("with-param"))
            .map(|c| self.compile_variable(module, c))
            .collect()
    }

    pub(crate) fn compile_sort_keys(&self, module: &Module<'_>, id: NodeId) -> Result<Vec<SortKey>, XsltError> {
        module
            .child_elements(id)
            .filter(|&c| module.xsl_name(c) == Some("sort"))
            .map(|c| self.compile_sort(module, c))
            .collect()
    }

    fn compile_sort(&self, module: &Module<'_>, id: NodeId) -> Result<SortKey, XsltError> {
        let select = self.expression(self.optional_attribute(module, id, "select").unwrap_or("."))?;
        let order = match self.optional_attribute(module, id, "order") {
            None | Some("ascending") => SortOrder::Ascending,
            Some("descending") => SortOrder::Descending,
            Some(other) => {
                return Err(XsltError::Compilation(format!("invalid sort order '{}'", other)));
            }
        };
        let data_type = match self.optional_attribute(module, id, "data-type") {
            Some("number") => SortDataType::Number,
            None | Some("text") => SortDataType::Text,
            Some(other) => {
                log::warn!("Unsupported sort data-type '{}', sorting as text", other);
                SortDataType::Text
            }
        };
        Ok(SortKey {
            select,
            order,
            data_type,
        })
    }
}
