//! Compilation of template bodies: instructions and literal result elements.

use crate::ast::{Instruction, Template, When};
use crate::compiler::{CompilerBuilder, Module};
use crate::error::XsltError;
use vista_dom::{NodeId, NodeKind};

impl CompilerBuilder {
    /// Compiles a run of sibling nodes. Whitespace-only text is stripped.
    pub(crate) fn compile_nodes(&self, module: &Module<'_>, nodes: &[NodeId]) -> Result<Template, XsltError> {
        let mut instructions = Vec::new();
        for &node in nodes {
            match module.doc.kind(node) {
                NodeKind::Text(text) if text.trim().is_empty() => {}
                NodeKind::Text(text) | NodeKind::CData(text) => instructions.push(Instruction::Text(text.clone())),
                NodeKind::Element(_) => {
                    let instruction = match module.xsl_name(node) {
                        Some(local) => self.compile_instruction(module, node, local)?,
                        None => Some(self.compile_literal_element(module, node)?),
                    };
                    instructions.extend(instruction);
                }
                _ => {}
            }
        }
        Ok(Template(instructions))
    }

    fn body(&self, module: &Module<'_>, id: NodeId) -> Result<Template, XsltError> {
        self.compile_nodes(module, module.doc.children(id))
    }

    fn compile_instruction(
        &self,
        module: &Module<'_>,
        id: NodeId,
        local: &str,
    ) -> Result<Option<Instruction>, XsltError> {
        let instruction = match local {
            "apply-templates" => Instruction::ApplyTemplates {
                select: match self.optional_attribute(module, id, "select") {
                    Some(select) => Some(self.expression(select)?),
                    None => None,
                },
                mode: self.optional_attribute(module, id, "mode").map(str::to_string),
                params: self.compile_with_params(module, id)?,
                sort_keys: self.compile_sort_keys(module, id)?,
            },
            "call-template" => Instruction::CallTemplate {
                name: self.required_attribute(module, id, "name")?.to_string(),
                params: self.compile_with_params(module, id)?,
            },
            "value-of" => Instruction::ValueOf {
                select: self.required_expression(module, id, "select")?,
            },
            "text" => {
                let text = module.doc.text_content(id);
                if text.is_empty() {
                    return Ok(None);
                }
                Instruction::Text(text)
            }
            "for-each" => Instruction::ForEach {
                select: self.required_expression(module, id, "select")?,
                sort_keys: self.compile_sort_keys(module, id)?,
                body: self.body(module, id)?,
            },
            "if" => Instruction::If {
                test: self.required_expression(module, id, "test")?,
                body: self.body(module, id)?,
            },
            "choose" => self.compile_choose(module, id)?,
            "copy" => Instruction::Copy {
                body: self.body(module, id)?,
            },
            "copy-of" => Instruction::CopyOf {
                select: self.required_expression(module, id, "select")?,
            },
            "element" => Instruction::Element {
                name: self.parse_avt(self.required_attribute(module, id, "name")?)?,
                body: self.body(module, id)?,
            },
            "attribute" => Instruction::Attribute {
                name: self.parse_avt(self.required_attribute(module, id, "name")?)?,
                body: self.body(module, id)?,
            },
            "comment" => Instruction::Comment {
                body: self.body(module, id)?,
            },
            "variable" | "param" => Instruction::Variable(self.compile_variable(module, id)?),
            "message" => Instruction::Message {
                body: self.body(module, id)?,
                terminate: self.optional_attribute(module, id, "terminate").map(str::trim) == Some("yes"),
            },
            // Collected by the enclosing instruction.
            "sort" | "with-param" => return Ok(None),
            other => {
                return Err(XsltError::Compilation(format!("unsupported instruction xsl:{}", other)));
            }
        };
        Ok(Some(instruction))
    }

    fn compile_choose(&self, module: &Module<'_>, id: NodeId) -> Result<Instruction, XsltError> {
        let mut whens = Vec::new();
        let mut otherwise = None;
        for child in module.child_elements(id) {
            match module.xsl_name(child) {
                Some("when") => whens.push(When {
                    test: self.required_expression(module, child, "test")?,
                    body: self.body(module, child)?,
                }),
                Some("otherwise") => otherwise = Some(self.body(module, child)?),
                _ => {
                    return Err(XsltError::Compilation(
                        "xsl:choose may only contain xsl:when and xsl:otherwise".to_string(),
                    ));
                }
            }
        }
        if whens.is_empty() {
            return Err(XsltError::Compilation("xsl:choose requires at least one xsl:when".to_string()));
        }
        Ok(Instruction::Choose { whens, otherwise })
    }

    fn compile_literal_element(&self, module: &Module<'_>, id: NodeId) -> Result<Instruction, XsltError> {
        let Some(element) = module.doc.element(id) else {
            return Err(XsltError::Compilation("expected an element".to_string()));
        };
        let xsl_attribute_prefix = module.xsl_prefix.as_deref().map(|p| format!("{}:", p));

        let mut attributes = Vec::new();
        for attribute in &element.attributes {
            if attribute.is_namespace_declaration() && module.is_excluded_declaration(&attribute.name, &attribute.value) {
                continue;
            }
            if xsl_attribute_prefix
                .as_deref()
                .is_some_and(|prefix| attribute.name.starts_with(prefix))
            {
                continue;
            }
            attributes.push((attribute.name.clone(), self.parse_avt(&attribute.value)?));
        }

        Ok(Instruction::LiteralElement {
            name: element.name.clone(),
            attributes,
            body: self.body(module, id)?,
        })
    }
}
