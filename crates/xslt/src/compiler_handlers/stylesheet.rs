//! Handlers for top-level stylesheet elements.

use crate::ast::{GlobalVariable, KeyDefinition, NamedTemplate, TemplateRule};
use crate::compiler::{CompilerBuilder, Module};
use crate::error::XsltError;
use crate::pattern;
use std::sync::Arc;
use vista_dom::NodeId;

impl CompilerBuilder {
    pub(crate) fn compile_top_level(
        &mut self,
        module: &Module<'_>,
        root: NodeId,
        precedence: usize,
    ) -> Result<(), XsltError> {
        for child in module.child_elements(root).collect::<Vec<_>>() {
            let Some(local) = module.xsl_name(child) else {
                // User-defined data elements are allowed at the top level.
                continue;
            };
            match local {
                "import" => {}
                "include" => {
                    let href = self.required_attribute(module, child, "href")?;
                    self.compile_file(&module.dir.join(href), Some(precedence))?;
                }
                "output" => self.handle_output(module, child),
                "template" => self.handle_template(module, child, precedence)?,
                "param" | "variable" => {
                    let variable = self.compile_variable(module, child)?;
                    self.stylesheet.globals.push(GlobalVariable {
                        variable,
                        is_param: local == "param",
                    });
                }
                "key" => self.handle_key(module, child)?,
                "strip-space" | "preserve-space" | "decimal-format" | "namespace-alias"
                | "attribute-set" => {
                    log::warn!("Top-level xsl:{} is not supported and was ignored", local);
                }
                other => {
                    return Err(XsltError::Compilation(format!(
                        "xsl:{} is not allowed at the top level",
                        other
                    )));
                }
            }
        }
        Ok(())
    }

    fn handle_output(&mut self, module: &Module<'_>, id: NodeId) {
        let output = &mut self.stylesheet.output;
        let doc = module.doc;
        let yes = |name: &str| doc.attribute(id, name).map(|v| v.trim() == "yes");

        if let Some(method) = doc.attribute(id, "method") {
            output.method = Some(method.to_string());
        }
        if let Some(omit) = yes("omit-xml-declaration") {
            output.omit_xml_declaration = omit;
        }
        if let Some(indent) = yes("indent") {
            output.indent = indent;
        }
        if let Some(encoding) = doc.attribute(id, "encoding") {
            output.encoding = Some(encoding.to_string());
        }
        if let Some(media_type) = doc.attribute(id, "media-type") {
            output.media_type = Some(media_type.to_string());
        }
        if let Some(elements) = doc.attribute(id, "cdata-section-elements") {
            output
                .cdata_section_elements
                .extend(elements.split_whitespace().map(str::to_string));
        }
    }

    fn handle_key(&mut self, module: &Module<'_>, id: NodeId) -> Result<(), XsltError> {
        let name = self.required_attribute(module, id, "name")?.to_string();
        let patterns = pattern::parse(self.required_attribute(module, id, "match")?)?;
        let use_expr = self.required_expression(module, id, "use")?;
        self.stylesheet.keys.push(KeyDefinition {
            name,
            patterns,
            use_expr,
        });
        Ok(())
    }

    fn handle_template(&mut self, module: &Module<'_>, id: NodeId, precedence: usize) -> Result<(), XsltError> {
        let match_attr = self.optional_attribute(module, id, "match");
        let name = self.optional_attribute(module, id, "name");
        if match_attr.is_none() && name.is_none() {
            return Err(XsltError::Compilation(
                "xsl:template requires a 'match' or 'name' attribute".to_string(),
            ));
        }

        let (params, body) = self.compile_template_body(module, id)?;

        if let Some(name) = name {
            self.stylesheet.named_templates.insert(
                name.to_string(),
                Arc::new(NamedTemplate {
                    params: params.clone(),
                    body: body.clone(),
                }),
            );
        }

        if let Some(match_text) = match_attr {
            let priority = match self.optional_attribute(module, id, "priority") {
                Some(p) => Some(p.trim().parse::<f64>().map_err(|_| {
                    XsltError::Compilation(format!("invalid template priority '{}'", p))
                })?),
                None => None,
            };
            let mode = self.optional_attribute(module, id, "mode").map(str::to_string);
            let body = Arc::new(body);
            for alternative in pattern::parse(match_text)? {
                self.next_position += 1;
                self.stylesheet.rules.push(TemplateRule {
                    priority: priority.unwrap_or_else(|| alternative.default_priority()),
                    pattern: alternative,
                    mode: mode.clone(),
                    params: params.clone(),
                    body: Arc::clone(&body),
                    precedence,
                    position: self.next_position,
                });
            }
        }
        Ok(())
    }
}
