//! Runs a compiled stylesheet against source documents.

use crate::ast::Stylesheet;
use crate::datasource::DomTree;
use crate::error::{Diagnostic, Severity};
use crate::executor::TemplateExecutor;
use crate::output::ResultTree;
use std::collections::HashMap;
use std::sync::Arc;
use vista_dom::Document;

/// The outcome of a transformation. `document` is `None` after a fatal error.
#[derive(Debug)]
pub struct Transformation {
    pub document: Option<Document>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Transformation {
    /// No diagnostics and a result with a document element.
    pub fn is_success(&self) -> bool {
        self.diagnostics.is_empty()
            && self
                .document
                .as_ref()
                .is_some_and(|doc| doc.document_element().is_some())
    }
}

/// A compiled stylesheet plus the top-level parameters of one run.
#[derive(Debug, Clone)]
pub struct Processor {
    stylesheet: Arc<Stylesheet>,
    parameters: HashMap<String, String>,
}

impl Processor {
    pub fn new(stylesheet: Arc<Stylesheet>) -> Self {
        Processor {
            stylesheet,
            parameters: HashMap::new(),
        }
    }

    pub fn stylesheet(&self) -> &Arc<Stylesheet> {
        &self.stylesheet
    }

    /// Sets a top-level `xsl:param`, passed as a string.
    pub fn set_parameter(&mut self, name: &str, value: impl Into<String>) {
        self.parameters.insert(name.to_string(), value.into());
    }

    pub fn parameters(&self) -> &HashMap<String, String> {
        &self.parameters
    }

    pub fn transform(&self, source: &Document) -> Transformation {
        let tree = DomTree::new(source);
        let mut builder = ResultTree::new();
        let mut executor = TemplateExecutor::new(&self.stylesheet, tree.root());
        let outcome = executor.run(&self.parameters, &mut builder);
        let mut diagnostics = executor.into_diagnostics();

        match outcome {
            Ok(()) => {
                let mut document = builder.into_document();
                self.declare_namespaces(&mut document);
                Transformation {
                    document: Some(document),
                    diagnostics,
                }
            }
            Err(e) => {
                log::warn!("XSLT transformation failed: {}", e);
                diagnostics.push(Diagnostic {
                    severity: Severity::Fatal,
                    message: e.to_string(),
                });
                Transformation {
                    document: None,
                    diagnostics,
                }
            }
        }
    }

    /// Serializes a result document with the stylesheet's `xsl:output` settings.
    pub fn serialize(&self, document: &Document) -> String {
        document.to_xml_with(&self.stylesheet.output.serialize_options())
    }

    /// Puts the stylesheet's namespace declarations on the result's document
    /// element, ahead of its own attributes. Existing declarations win.
    fn declare_namespaces(&self, document: &mut Document) {
        let Some(element) = document.document_element().and_then(|id| document.element_mut(id)) else {
            return;
        };
        let missing: Vec<_> = self
            .stylesheet
            .namespaces
            .iter()
            .filter(|ns| element.attribute(&ns.name).is_none())
            .cloned()
            .collect();
        for (index, declaration) in missing.into_iter().enumerate() {
            element.attributes.insert(index, declaration);
        }
    }
}
