//! Defines the `CompilerBuilder`, which walks a parsed stylesheet document and
//! produces an immutable [`Stylesheet`].
use crate::ast::Stylesheet;
use crate::error::XsltError;
use std::fs;
use std::path::{Path, PathBuf};
use vista_dom::{Document, NodeId};

pub const XSLT_NAMESPACE: &str = "http://www.w3.org/1999/XSL/Transform";

impl Stylesheet {
    /// Reads and compiles the stylesheet at `path`. Included and imported modules
    /// resolve relative to its directory.
    pub fn load(path: &Path) -> Result<Stylesheet, XsltError> {
        let source = read_module(path)?;
        let doc = Document::parse(&source)?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut builder = CompilerBuilder::new(base_dir.clone());
        builder.loading.push(canonical(path));
        builder.compile_module(&doc, &base_dir, None, true)?;
        Ok(builder.finalize())
    }

    /// Compiles an already parsed stylesheet document.
    pub fn compile(doc: &Document, base_dir: &Path) -> Result<Stylesheet, XsltError> {
        let mut builder = CompilerBuilder::new(base_dir.to_path_buf());
        builder.compile_module(doc, base_dir, None, true)?;
        Ok(builder.finalize())
    }
}

pub(crate) fn read_module(path: &Path) -> Result<String, XsltError> {
    fs::read_to_string(path).map_err(|e| XsltError::Module {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Per-module naming state needed while compiling its elements.
pub(crate) struct Module<'d> {
    pub(crate) doc: &'d Document,
    pub(crate) dir: PathBuf,
    /// Prefix bound to the XSLT namespace; `None` when it is the default namespace.
    pub(crate) xsl_prefix: Option<String>,
    /// Prefixes named by `exclude-result-prefixes`; `""` stands for `#default`.
    pub(crate) excluded_prefixes: Vec<String>,
}

impl<'d> Module<'d> {
    /// The local name of `id` if it is an element in the XSLT namespace.
    pub(crate) fn xsl_name(&self, id: NodeId) -> Option<&'d str> {
        let element = self.doc.element(id)?;
        match (&self.xsl_prefix, element.prefix()) {
            (Some(xsl), Some(prefix)) if xsl == prefix => Some(element.local_name()),
            (None, None) => Some(element.local_name()),
            _ => None,
        }
    }

    /// Element children of `id`, skipping text, comments and processing instructions.
    pub(crate) fn child_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + 'd {
        let doc = self.doc;
        doc.children(id)
            .iter()
            .copied()
            .filter(move |&c| doc.element(c).is_some())
    }

    /// Whether a namespace declaration attribute should be dropped from literal results.
    pub(crate) fn is_excluded_declaration(&self, attribute_name: &str, value: &str) -> bool {
        if value == XSLT_NAMESPACE {
            return true;
        }
        let prefix = attribute_name.strip_prefix("xmlns:").unwrap_or("");
        self.excluded_prefixes.iter().any(|p| p == prefix)
    }
}

/// A stateful builder that accumulates modules into a `Stylesheet`.
pub struct CompilerBuilder {
    pub(crate) stylesheet: Stylesheet,
    pub(crate) next_precedence: usize,
    pub(crate) next_position: usize,
    /// Modules currently being compiled, for cycle detection.
    pub(crate) loading: Vec<PathBuf>,
}

impl CompilerBuilder {
    fn new(base_dir: PathBuf) -> Self {
        Self {
            stylesheet: Stylesheet {
                base_dir,
                ..Stylesheet::default()
            },
            next_precedence: 0,
            next_position: 0,
            loading: Vec::new(),
        }
    }

    fn finalize(self) -> Stylesheet {
        log::debug!(
            "Compiled stylesheet: {} template rules, {} named templates, {} globals",
            self.stylesheet.rules.len(),
            self.stylesheet.named_templates.len(),
            self.stylesheet.globals.len()
        );
        self.stylesheet
    }

    /// Compiles an included or imported module read from `path`.
    pub(crate) fn compile_file(&mut self, path: &Path, precedence: Option<usize>) -> Result<(), XsltError> {
        let key = canonical(path);
        if self.loading.contains(&key) {
            return Err(XsltError::Module {
                path: path.to_path_buf(),
                message: "module includes or imports itself".to_string(),
            });
        }
        let source = read_module(path)?;
        let doc = Document::parse(&source).map_err(|e| XsltError::Module {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        log::debug!("Compiling stylesheet module {:?}", path);

        self.loading.push(key);
        let result = self.compile_module(&doc, &dir, precedence, false);
        self.loading.pop();
        result
    }

    /// Compiles one module. Imports are compiled first so they receive lower
    /// precedence; an included module shares the precedence of its includer.
    pub(crate) fn compile_module(
        &mut self,
        doc: &Document,
        dir: &Path,
        precedence: Option<usize>,
        principal: bool,
    ) -> Result<(), XsltError> {
        let root = doc
            .document_element()
            .ok_or_else(|| XsltError::Compilation("stylesheet has no document element".to_string()))?;
        let module = self.module_for(doc, root, dir)?;

        for child in module.child_elements(root).collect::<Vec<_>>() {
            if module.xsl_name(child) == Some("import") {
                let href = self.required_attribute(&module, child, "href")?;
                self.compile_file(&module.dir.join(href), None)?;
            }
        }

        let precedence = match precedence {
            Some(p) => p,
            None => {
                self.next_precedence += 1;
                self.next_precedence
            }
        };

        if principal {
            self.collect_namespaces(&module, root);
        }
        self.compile_top_level(&module, root, precedence)
    }

    fn module_for<'d>(&self, doc: &'d Document, root: NodeId, dir: &Path) -> Result<Module<'d>, XsltError> {
        let element = doc
            .element(root)
            .ok_or_else(|| XsltError::Compilation("stylesheet has no document element".to_string()))?;

        let xsl_prefix = element
            .attributes
            .iter()
            .find(|a| a.is_namespace_declaration() && a.value == XSLT_NAMESPACE)
            .map(|a| a.name.strip_prefix("xmlns:").map(str::to_string))
            .ok_or_else(|| XsltError::Compilation(format!("<{}> does not declare the XSLT namespace", element.name)))?;

        let module = Module {
            doc,
            dir: dir.to_path_buf(),
            xsl_prefix,
            excluded_prefixes: element
                .attribute("exclude-result-prefixes")
                .map(|list| {
                    list.split_whitespace()
                        .map(|p| if p == "#default" { String::new() } else { p.to_string() })
                        .collect()
                })
                .unwrap_or_default(),
        };

        match module.xsl_name(root) {
            Some("stylesheet") | Some("transform") => Ok(module),
            _ => Err(XsltError::Compilation(format!(
                "<{}> is not an xsl:stylesheet element",
                element.name
            ))),
        }
    }

    /// Records the non-XSLT namespace declarations of the principal module.
    fn collect_namespaces(&mut self, module: &Module<'_>, root: NodeId) {
        let Some(element) = module.doc.element(root) else {
            return;
        };
        self.stylesheet.namespaces = element
            .attributes
            .iter()
            .filter(|a| a.is_namespace_declaration() && !module.is_excluded_declaration(&a.name, &a.value))
            .cloned()
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(source: &str) -> Result<Stylesheet, XsltError> {
        Stylesheet::compile(&Document::parse(source)?, Path::new("."))
    }

    #[test]
    fn test_requires_xslt_root() {
        assert!(compile("<html/>").is_err());
        assert!(compile(r#"<x:stylesheet xmlns:x="urn:other" version="1.0"/>"#).is_err());
        assert!(compile(r#"<x:transform xmlns:x="http://www.w3.org/1999/XSL/Transform" version="1.0"/>"#).is_ok());
    }

    #[test]
    fn test_namespace_collection_honors_exclusions() {
        let stylesheet = compile(
            r#"<xsl:stylesheet version="1.0"
                 xmlns:xsl="http://www.w3.org/1999/XSL/Transform"
                 xmlns="http://www.w3.org/1999/xhtml"
                 xmlns:i18n="http://apache.org/cocoon/i18n/2.1"
                 xmlns:php="urn:php"
                 exclude-result-prefixes="php"/>"#,
        )
        .unwrap();
        let names: Vec<&str> = stylesheet.namespaces.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["xmlns", "xmlns:i18n"]);
    }
}
