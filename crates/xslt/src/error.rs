use std::path::PathBuf;
use thiserror::Error;
use vista_dom::DomError;
use vista_xpath::XPathError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum XsltError {
    #[error("XML parsing error: {0}")]
    XmlParse(#[from] DomError),

    #[error("XPath error: {0}")]
    XPath(#[from] XPathError),

    #[error("Stylesheet compilation error: {0}")]
    Compilation(String),

    #[error("Invalid match pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("Cannot read stylesheet module {path:?}: {message}")]
    Module { path: PathBuf, message: String },

    #[error("Transformation error: {0}")]
    Execution(String),

    #[error("Transformation terminated by xsl:message: {0}")]
    Terminated(String),
}

/// A problem reported while running a transformation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Execution continued after recovering.
    Error,
    /// Execution stopped; no result document was produced.
    Fatal,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.severity {
            Severity::Error => write!(f, "error: {}", self.message),
            Severity::Fatal => write!(f, "fatal: {}", self.message),
        }
    }
}
