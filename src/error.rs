use std::path::PathBuf;
use thiserror::Error;
use vista_dom::DomError;
use vista_xslt::Diagnostic;

/// A flat key/value projection of an error, merged into view documents as an
/// `<exception>` element.
pub trait ExceptionSummary {
    fn summary(&self) -> Vec<(String, String)>;
}

/// Everything a view can fail with while preparing or dispatching.
#[derive(Error, Debug)]
pub enum ViewError {
    #[error("No template was specified for this route")]
    ConfigurationMissing,

    #[error("File not found: {}", path.display())]
    TemplateNotFound { path: PathBuf },

    #[error("XML parse error in file {}: {message}", path.display())]
    TemplateParse { path: PathBuf, message: String },

    #[error("Parse error in \"{}\": {}", path.display(), join_diagnostics(diagnostics))]
    TransformParse {
        path: PathBuf,
        diagnostics: Vec<Diagnostic>,
    },

    #[error("Input must be structured data")]
    InputType,

    #[error("Not implemented")]
    NotImplemented,

    #[error("Input markup is malformed: {0}")]
    Markup(#[from] DomError),

    #[error("Unknown view '{0}'")]
    UnknownView(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn join_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ViewError {
    /// A stable identifier for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            ViewError::ConfigurationMissing => "noXsltFound",
            ViewError::TemplateNotFound { .. } => "fileNotFound",
            ViewError::TemplateParse { .. } => "xmlParseError",
            ViewError::TransformParse { .. } => "xsltParseError",
            ViewError::InputType => "inputType",
            ViewError::NotImplemented => "notImplemented",
            ViewError::Markup(_) => "markupError",
            ViewError::UnknownView(_) => "unknownView",
            ViewError::Config(_) => "configError",
            ViewError::Json(_) => "jsonError",
            ViewError::Io(_) => "ioError",
        }
    }
}

impl ExceptionSummary for ViewError {
    fn summary(&self) -> Vec<(String, String)> {
        let mut summary = vec![
            ("code".to_string(), self.code().to_string()),
            ("message".to_string(), self.to_string()),
        ];
        match self {
            ViewError::TemplateNotFound { path }
            | ViewError::TemplateParse { path, .. }
            | ViewError::TransformParse { path, .. } => {
                summary.push(("file".to_string(), path.display().to_string()));
            }
            _ => {}
        }
        summary
    }
}
