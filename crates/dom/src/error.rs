use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomError {
    #[error("XML syntax error at byte {position}: {message}")]
    Syntax { position: u64, message: String },

    #[error("Document has no root element")]
    NoRootElement,

    #[error("Unexpected content outside the root element at byte {0}")]
    ContentOutsideRoot(u64),

    #[error("Element <{0}> is not closed")]
    Unclosed(String),

    #[error("'{0}' is not a valid XML name")]
    InvalidName(String),
}
