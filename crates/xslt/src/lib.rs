//! XSLT 1.0 processor producing `vista_dom` documents.
//!
//! Stylesheets are compiled once into an immutable [`Stylesheet`] and shared
//! behind an `Arc`; a [`Processor`] binds top-level parameters and runs it.

pub mod ast;
pub mod compiler;
pub mod datasource;
pub mod error;
pub mod executor;
pub mod output;
pub mod pattern;
pub mod processor;

mod compiler_handlers;
mod executor_handlers;

pub use ast::{OutputSettings, Stylesheet};
pub use compiler::XSLT_NAMESPACE;
pub use datasource::{DomNode, DomTree};
pub use error::{Diagnostic, Severity, XsltError};
pub use output::{OutputBuilder, ResultFragment, ResultTree, TextBuilder};
pub use processor::{Processor, Transformation};
