//! Response rendering for an MVC framework.
//!
//! A view takes an action's result, builds one document from it, and writes the
//! rendered body into a [`vista_response::Response`]. [`view::TemplatingView`]
//! runs the document through a theme's XSLT stylesheet and localizes the
//! result; [`view::RawDocumentView`] writes it as XML.

pub mod context;
pub mod error;
pub mod i18n;
pub mod settings;
pub mod view;

pub use context::{Request, Routing, SimpleRequest, StaticRoute, ViewAttributes};
pub use error::{ExceptionSummary, ViewError};
pub use i18n::{Catalog, Translator};
pub use settings::{DumpPolicy, Settings};
pub use view::{
    AnyView, RawDocumentView, TemplatingView, View, ViewBase, ViewData, ViewKind, ViewResponse,
    build_document,
};

pub use vista_dom::Document;
pub use vista_response::{Control, Cookie, MemoryTransport, RedirectOrigin, Response, Transport};
