//! Views turn an action's result into a response body.

mod raw;
mod registry;
mod templating;

pub use raw::RawDocumentView;
pub use registry::{AnyView, ViewKind};
pub use templating::{TemplatingView, clean_output};

use crate::context::{Request, Routing, ViewAttributes};
use crate::error::{ExceptionSummary, ViewError};
use crate::i18n::Translator;
use serde_json::Value;
use std::sync::Arc;
use vista_dom::{Document, is_valid_name};
use vista_response::Response;

/// Name of the root element structured data is converted under.
pub const COMMAND_ROOT: &str = "command";

/// An action's result in one of the shapes a view accepts.
#[derive(Debug, Clone, Default)]
pub enum ViewData {
    Document(Document),
    /// Serialized markup, parsed on use.
    Markup(String),
    /// Nested key/value data, converted under a `<command>` root.
    Structured(Value),
    #[default]
    Empty,
}

pub type ViewResponse = Response<ViewData>;

/// Called right before a successful transformation result is written.
pub type HeaderHook = Box<dyn Fn(&mut ViewResponse)>;

pub trait View {
    fn prepare(&mut self, _response: &mut ViewResponse) -> Result<(), ViewError> {
        Ok(())
    }

    fn dispatch(
        &mut self,
        response: &mut ViewResponse,
        data: ViewData,
        exceptions: &[&dyn ExceptionSummary],
    ) -> Result<(), ViewError>;

    fn dispatch_exception(&mut self, _response: &mut ViewResponse, _data: ViewData) -> Result<(), ViewError> {
        Err(ViewError::NotImplemented)
    }
}

/// Converts `data` into one document and merges `exceptions` into it.
///
/// `Empty` data and empty markup yield no document, unless there are exceptions
/// to report; those then go under an otherwise empty `<command>` root.
pub fn build_document(
    data: ViewData,
    exceptions: &[&dyn ExceptionSummary],
) -> Result<Option<Document>, ViewError> {
    let mut document = match data {
        ViewData::Document(document) => Some(document),
        ViewData::Markup(markup) if !markup.is_empty() => Some(Document::parse(&markup)?),
        ViewData::Structured(value) => Some(Document::from_value(COMMAND_ROOT, &value)?),
        ViewData::Markup(_) | ViewData::Empty => None,
    };

    if !exceptions.is_empty() {
        let document = document.get_or_insert_with(|| Document::with_root_element(COMMAND_ROOT).0);
        merge_exceptions(document, exceptions);
    }
    Ok(document)
}

/// Appends `<exceptions>` with one `<exception>` per entry under the document
/// element. Summary keys that are not element names become `<entry key="..">`.
pub fn merge_exceptions(document: &mut Document, exceptions: &[&dyn ExceptionSummary]) {
    let Some(root) = document.document_element() else {
        return;
    };
    if exceptions.is_empty() {
        return;
    }
    let list = document.append_element(root, "exceptions");
    for exception in exceptions {
        let node = document.append_element(list, "exception");
        for (key, value) in exception.summary() {
            let child = if is_valid_name(&key) {
                document.append_element(node, &key)
            } else {
                let entry = document.append_element(node, "entry");
                document.set_attribute(entry, "key", key);
                entry
            };
            document.append_text(child, &value);
        }
    }
}

/// Sends `text/xml` in UTF-8.
pub fn set_xml_headers(response: &mut ViewResponse) {
    response.set_content_type("text/xml");
    response.set_charset(Some("utf-8".to_string()));
}

/// State every view shares: the route's view attributes captured at
/// construction, the request and the optional localization collaborator.
pub struct ViewBase {
    attributes: ViewAttributes,
    request: Box<dyn Request>,
    translator: Option<Arc<dyn Translator>>,
    i18n_transform: bool,
    header_hook: Option<HeaderHook>,
}

impl ViewBase {
    pub fn new(routing: &dyn Routing, request: Box<dyn Request>) -> Self {
        ViewBase {
            attributes: routing.view_attributes(),
            request,
            translator: None,
            i18n_transform: true,
            header_hook: None,
        }
    }

    /// Localizes transformation results with `translator` when `enabled`.
    pub fn with_translator(mut self, translator: Arc<dyn Translator>, enabled: bool) -> Self {
        self.translator = Some(translator);
        self.i18n_transform = enabled;
        self
    }

    pub fn with_header_hook(mut self, hook: impl Fn(&mut ViewResponse) + 'static) -> Self {
        self.header_hook = Some(Box::new(hook));
        self
    }

    pub fn attributes(&self) -> &ViewAttributes {
        &self.attributes
    }

    pub fn request(&self) -> &dyn Request {
        self.request.as_ref()
    }

    pub fn transform_i18n(&self, lang: &str, document: &mut Document) {
        if !self.i18n_transform {
            return;
        }
        if let Some(translator) = &self.translator {
            log::debug!("Localizing result for '{}'", lang);
            translator.translate(lang, document);
        }
    }

    pub fn set_headers(&self, response: &mut ViewResponse) {
        if let Some(hook) = &self.header_hook {
            hook(response);
        }
    }
}

impl std::fmt::Debug for ViewBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewBase")
            .field("attributes", &self.attributes)
            .field("i18n_transform", &self.i18n_transform)
            .field("translator", &self.translator.is_some())
            .finish()
    }
}
