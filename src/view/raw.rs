use super::{View, ViewBase, ViewData, ViewResponse, build_document, set_xml_headers};
use crate::error::{ExceptionSummary, ViewError};

/// Writes structured data as XML, untransformed.
///
/// Exceptions passed to `dispatch` are not merged into the output.
#[derive(Debug)]
pub struct RawDocumentView {
    base: ViewBase,
}

impl RawDocumentView {
    pub fn new(base: ViewBase) -> Self {
        RawDocumentView { base }
    }

    pub fn base(&self) -> &ViewBase {
        &self.base
    }
}

impl View for RawDocumentView {
    fn dispatch(
        &mut self,
        response: &mut ViewResponse,
        data: ViewData,
        _exceptions: &[&dyn ExceptionSummary],
    ) -> Result<(), ViewError> {
        if !matches!(data, ViewData::Structured(_)) {
            return Err(ViewError::InputType);
        }
        set_xml_headers(response);
        if let Some(document) = build_document(data, &[])? {
            response.add_content(&document.to_xml());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{SimpleRequest, StaticRoute, ViewAttributes};
    use serde_json::json;

    fn view() -> RawDocumentView {
        let route = StaticRoute::new(ViewAttributes::new());
        RawDocumentView::new(ViewBase::new(&route, Box::new(SimpleRequest::new())))
    }

    #[test]
    fn test_structured_data_is_serialized() {
        let mut response = ViewResponse::new(true);
        view()
            .dispatch(&mut response, ViewData::Structured(json!({"x": "1"})), &[&ViewError::InputType])
            .unwrap();
        assert_eq!(response.content_type(), Some("text/xml"));
        assert_eq!(response.content(), "<?xml version=\"1.0\"?>\n<command><x>1</x></command>\n");
    }

    #[test]
    fn test_other_shapes_are_rejected() {
        let mut response = ViewResponse::new(true);
        let result = view().dispatch(&mut response, ViewData::Markup("<a/>".to_string()), &[]);
        assert!(matches!(result, Err(ViewError::InputType)));
        assert_eq!(response.content(), "");
        assert!(matches!(
            view().dispatch_exception(&mut response, ViewData::Empty),
            Err(ViewError::NotImplemented)
        ));
    }
}
