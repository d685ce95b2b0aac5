use super::{RawDocumentView, TemplatingView, View, ViewBase, ViewData, ViewResponse};
use crate::error::{ExceptionSummary, ViewError};
use crate::settings::Settings;
use std::str::FromStr;
use std::sync::Arc;

/// The available view strategies, resolved by name when a route is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Templating,
    Raw,
}

impl FromStr for ViewKind {
    type Err = ViewError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "default" | "xsl" => Ok(ViewKind::Templating),
            "xml" => Ok(ViewKind::Raw),
            other => Err(ViewError::UnknownView(other.to_string())),
        }
    }
}

impl ViewKind {
    pub fn create(self, base: ViewBase, settings: Arc<Settings>) -> AnyView {
        match self {
            ViewKind::Templating => AnyView::Templating(TemplatingView::new(base, settings)),
            ViewKind::Raw => AnyView::Raw(RawDocumentView::new(base)),
        }
    }
}

pub enum AnyView {
    Templating(TemplatingView),
    Raw(RawDocumentView),
}

impl View for AnyView {
    fn prepare(&mut self, response: &mut ViewResponse) -> Result<(), ViewError> {
        match self {
            AnyView::Templating(view) => view.prepare(response),
            AnyView::Raw(view) => view.prepare(response),
        }
    }

    fn dispatch(
        &mut self,
        response: &mut ViewResponse,
        data: ViewData,
        exceptions: &[&dyn ExceptionSummary],
    ) -> Result<(), ViewError> {
        match self {
            AnyView::Templating(view) => view.dispatch(response, data, exceptions),
            AnyView::Raw(view) => view.dispatch(response, data, exceptions),
        }
    }

    fn dispatch_exception(&mut self, response: &mut ViewResponse, data: ViewData) -> Result<(), ViewError> {
        match self {
            AnyView::Templating(view) => view.dispatch_exception(response, data),
            AnyView::Raw(view) => view.dispatch_exception(response, data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{SimpleRequest, StaticRoute, ViewAttributes};
    use serde_json::json;

    #[test]
    fn test_names_resolve() {
        assert_eq!("default".parse::<ViewKind>().unwrap(), ViewKind::Templating);
        assert_eq!("xsl".parse::<ViewKind>().unwrap(), ViewKind::Templating);
        assert_eq!("xml".parse::<ViewKind>().unwrap(), ViewKind::Raw);
        assert!(matches!("json".parse::<ViewKind>(), Err(ViewError::UnknownView(name)) if name == "json"));
    }

    #[test]
    fn test_any_view_delegates() {
        let route = StaticRoute::new(ViewAttributes::new());
        let base = ViewBase::new(&route, Box::new(SimpleRequest::new()));
        let mut view = ViewKind::Raw.create(base, Arc::new(Settings::default()));
        let mut response = ViewResponse::new(true);
        view.prepare(&mut response).unwrap();
        view.dispatch(&mut response, ViewData::Structured(json!({"ok": true})), &[])
            .unwrap();
        assert!(response.content().contains("<command><ok>true</ok></command>"));

        let base = ViewBase::new(&route, Box::new(SimpleRequest::new()));
        let mut view = ViewKind::Templating.create(base, Arc::new(Settings::default()));
        assert!(matches!(view.prepare(&mut response), Err(ViewError::ConfigurationMissing)));
    }
}
