//! The view that renders results through a theme's XSLT stylesheet.

use super::{View, ViewBase, ViewData, ViewResponse, build_document, set_xml_headers};
use crate::error::{ExceptionSummary, ViewError};
use crate::settings::Settings;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use vista_dom::Document;
use vista_xslt::{Diagnostic, Processor, Stylesheet};

const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";
/// Browsers render a dumped document as a tree only without the XHTML namespace.
const DUMP_NAMESPACE: &str = "http://www.w3.org/1999/xhtml#trickMozillaDisplay";

const DEFAULT_ATTRIBUTES: [(&str, &str); 4] = [
    ("theme", "default"),
    ("css", "default"),
    ("view", "default"),
    ("passdom", "no"),
];

/// Substitutions applied in order to serialized HTML output.
static CLEANUPS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"^<\?xml.*\?>", ""),
        (r"<!\[CDATA\[\W*\]\]>", ""),
        (r"(<script[^>]*>)\W*<!\[CDATA\[", "$1"),
        (r"\]\]>\W*(</script>)", "$1"),
        (r"(<style[^>]*>)\W*<!\[CDATA\[", "$1"),
        (r"\]\]>\W*(</style>)", "$1"),
        (r#"(<[^>]*)xmlns="""#, "$1"),
        (r#"(<[^>]*)xmlns:i18n[0-9]*="http://apache\.org/cocoon/i18n/2\.1""#, "$1"),
        (r#"(<[^>]*)i18n[0-9]*:attr="[^"]+""#, "$1"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| {
        (
            Regex::new(pattern).expect("BUG: invalid output cleanup pattern"),
            replacement,
        )
    })
    .collect()
});

/// Strips what browsers trip over from serialized markup: the XML declaration,
/// empty and script/style-wrapping CDATA sections, empty default namespace
/// declarations and i18n leftovers. The result is trimmed.
pub fn clean_output(xml: &str) -> String {
    let mut output = xml.to_string();
    for (pattern, replacement) in CLEANUPS.iter() {
        output = pattern.replace_all(&output, *replacement).into_owned();
    }
    output.trim().to_string()
}

enum Prepared {
    Transform(Processor),
    /// `?XML=1`: the intermediate document is written instead.
    Dump,
}

/// Loads `{themes_dir}/{theme}/{xsl}` in [`prepare`](View::prepare) and writes
/// the transformed, localized and cleaned result in [`dispatch`](View::dispatch).
pub struct TemplatingView {
    base: ViewBase,
    settings: Arc<Settings>,
    state: Option<Prepared>,
    omit_declaration: bool,
    template_path: PathBuf,
    diagnostics: Vec<Diagnostic>,
}

impl TemplatingView {
    pub fn new(base: ViewBase, settings: Arc<Settings>) -> Self {
        TemplatingView {
            base,
            settings,
            state: None,
            omit_declaration: true,
            template_path: PathBuf::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Whether output goes through [`clean_output`]. On by default.
    pub fn set_omit_declaration(&mut self, omit: bool) {
        self.omit_declaration = omit;
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_some()
    }

    pub fn is_dump_mode(&self) -> bool {
        matches!(self.state, Some(Prepared::Dump))
    }

    pub fn template_path(&self) -> &Path {
        &self.template_path
    }

    /// Diagnostics of the last transformation.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn processor(&self) -> Option<&Processor> {
        match &self.state {
            Some(Prepared::Transform(processor)) => Some(processor),
            _ => None,
        }
    }

    fn dump_requested(&self) -> bool {
        let request = self.base.request();
        request.param("XML") == Some("1") && self.settings.allow_dom_dump.allows(request.client_ip())
    }

    fn load_processor(&self) -> Result<Processor, ViewError> {
        let path = &self.template_path;
        if !path.is_file() {
            return Err(ViewError::TemplateNotFound { path: path.clone() });
        }
        let stylesheet = Stylesheet::load(path).map_err(|e| ViewError::TemplateParse {
            path: path.clone(),
            message: e.to_string(),
        })?;
        Ok(Processor::new(Arc::new(stylesheet)))
    }

    fn dump(&self, response: &mut ViewResponse, document: Option<&Document>) {
        set_xml_headers(response);
        if let Some(document) = document {
            response.print(&document.to_xml().replace(XHTML_NAMESPACE, DUMP_NAMESPACE));
        }
    }
}

impl View for TemplatingView {
    fn prepare(&mut self, response: &mut ViewResponse) -> Result<(), ViewError> {
        self.diagnostics.clear();
        self.state = None;

        let routed = self.base.attributes().clone();
        let mut attributes: HashMap<String, String> = DEFAULT_ATTRIBUTES
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        attributes.extend(routed.attributes.clone());
        attributes.extend(response.view_params().clone());

        let explicit_view = routed
            .get("view")
            .or_else(|| response.view_params().get("view").map(String::as_str));
        let identifier = match attributes.get("xsl").map(String::as_str).or(explicit_view) {
            Some(identifier) if !identifier.is_empty() => identifier.to_string(),
            _ => return Err(ViewError::ConfigurationMissing),
        };

        match attributes.get("contenttype").filter(|v| !v.is_empty()) {
            Some(content_type) => response.set_content_type(content_type.clone()),
            None => response.set_content_type("text/html"),
        }
        if let Some(encoding) = attributes.get("encoding").filter(|v| !v.is_empty()) {
            response.set_charset(Some(encoding.clone()));
        }

        let theme = attributes
            .get("theme")
            .filter(|t| !t.is_empty())
            .map_or("default", String::as_str);
        self.template_path = self.settings.themes_dir.join(theme).join(&identifier);

        if self.dump_requested() {
            log::debug!("Dumping the view document instead of applying {}", self.template_path.display());
            set_xml_headers(response);
            self.state = Some(Prepared::Dump);
            return Ok(());
        }

        let mut processor = self.load_processor()?;
        let settings = &self.settings;
        processor.set_parameter("webroot", settings.webroot.as_str());
        processor.set_parameter("webrootStatic", settings.webroot_static.as_str());
        processor.set_parameter("mountpath", settings.mountpath.as_str());
        processor.set_parameter("theme", theme);
        processor.set_parameter("themeCss", attributes.get("css").map_or("default", String::as_str));
        processor.set_parameter("lang", self.base.request().lang());
        processor.set_parameter("projectDir", settings.project_dir.display().to_string());
        for (name, value) in &routed.xslproc {
            processor.set_parameter(name, value.as_str());
        }

        log::debug!("Prepared template {}", self.template_path.display());
        self.state = Some(Prepared::Transform(processor));
        Ok(())
    }

    fn dispatch(
        &mut self,
        response: &mut ViewResponse,
        data: ViewData,
        exceptions: &[&dyn ExceptionSummary],
    ) -> Result<(), ViewError> {
        if self.state.is_none() {
            self.prepare(response)?;
        }

        let document = build_document(data, exceptions)?;
        let processor = match &self.state {
            Some(Prepared::Transform(processor)) => processor,
            _ => {
                self.dump(response, document.as_ref());
                return Ok(());
            }
        };
        let Some(document) = document else {
            log::debug!("No view data; nothing to transform");
            return Ok(());
        };

        let transformation = processor.transform(&document);
        let success = transformation.is_success();
        self.diagnostics = transformation.diagnostics;

        match transformation.document {
            Some(mut result) if success => {
                let lang = self.base.request().lang().to_string();
                self.base.transform_i18n(&lang, &mut result);
                self.base.set_headers(response);
                let mut output = processor.serialize(&result);
                if self.omit_declaration {
                    output = clean_output(&output);
                }
                response.print(&output);
                Ok(())
            }
            _ => {
                log::warn!(
                    "Transformation with {} failed with {} diagnostics",
                    self.template_path.display(),
                    self.diagnostics.len()
                );
                Err(ViewError::TransformParse {
                    path: self.template_path.clone(),
                    diagnostics: self.diagnostics.clone(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_declaration_and_trims() {
        assert_eq!(clean_output("<?xml version=\"1.0\"?>\n<html/>\n"), "<html/>");
    }

    #[test]
    fn test_strips_cdata_around_scripts_and_styles() {
        let input = "<p><![CDATA[ ]]></p><script type=\"text/javascript\">\n<![CDATA[\nvar a = 1;\n]]>\n</script>\
                     <style><![CDATA[p {}]]></style>";
        assert_eq!(
            clean_output(input),
            "<p></p><script type=\"text/javascript\">\nvar a = 1;\n</script><style>p {}</style>"
        );
    }

    #[test]
    fn test_strips_namespace_leftovers() {
        let input = r#"<div xmlns="" class="a"><a xmlns:i18n2="http://apache.org/cocoon/i18n/2.1" title="t" i18n2:attr="title">x</a></div>"#;
        assert_eq!(clean_output(input), r#"<div  class="a"><a  title="t" >x</a></div>"#);
    }

    #[test]
    fn test_keeps_other_declarations() {
        let input = r#"<html xmlns="http://www.w3.org/1999/xhtml" xmlns:x="urn:x"/>"#;
        assert_eq!(clean_output(input), input);
    }
}
