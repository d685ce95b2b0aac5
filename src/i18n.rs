//! Message-catalog localization of result documents.
//!
//! Two markers are recognized, with any prefix bound to [`I18N_NAMESPACE`]:
//! `<i18n:text key="k">fallback</i18n:text>` is replaced by the message for
//! `k` (or by the fallback), and `i18n:attr="title alt"` translates the listed
//! attributes by value. Namespace declarations and `i18n:attr` markers are left
//! in place; the templating view strips them from HTML output.

use crate::error::ViewError;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use vista_dom::{Document, NodeId};

pub const I18N_NAMESPACE: &str = "http://apache.org/cocoon/i18n/2.1";

/// Localizes a document in place.
pub trait Translator: Send + Sync {
    fn translate(&self, lang: &str, document: &mut Document);
}

/// Per-language message maps.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    languages: HashMap<String, HashMap<String, String>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads every `{lang}.json` file in `dir`; each holds a flat object of
    /// key to message.
    pub fn from_dir(dir: &Path) -> Result<Self, ViewError> {
        let mut catalog = Catalog::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(lang) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let messages: HashMap<String, String> = serde_json::from_str(&fs::read_to_string(&path)?)?;
            log::debug!("Loaded {} messages for '{}' from {}", messages.len(), lang, path.display());
            catalog.languages.insert(lang.to_string(), messages);
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, lang: &str, key: &str, message: impl Into<String>) {
        self.languages
            .entry(lang.to_string())
            .or_default()
            .insert(key.to_string(), message.into());
    }

    /// The message for `key` in `lang`, falling back from a regional language
    /// such as `de_CH` to `de`.
    pub fn message(&self, lang: &str, key: &str) -> Option<&str> {
        let lookup = |lang: &str| {
            self.languages
                .get(lang)
                .and_then(|m| m.get(key))
                .map(String::as_str)
        };
        lookup(lang).or_else(|| {
            let (base, _) = lang.split_once(['_', '-'])?;
            lookup(base)
        })
    }
}

impl Translator for Catalog {
    fn translate(&self, lang: &str, document: &mut Document) {
        let mut texts = Vec::new();
        let mut attributes = Vec::new();

        for id in document.descendants(document.root()) {
            let Some(element) = document.element(id) else {
                continue;
            };
            if element.local_name() == "text" && is_i18n_prefix(document, id, element.prefix()) {
                texts.push(id);
            }
            let marker = element.attributes.iter().find(|a| {
                a.name
                    .split_once(':')
                    .is_some_and(|(prefix, local)| local == "attr" && is_i18n_prefix(document, id, Some(prefix)))
            });
            if let Some(marker) = marker {
                let names: Vec<String> = marker.value.split_whitespace().map(str::to_string).collect();
                attributes.push((id, names));
            }
        }

        for (id, names) in attributes {
            for name in names {
                let Some(value) = document.attribute(id, &name) else {
                    continue;
                };
                if let Some(message) = self.message(lang, value) {
                    let message = message.to_string();
                    document.set_attribute(id, &name, message);
                }
            }
        }

        for id in texts {
            let fallback = document.text_content(id);
            let key = document
                .attribute(id, "key")
                .map(str::to_string)
                .unwrap_or_else(|| fallback.trim().to_string());
            let text = match self.message(lang, &key) {
                Some(message) => message.to_string(),
                None => {
                    log::debug!("No '{}' message for '{}'", lang, key);
                    fallback
                }
            };
            document.replace_with_text(id, &text);
        }
    }
}

/// Whether `prefix` is bound to the i18n namespace at `id`. Undeclared
/// `i18n`, `i18n1`, ... prefixes count as bound.
fn is_i18n_prefix(document: &Document, id: NodeId, prefix: Option<&str>) -> bool {
    let Some(prefix) = prefix else {
        return false;
    };
    let declaration = format!("xmlns:{}", prefix);
    let mut current = Some(id);
    while let Some(node) = current {
        if let Some(uri) = document.attribute(node, &declaration) {
            return uri == I18N_NAMESPACE;
        }
        current = document.parent(node);
    }
    prefix
        .strip_prefix("i18n")
        .is_some_and(|rest| rest.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.insert("de", "greeting", "Hallo");
        catalog.insert("de", "Close", "Schliessen");
        catalog
    }

    fn body(doc: &Document) -> String {
        doc.node_to_xml(doc.root())
    }

    #[test]
    fn test_text_replaced_by_message_or_fallback() {
        let mut doc = Document::parse(
            r#"<p xmlns:t="http://apache.org/cocoon/i18n/2.1"><t:text key="greeting">Hello</t:text>, <t:text>World</t:text></p>"#,
        )
        .unwrap();
        catalog().translate("de_CH", &mut doc);
        assert_eq!(
            body(&doc),
            r#"<p xmlns:t="http://apache.org/cocoon/i18n/2.1">Hallo, World</p>"#
        );
    }

    #[test]
    fn test_attributes_translated_by_value() {
        let mut doc = Document::parse(
            r#"<a xmlns:i18n="http://apache.org/cocoon/i18n/2.1" title="Close" alt="Open" i18n:attr="title alt"/>"#,
        )
        .unwrap();
        catalog().translate("de", &mut doc);
        let root = doc.document_element().unwrap();
        assert_eq!(doc.attribute(root, "title"), Some("Schliessen"));
        assert_eq!(doc.attribute(root, "alt"), Some("Open"));
        assert_eq!(doc.attribute(root, "i18n:attr"), Some("title alt"));
    }

    #[test]
    fn test_other_namespaces_untouched() {
        let source = r#"<p xmlns:i18n="urn:other"><i18n:text key="greeting">Hello</i18n:text></p>"#;
        let mut doc = Document::parse(source).unwrap();
        catalog().translate("de", &mut doc);
        assert_eq!(body(&doc), source);
    }

    #[test]
    fn test_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("fr.json"), r#"{"greeting": "Bonjour"}"#).unwrap();
        fs::write(dir.path().join("README"), "ignored").unwrap();
        let catalog = Catalog::from_dir(dir.path()).unwrap();
        assert_eq!(catalog.message("fr", "greeting"), Some("Bonjour"));
        assert_eq!(catalog.message("en", "greeting"), None);

        fs::write(dir.path().join("it.json"), "[1, 2]").unwrap();
        assert!(matches!(Catalog::from_dir(dir.path()), Err(ViewError::Json(_))));
    }
}
