//! The request and routing facts a view reads.

use std::collections::{BTreeMap, HashMap};

/// The incoming request as far as views are concerned.
pub trait Request {
    fn param(&self, name: &str) -> Option<&str>;
    fn client_ip(&self) -> &str;
    /// The language the response should be localized to.
    fn lang(&self) -> &str;
}

/// The matched route.
pub trait Routing {
    fn view_attributes(&self) -> ViewAttributes;
}

/// View attributes of a route: plain string attributes (`theme`, `css`, `xsl`,
/// `view`, `contenttype`, `encoding`, `passdom`) plus `xslproc`, the extra
/// transformation parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewAttributes {
    pub attributes: HashMap<String, String>,
    pub xslproc: BTreeMap<String, String>,
}

impl ViewAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    pub fn with_param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.xslproc.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// A route whose view attributes are fixed up front.
#[derive(Debug, Clone, Default)]
pub struct StaticRoute {
    attributes: ViewAttributes,
}

impl StaticRoute {
    pub fn new(attributes: ViewAttributes) -> Self {
        StaticRoute { attributes }
    }
}

impl Routing for StaticRoute {
    fn view_attributes(&self) -> ViewAttributes {
        self.attributes.clone()
    }
}

/// A request assembled in memory.
#[derive(Debug, Clone)]
pub struct SimpleRequest {
    params: HashMap<String, String>,
    client_ip: String,
    lang: String,
}

impl Default for SimpleRequest {
    fn default() -> Self {
        SimpleRequest {
            params: HashMap::new(),
            client_ip: "127.0.0.1".to_string(),
            lang: "en".to_string(),
        }
    }
}

impl SimpleRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    pub fn with_client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = ip.into();
        self
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }
}

impl Request for SimpleRequest {
    fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    fn client_ip(&self) -> &str {
        &self.client_ip
    }

    fn lang(&self) -> &str {
        &self.lang
    }
}
