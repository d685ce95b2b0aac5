use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Who may see the intermediate document through `?XML=1`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DumpPolicy {
    Enabled(bool),
    /// Client IP wildcards; `*` matches any run of characters, `?` exactly one.
    Clients(Vec<String>),
}

impl Default for DumpPolicy {
    fn default() -> Self {
        DumpPolicy::Enabled(false)
    }
}

impl DumpPolicy {
    pub fn allows(&self, client_ip: &str) -> bool {
        match self {
            DumpPolicy::Enabled(enabled) => *enabled,
            DumpPolicy::Clients(patterns) => patterns.iter().any(|p| match_wildcard(p, client_ip)),
        }
    }
}

/// Shell-style wildcard match over the whole of `text`.
pub fn match_wildcard(pattern: &str, text: &str) -> bool {
    let mut expression = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => expression.push_str(".*"),
            '?' => expression.push('.'),
            other => expression.push_str(&regex::escape(&other.to_string())),
        }
    }
    expression.push('$');
    match Regex::new(&expression) {
        Ok(re) => re.is_match(text),
        Err(e) => {
            log::warn!("Ignoring wildcard pattern '{}': {}", pattern, e);
            false
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root of the theme directories holding the stylesheets.
    pub themes_dir: PathBuf,
    pub project_dir: PathBuf,
    pub webroot: String,
    pub webroot_static: String,
    pub mountpath: String,
    /// Scheme and host redirects fall back to, e.g. `https://example.org`.
    pub host: String,
    pub allow_dom_dump: DumpPolicy,
    /// Directory of `{lang}.json` message catalogs.
    pub i18n_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            themes_dir: PathBuf::from("themes"),
            project_dir: PathBuf::from("."),
            webroot: "/".to_string(),
            webroot_static: "/static/".to_string(),
            mountpath: "/".to_string(),
            host: String::new(),
            allow_dom_dump: DumpPolicy::default(),
            i18n_dir: None,
        }
    }
}

impl Settings {
    /// Loads settings from an optional TOML file with `VISTA__*` environment
    /// variables layered on top. Missing keys keep their defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        Self::load_from(path, None)
    }

    fn load_from(
        path: Option<&Path>,
        environment: Option<config::Map<String, String>>,
    ) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // An explicit VISTA_CONFIG wins over the path handed in
        let env_path = std::env::var("VISTA_CONFIG").ok().filter(|p| !p.is_empty());
        if let Some(file) = env_path.as_deref().map(Path::new).or(path) {
            log::debug!("Loading settings from {}", file.display());
            builder = builder.add_source(config::File::from(file));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("VISTA")
                .separator("__")
                .try_parsing(true)
                .source(environment),
        );

        let mut settings: Settings = builder.build()?.try_deserialize()?;
        settings.resolve_paths(env_path.as_deref().map(Path::new).or(path));
        Ok(settings)
    }

    /// Relative directories are taken relative to the settings file.
    fn resolve_paths(&mut self, file: Option<&Path>) {
        let Some(base) = file.and_then(Path::parent) else {
            return;
        };
        if self.themes_dir.is_relative() {
            self.themes_dir = base.join(&self.themes_dir);
        }
        if self.project_dir.is_relative() {
            self.project_dir = base.join(&self.project_dir);
        }
        if let Some(dir) = &self.i18n_dir {
            if dir.is_relative() {
                self.i18n_dir = Some(base.join(dir));
            }
        }
    }

    /// Where redirects without a target and without a referer go.
    pub fn base_location(&self) -> String {
        format!("{}{}", self.host.trim_end_matches('/'), self.mountpath)
    }
}
