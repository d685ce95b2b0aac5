//! The response object views write into.

use crate::cookie::{Cookie, raw_url_encode};
use crate::transport::Transport;
use std::collections::HashMap;
use std::fmt;

/// Whether request processing continues after an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    /// The response is complete; nothing else may be written.
    Halt,
}

/// Persisted once the response content is final.
pub trait Session {
    fn commit(&mut self);
}

/// The request facts `redirect` needs.
#[derive(Debug, Clone, Default)]
pub struct RedirectOrigin {
    pub referer: Option<String>,
    pub port: u16,
    pub method: String,
}

/// An in-memory output capture scope.
#[derive(Debug, Default)]
pub struct Capture {
    buffer: String,
}

impl Capture {
    pub fn write(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    /// Captured length in bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn into_string(self) -> String {
        self.buffer
    }
}

/// Produces the action's result when it is first requested.
pub type DataProvider<D> = Box<dyn FnMut() -> Option<D>>;

/// HTTP response state, flushed into a [`Transport`] by [`Response::send`].
///
/// `D` is the type of the action result handed to the view.
pub struct Response<D = ()> {
    headers: Vec<(String, String)>,
    cookies: Vec<(String, String)>,
    content_type: Option<String>,
    charset: Option<String>,
    code: Option<u16>,
    content_length_output: bool,
    capture: Option<Capture>,
    content: String,
    session: Option<Box<dyn Session>>,
    view_params: HashMap<String, String>,
    input_data: Option<D>,
    data_provider: Option<DataProvider<D>>,
    base_location: String,
    sent: bool,
}

impl<D> fmt::Debug for Response<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("headers", &self.headers)
            .field("cookies", &self.cookies)
            .field("content_type", &self.content_type)
            .field("charset", &self.charset)
            .field("code", &self.code)
            .field("content_length_output", &self.content_length_output)
            .field("capture", &self.capture)
            .field("content", &self.content)
            .field("view_params", &self.view_params)
            .field("sent", &self.sent)
            .finish_non_exhaustive()
    }
}

impl<D> Default for Response<D> {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Sets `name` in an ordered map, keeping the position of an existing entry.
fn set_entry(entries: &mut Vec<(String, String)>, name: &str, value: String) {
    match entries.iter_mut().find(|(n, _)| n == name) {
        Some(entry) => entry.1 = value,
        None => entries.push((name.to_string(), value)),
    }
}

impl<D> Response<D> {
    /// A response with a capture scope open when `buffered`.
    pub fn new(buffered: bool) -> Self {
        Response {
            headers: Vec::new(),
            cookies: Vec::new(),
            content_type: None,
            charset: Some("utf-8".to_string()),
            code: None,
            content_length_output: false,
            capture: buffered.then(Capture::default),
            content: String::new(),
            session: None,
            view_params: HashMap::new(),
            input_data: None,
            data_provider: None,
            base_location: String::new(),
            sent: false,
        }
    }

    pub fn set_session(&mut self, session: Box<dyn Session>) {
        self.session = Some(session);
    }

    /// Where `redirect` goes when neither a target nor a referer is known.
    pub fn set_base_location(&mut self, location: impl Into<String>) {
        self.base_location = location.into();
    }

    /// Overwrites any header of the same name.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        set_entry(&mut self.headers, name, value.into());
    }

    /// All headers, including `Content-Type` when a content type is set.
    pub fn headers(&self) -> Vec<(String, String)> {
        let mut headers = self.headers.clone();
        if let Some(content_type) = &self.content_type {
            let value = match &self.charset {
                Some(charset) => format!("{}; charset={}", content_type, charset),
                None => content_type.clone(),
            };
            set_entry(&mut headers, "Content-Type", value);
        }
        headers
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.headers().into_iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Stores the cookie under its encoded name, replacing an earlier one.
    pub fn set_cookie(&mut self, name: &str, cookie: Cookie) {
        set_entry(&mut self.cookies, &raw_url_encode(name), cookie.render());
    }

    /// Encoded name to rendered attribute string.
    pub fn cookies(&self) -> &[(String, String)] {
        &self.cookies
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = Some(content_type.into());
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Only used together with a content type. `None` sends no charset.
    pub fn set_charset(&mut self, charset: Option<String>) {
        self.charset = charset;
    }

    pub fn set_code(&mut self, code: u16) {
        self.code = Some(code);
    }

    pub fn code(&self) -> Option<u16> {
        self.code
    }

    /// Sends `Content-Length` instead of chunked output and halts after `send`.
    pub fn set_content_length_output(&mut self, enabled: bool) {
        self.content_length_output = enabled;
    }

    pub fn is_content_length_output(&self) -> bool {
        self.content_length_output
    }

    /// Writes into the capture scope when one is open, else appends to the content.
    pub fn print(&mut self, text: &str) {
        match &mut self.capture {
            Some(capture) => capture.write(text),
            None => self.content.push_str(text),
        }
    }

    /// Closes the capture scope, appending what it captured, and returns all content.
    pub fn content(&mut self) -> &str {
        if let Some(capture) = self.capture.take() {
            self.content.push_str(&capture.into_string());
        }
        &self.content
    }

    /// Discards an open capture scope unread and replaces the content.
    pub fn set_content(&mut self, content: impl Into<String>) {
        if self.capture.take().is_some() {
            log::debug!("Discarding captured output");
        }
        self.content = content.into();
    }

    pub fn add_content(&mut self, content: &str) {
        self.content.push_str(content);
    }

    pub fn set_view_param(&mut self, key: &str, value: impl Into<String>) {
        self.view_params.insert(key.to_string(), value.into());
    }

    pub fn view_params(&self) -> &HashMap<String, String> {
        &self.view_params
    }

    pub fn set_input_data(&mut self, data: D) {
        self.input_data = Some(data);
    }

    /// Registers a provider asked for the data when none was set directly.
    pub fn set_data_provider(&mut self, provider: impl FnMut() -> Option<D> + 'static) {
        self.data_provider = Some(Box::new(provider));
    }

    fn control(&self) -> Control {
        if self.content_length_output {
            Control::Halt
        } else {
            Control::Continue
        }
    }

    fn commit_session(&mut self) {
        if let Some(session) = &mut self.session {
            session.commit();
        }
    }

    /// Emits status, headers, cookies and content, then commits the session.
    /// Header state is skipped when the transport already sent headers. Only the
    /// first call has an effect.
    pub fn send(&mut self, transport: &mut dyn Transport) -> Control {
        if self.sent {
            log::debug!("Response already sent");
            return self.control();
        }
        self.sent = true;

        if !transport.headers_sent() {
            if let Some(code) = self.code {
                transport.status(code);
            }
            for (name, value) in self.headers() {
                transport.header(&name, &value, true);
            }
            for (name, value) in &self.cookies {
                transport.header("Set-Cookie", &format!("{}={}", name, value), false);
            }
            if self.content_length_output {
                if let Some(capture) = &self.capture {
                    let length = capture.len() + self.content.len();
                    transport.header("Content-Length", &length.to_string(), true);
                }
            }
        }

        let content = self.content().to_string();
        if !content.is_empty() {
            transport.body(&content);
        }
        self.commit_session();
        self.control()
    }

    /// Redirects to `to`, or to the referer, or to the base location.
    ///
    /// A POST over a secure connection redirected to plain `http:` gets an HTML
    /// page that navigates instead of a `Location` header, so browsers do not warn.
    pub fn redirect(
        &mut self,
        origin: &RedirectOrigin,
        to: Option<&str>,
        status: u16,
        transport: &mut dyn Transport,
    ) -> Control {
        let target = match to {
            Some(to) => to.to_string(),
            None => origin.referer.clone().unwrap_or_else(|| self.base_location.clone()),
        };
        log::debug!("Redirecting to {} with status {}", target, status);

        if origin.port == 443 && origin.method == "POST" && target.starts_with("http:") {
            self.print(&format!(
                "<script type=\"text/javascript\">window.location.href=\"{}\";</script>\
                 <noscript><meta http-equiv=\"refresh\" content=\"0;url={}\" /></noscript>",
                escape_script_string(&target),
                escape_attribute(&target)
            ));
        } else {
            self.set_code(status);
            self.set_header("Location", target);
        }
        // `send` commits the session
        self.send(transport);
        Control::Halt
    }
}

fn escape_script_string(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '<' => escaped.push_str("\\x3C"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn escape_attribute(text: &str) -> String {
    text.replace('&', "&amp;").replace('"', "&quot;").replace('<', "&lt;")
}

impl<D: Clone> Response<D> {
    /// The action result: the data set directly, else whatever the provider yields.
    pub fn input_data(&mut self) -> Option<D> {
        if let Some(data) = &self.input_data {
            return Some(data.clone());
        }
        self.data_provider.as_mut().and_then(|provider| provider())
    }
}

impl<D> fmt::Write for Response<D> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.print(s);
        Ok(())
    }
}
