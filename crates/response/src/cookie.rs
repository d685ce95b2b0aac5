//! Cookie attributes and their `Set-Cookie` rendering.

use chrono::DateTime;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Everything but the RFC 3986 unreserved characters.
const RAW_URL: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

pub fn raw_url_encode(text: &str) -> String {
    utf8_percent_encode(text, RAW_URL).to_string()
}

/// A cookie to set. `expire` is a Unix timestamp; zero means a session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub value: String,
    pub expire: i64,
    pub path: String,
    pub domain: String,
    pub secure: bool,
    pub http_only: bool,
}

impl Default for Cookie {
    fn default() -> Self {
        Cookie {
            value: String::new(),
            expire: 0,
            path: String::new(),
            domain: String::new(),
            secure: false,
            http_only: true,
        }
    }
}

impl Cookie {
    pub fn new(value: impl Into<String>) -> Self {
        Cookie {
            value: value.into(),
            ..Cookie::default()
        }
    }

    pub fn expire(mut self, timestamp: i64) -> Self {
        self.expire = timestamp;
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// The part of `Set-Cookie` after `name=`:
    /// `value[; Domain=..][; expires=..][; Path=..][; Secure][; HttpOnly]`.
    pub fn render(&self) -> String {
        let mut out = raw_url_encode(&self.value);
        if !self.domain.is_empty() {
            out.push_str("; Domain=");
            out.push_str(&self.domain);
        }
        if let Some(expires) = format_expiry(self.expire) {
            out.push_str("; expires=");
            out.push_str(&expires);
        }
        if !self.path.is_empty() {
            out.push_str("; Path=");
            out.push_str(&self.path);
        }
        if self.secure {
            out.push_str("; Secure");
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        out
    }
}

/// `Www, dd-Mon-YYYY HH:MM:SS GMT`, or `None` for zero and out-of-range timestamps.
fn format_expiry(timestamp: i64) -> Option<String> {
    if timestamp == 0 {
        return None;
    }
    let date = DateTime::from_timestamp(timestamp, 0)?;
    Some(date.format("%a, %d-%b-%Y %H:%M:%S GMT").to_string())
}
