//! The sink a response is emitted into.

/// Receives the status line, headers and body of a response.
pub trait Transport {
    fn status(&mut self, code: u16);

    /// Emits a header. With `replace` an earlier header of the same name is dropped.
    fn header(&mut self, name: &str, value: &str, replace: bool);

    fn body(&mut self, content: &str);

    /// Whether header state can no longer be changed.
    fn headers_sent(&self) -> bool;
}

/// Records everything it receives. Headers count as sent once a body was written.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemoryTransport {
    pub status: Option<u16>,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first header called `name`, compared case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn header_values<'t>(&'t self, name: &'t str) -> impl Iterator<Item = &'t str> + 't {
        self.headers
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl Transport for MemoryTransport {
    fn status(&mut self, code: u16) {
        self.status = Some(code);
    }

    fn header(&mut self, name: &str, value: &str, replace: bool) {
        if replace {
            self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        }
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn body(&mut self, content: &str) {
        self.body.push_str(content);
    }

    fn headers_sent(&self) -> bool {
        !self.body.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_and_append_headers() {
        let mut transport = MemoryTransport::new();
        transport.header("Set-Cookie", "a=1", false);
        transport.header("Set-Cookie", "b=2", false);
        transport.header("X-Mode", "one", true);
        transport.header("x-mode", "two", true);
        assert_eq!(transport.header_values("set-cookie").collect::<Vec<_>>(), vec!["a=1", "b=2"]);
        assert_eq!(transport.header_value("X-Mode"), Some("two"));
        assert!(!transport.headers_sent());
        transport.body("hi");
        assert!(transport.headers_sent());
    }
}
