use std::fmt;

use crate::http::headers::HeaderTable;

/// The first line of an HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    /// Request method, all uppercase ASCII letters (e.g. "GET")
    pub method: String,
    /// Request target exactly as it appeared on the wire (e.g. "/index.html?q=1")
    pub target: String,
    /// HTTP version without the scheme; always "1.1"
    pub version: String,
}

/// A fully parsed HTTP request.
///
/// Requests are only handed out by the parser once every declared body byte
/// has arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub request_line: RequestLine,
    pub headers: HeaderTable,
    pub body: Vec<u8>,
}

impl Request {
    pub fn method(&self) -> &str {
        &self.request_line.method
    }

    pub fn target(&self) -> &str {
        &self.request_line.target
    }

    /// Retrieves a header value by name, ignoring case.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    /// Returns the declared Content-Length, or 0 if missing or not a number.
    pub fn content_length(&self) -> usize {
        self.header("Content-Length")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Request line:")?;
        writeln!(f, "- Method: {}", self.request_line.method)?;
        writeln!(f, "- Target: {}", self.request_line.target)?;
        writeln!(f, "- Version: {}", self.request_line.version)?;
        if self.headers.is_empty() {
            return Ok(());
        }

        let mut fields: Vec<_> = self.headers.iter().collect();
        fields.sort_unstable();
        writeln!(f, "Headers:")?;
        for (key, value) in fields {
            writeln!(f, "- {}: {}", key, value)?;
        }
        if self.body.is_empty() {
            return Ok(());
        }

        writeln!(f, "Body:")?;
        writeln!(f, "{}", String::from_utf8_lossy(&self.body))
    }
}
