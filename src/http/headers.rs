//! Case-insensitive HTTP header storage with incremental field-line parsing.
//!
//! Field names are folded to lowercase on the way in, so every casing of a
//! name addresses the same entry. Repeated fields are combined into a single
//! comma-separated value.

use std::collections::HashMap;

use thiserror::Error;

const CRLF: &[u8] = b"\r\n";

/// Characters allowed in a field name besides ASCII letters and digits.
const TOKEN_SYMBOLS: &[u8] = b"!#$%&'*+-.^_`|~";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    #[error("field line has no colon separator: {0:?}")]
    MissingColon(String),
    #[error("field name contains whitespace: {0:?}")]
    WhitespaceInName(String),
    #[error("invalid field name: {0:?}")]
    InvalidName(String),
}

/// Header fields of a single request or response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderTable {
    fields: HashMap<String, String>,
}

impl HeaderTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses at most one field line from the front of `data`.
    ///
    /// Returns the number of bytes consumed and whether the blank line that
    /// ends the header section was reached:
    ///
    /// - `Ok((0, false))` when no complete line is buffered yet,
    /// - `Ok((2, true))` when `data` starts with the terminating blank line,
    /// - `Ok((n, false))` after folding one field into the table, where `n`
    ///   includes the line terminator.
    ///
    /// A malformed line is an error and nothing is consumed.
    pub fn parse_field(&mut self, data: &[u8]) -> Result<(usize, bool), HeaderError> {
        let Some(idx) = find_crlf(data) else {
            return Ok((0, false));
        };
        if idx == 0 {
            return Ok((CRLF.len(), true));
        }

        // obs-text in values is kept as U+FFFD; names must be ASCII tokens
        let line = String::from_utf8_lossy(&data[..idx]);
        let (name, value) = split_field_line(&line)?;
        self.set(name, value);

        Ok((idx + CRLF.len(), false))
    }

    /// Adds a field, folding it into an existing value as `"old, new"`.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        self.fields
            .entry(name.to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }

    /// Replaces any existing value for `name`.
    pub fn reset(&mut self, name: &str, value: impl Into<String>) {
        self.fields.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn delete(&mut self, name: &str) {
        self.fields.remove(&name.to_ascii_lowercase());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(&name.to_ascii_lowercase())
    }

    /// Iterates over `(lowercase name, value)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Serializes the table as a header section: one `name: value\r\n` line
    /// per field followed by the blank line.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for (name, value) in self.iter() {
            buf.extend_from_slice(name.as_bytes());
            buf.extend_from_slice(b": ");
            buf.extend_from_slice(value.as_bytes());
            buf.extend_from_slice(CRLF);
        }
        buf.extend_from_slice(CRLF);
        buf
    }
}

pub(crate) fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(CRLF.len()).position(|w| w == CRLF)
}

fn split_field_line(line: &str) -> Result<(&str, &str), HeaderError> {
    let line = line.trim();
    let (name, value) = line
        .split_once(':')
        .ok_or_else(|| HeaderError::MissingColon(line.to_string()))?;

    if name.chars().any(char::is_whitespace) {
        return Err(HeaderError::WhitespaceInName(name.to_string()));
    }
    if !is_valid_field_name(name) {
        return Err(HeaderError::InvalidName(name.to_string()));
    }

    Ok((name, value.trim()))
}

pub fn is_valid_field_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || TOKEN_SYMBOLS.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_field() {
        let mut headers = HeaderTable::new();
        let (n, done) = headers.parse_field(b"Host: localhost:42069\r\n\r\n").unwrap();

        assert_eq!(headers.get("host"), Some("localhost:42069"));
        assert_eq!(n, 23);
        assert!(!done);
    }

    #[test]
    fn folds_name_to_lowercase() {
        let mut headers = HeaderTable::new();
        let (n, _) = headers.parse_field(b"HOST: localhost:42069\r\n\r\n").unwrap();

        assert_eq!(headers.get("host"), Some("localhost:42069"));
        assert_eq!(n, 23);
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let mut headers = HeaderTable::new();
        let data = b"Host: localhost:42069  \r\n HX-Request: true \r\n\r\n";

        let (n, done) = headers.parse_field(data).unwrap();
        assert_eq!(n, 25);
        assert!(!done);

        let (m, done) = headers.parse_field(&data[n..]).unwrap();
        assert_eq!(m, 20);
        assert!(!done);

        assert_eq!(headers.get("host"), Some("localhost:42069"));
        assert_eq!(headers.get("hx-request"), Some("true"));
    }

    #[test]
    fn blank_line_ends_section() {
        let mut headers = HeaderTable::new();
        assert_eq!(headers.parse_field(b"\r\n").unwrap(), (2, true));
        assert!(headers.is_empty());
    }

    #[test]
    fn partial_line_needs_more_data() {
        let mut headers = HeaderTable::new();
        assert_eq!(headers.parse_field(b"Host: local").unwrap(), (0, false));
        assert!(headers.is_empty());
    }

    #[test]
    fn repeated_fields_are_folded() {
        let mut headers = HeaderTable::new();
        let data = b"Set-Person: lane-loves-go\r\nSet-Person: prime-loves-zig\r\nSet-Person: tj-loves-ocaml\r\n\r\n";

        let mut offset = 0;
        loop {
            let (n, done) = headers.parse_field(&data[offset..]).unwrap();
            offset += n;
            if done {
                break;
            }
        }

        assert_eq!(offset, data.len());
        assert_eq!(
            headers.get("set-person"),
            Some("lane-loves-go, prime-loves-zig, tj-loves-ocaml")
        );
    }

    #[test]
    fn rejects_space_before_colon() {
        let mut headers = HeaderTable::new();
        let err = headers
            .parse_field(b"       Host : localhost:42069       \r\n\r\n")
            .unwrap_err();

        assert_eq!(err, HeaderError::WhitespaceInName("Host ".to_string()));
        assert!(headers.is_empty());
    }

    #[test]
    fn rejects_non_token_name() {
        let mut headers = HeaderTable::new();
        let err = headers
            .parse_field("H©st: localhost:42069\r\n\r\n".as_bytes())
            .unwrap_err();

        assert!(matches!(err, HeaderError::InvalidName(_)));
    }

    #[test]
    fn accepts_obs_text_in_value() {
        let mut headers = HeaderTable::new();
        let data = b"X-Name: caf\xe9\r\n\r\n";
        let (n, done) = headers.parse_field(data).unwrap();

        assert_eq!(n, 14);
        assert!(!done);
        assert_eq!(headers.get("x-name"), Some("caf\u{fffd}"));
    }

    #[test]
    fn rejects_non_ascii_byte_in_name() {
        let mut headers = HeaderTable::new();
        let err = headers.parse_field(b"H\xe9st: localhost\r\n\r\n").unwrap_err();

        assert!(matches!(err, HeaderError::InvalidName(_)));
        assert!(headers.is_empty());
    }

    #[test]
    fn rejects_line_without_colon() {
        let mut headers = HeaderTable::new();
        let err = headers.parse_field(b"BrokenHeader\r\n\r\n").unwrap_err();

        assert!(matches!(err, HeaderError::MissingColon(_)));
    }

    #[test]
    fn reset_overwrites_instead_of_folding() {
        let mut headers = HeaderTable::new();
        headers.set("Content-Type", "text/plain");
        headers.reset("content-type", "text/html");

        assert_eq!(headers.get("Content-Type"), Some("text/html"));
    }

    #[test]
    fn token_symbols_are_valid_names() {
        assert!(is_valid_field_name("X-Custom_Header.v1~!#$%&'*+^`|"));
        assert!(!is_valid_field_name(""));
        assert!(!is_valid_field_name("X(Bad)"));
    }
}
