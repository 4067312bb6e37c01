use wireline::http::headers::{HeaderError, HeaderTable};

fn parse_section(data: &[u8]) -> Result<(HeaderTable, usize), HeaderError> {
    let mut headers = HeaderTable::new();
    let mut offset = 0;
    loop {
        let (n, done) = headers.parse_field(&data[offset..])?;
        offset += n;
        if done || n == 0 {
            return Ok((headers, offset));
        }
    }
}

#[test]
fn test_set_folds_duplicates() {
    let mut headers = HeaderTable::new();
    headers.set("Host", "a");
    headers.set("Host", "b");

    assert_eq!(headers.get("HOST"), Some("a, b"));
    assert_eq!(headers.get("host"), Some("a, b"));
    assert_eq!(headers.len(), 1);
}

#[test]
fn test_get_missing() {
    let headers = HeaderTable::new();
    assert_eq!(headers.get("Missing"), None);
    assert!(!headers.contains("Missing"));
}

#[test]
fn test_delete_any_casing() {
    let mut headers = HeaderTable::new();
    headers.set("Content-Length", "42");
    headers.delete("CONTENT-length");

    assert_eq!(headers.get("Content-Length"), None);
    assert!(headers.is_empty());
}

#[test]
fn test_reset_replaces_folded_value() {
    let mut headers = HeaderTable::new();
    headers.set("Accept", "text/html");
    headers.set("Accept", "application/json");
    headers.reset("ACCEPT", "*/*");

    assert_eq!(headers.get("accept"), Some("*/*"));
}

#[test]
fn test_parse_section_with_duplicates() {
    let data = b"Host: localhost:42069\r\nAccept: text/html\r\naccept: image/png\r\n\r\nbody";
    let (headers, consumed) = parse_section(data).unwrap();

    assert_eq!(consumed, data.len() - b"body".len());
    assert_eq!(headers.get("Host"), Some("localhost:42069"));
    assert_eq!(headers.get("Accept"), Some("text/html, image/png"));
}

#[test]
fn test_parse_value_with_colons() {
    let (headers, _) = parse_section(b"Referer: http://example.com:8080/a\r\n\r\n").unwrap();

    assert_eq!(headers.get("referer"), Some("http://example.com:8080/a"));
}

#[test]
fn test_parse_empty_value() {
    let (headers, _) = parse_section(b"X-Empty:\r\n\r\n").unwrap();

    assert_eq!(headers.get("x-empty"), Some(""));
}

#[test]
fn test_parse_rejects_empty_name() {
    let mut headers = HeaderTable::new();
    let err = headers.parse_field(b": value\r\n\r\n").unwrap_err();

    assert!(matches!(err, HeaderError::InvalidName(_)));
}

#[test]
fn test_wire_round_trip() {
    let mut original = HeaderTable::new();
    original.set("Host", "localhost:42069");
    original.set("Content-Type", "text/plain");
    original.set("X-Request-Id", "abc-123");

    let wire = original.to_wire();
    assert!(wire.ends_with(b"\r\n\r\n"));

    let (parsed, consumed) = parse_section(&wire).unwrap();
    assert_eq!(consumed, wire.len());
    assert_eq!(parsed, original);
}

#[test]
fn test_wire_format_of_single_field() {
    let mut headers = HeaderTable::new();
    headers.set("Connection", "close");

    assert_eq!(headers.to_wire(), b"connection: close\r\n\r\n".to_vec());
}
