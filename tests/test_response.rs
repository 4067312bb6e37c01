use wireline::http::response::{default_headers, StatusCode};

#[test]
fn test_status_code_as_u16() {
    assert_eq!(StatusCode::OK.as_u16(), 200);
    assert_eq!(StatusCode::BAD_REQUEST.as_u16(), 400);
    assert_eq!(StatusCode::INTERNAL_SERVER_ERROR.as_u16(), 500);
    assert_eq!(StatusCode::from(418).as_u16(), 418);
}

#[test]
fn test_status_code_reason_phrase() {
    assert_eq!(StatusCode::OK.reason_phrase(), "OK");
    assert_eq!(StatusCode::BAD_REQUEST.reason_phrase(), "Bad Request");
    assert_eq!(
        StatusCode::INTERNAL_SERVER_ERROR.reason_phrase(),
        "Internal Server Error"
    );
}

#[test]
fn test_unknown_status_code_has_empty_reason() {
    for code in [201, 204, 404, 502] {
        assert_eq!(StatusCode::new(code).reason_phrase(), "");
    }
}

#[test]
fn test_default_headers() {
    let headers = default_headers(42);

    assert_eq!(headers.len(), 3);
    assert_eq!(headers.get("Content-Length"), Some("42"));
    assert_eq!(headers.get("Connection"), Some("close"));
    assert_eq!(headers.get("Content-Type"), Some("text/plain"));
}

#[test]
fn test_default_headers_empty_body() {
    let headers = default_headers(0);

    assert_eq!(headers.get("content-length"), Some("0"));
}

#[test]
fn test_default_headers_can_be_overridden() {
    let mut headers = default_headers(10);
    headers.reset("Content-Type", "text/html");

    assert_eq!(headers.get("Content-Type"), Some("text/html"));
    assert_eq!(headers.len(), 3);
}
