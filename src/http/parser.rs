//! Incremental HTTP/1.1 request parser.
//!
//! The parser is fed whatever bytes a read happened to deliver and reports
//! how many of them it consumed. A return of zero means "need more input";
//! the caller keeps the unconsumed tail and appends to it on the next read.
//!
//! ```text
//! AwaitingRequestLine ──► AwaitingHeaders ──► AwaitingBody ──► Complete
//! ```

use bytes::{Buf, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use crate::http::headers::{find_crlf, HeaderError, HeaderTable};
use crate::http::request::{Request, RequestLine};

const CRLF_LEN: usize = 2;
const INITIAL_BUFFER_SIZE: usize = 1024;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed request line: {0:?}")]
    MalformedRequestLine(String),
    #[error("method is not uppercase letters: {0:?}")]
    InvalidMethod(String),
    #[error("unsupported HTTP version: {0:?}")]
    UnsupportedVersion(String),
    #[error("invalid header: {0}")]
    Header(#[from] HeaderError),
    #[error("invalid content-length value: {0:?}")]
    InvalidContentLength(String),
    #[error("body length {actual} exceeds declared content-length {declared}")]
    BodyLengthMismatch { declared: usize, actual: usize },
    #[error("stream ended before the request was complete")]
    Incomplete,
    #[error("parse attempted on a completed request")]
    AlreadyComplete,
    #[error("i/o error while reading request: {0}")]
    Io(#[from] std::io::Error),
}

impl ParseError {
    /// True for errors caused by the bytes the peer sent, as opposed to the
    /// transport failing underneath us.
    pub fn is_malformed_input(&self) -> bool {
        !matches!(self, ParseError::Io(_) | ParseError::AlreadyComplete)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    AwaitingRequestLine,
    AwaitingHeaders,
    AwaitingBody,
    Complete,
}

/// Accumulates a request across any number of `parse` calls.
#[derive(Debug)]
pub struct RequestParser {
    state: ParserState,
    request_line: Option<RequestLine>,
    headers: HeaderTable,
    body: Vec<u8>,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::AwaitingRequestLine,
            request_line: None,
            headers: HeaderTable::new(),
            body: Vec::new(),
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == ParserState::Complete
    }

    /// Advances through as many states as `data` allows and returns the
    /// number of bytes consumed.
    pub fn parse(&mut self, data: &[u8]) -> Result<usize, ParseError> {
        if self.is_complete() {
            return Err(ParseError::AlreadyComplete);
        }

        let mut total = 0;
        while !self.is_complete() {
            let consumed = self.parse_single(&data[total..])?;
            if consumed == 0 {
                break;
            }
            total += consumed;
        }

        Ok(total)
    }

    /// Hands out the finished request, or `Incomplete` if parsing has not
    /// reached the end of the body yet.
    pub fn finish(self) -> Result<Request, ParseError> {
        match (self.state, self.request_line) {
            (ParserState::Complete, Some(request_line)) => Ok(Request {
                request_line,
                headers: self.headers,
                body: self.body,
            }),
            _ => Err(ParseError::Incomplete),
        }
    }

    fn parse_single(&mut self, data: &[u8]) -> Result<usize, ParseError> {
        match self.state {
            ParserState::AwaitingRequestLine => {
                let Some((consumed, request_line)) = parse_request_line(data)? else {
                    return Ok(0);
                };
                trace!(method = %request_line.method, request_target = %request_line.target, "parsed request line");
                self.request_line = Some(request_line);
                self.state = ParserState::AwaitingHeaders;
                Ok(consumed)
            }

            ParserState::AwaitingHeaders => {
                let (consumed, done) = self.headers.parse_field(data)?;
                if done {
                    self.state = ParserState::AwaitingBody;
                }
                Ok(consumed)
            }

            ParserState::AwaitingBody => {
                let Some(declared) = self.headers.get("Content-Length") else {
                    self.state = ParserState::Complete;
                    return Ok(0);
                };
                let declared: usize = declared
                    .trim()
                    .parse()
                    .map_err(|_| ParseError::InvalidContentLength(declared.to_string()))?;

                self.body.extend_from_slice(data);
                if self.body.len() > declared {
                    return Err(ParseError::BodyLengthMismatch {
                        declared,
                        actual: self.body.len(),
                    });
                }
                if self.body.len() == declared {
                    self.state = ParserState::Complete;
                }
                Ok(data.len())
            }

            ParserState::Complete => Err(ParseError::AlreadyComplete),
        }
    }
}

/// Parses `METHOD SP TARGET SP HTTP/1.1 CRLF` from the front of `data`.
///
/// Returns `Ok(None)` when no complete line is buffered yet.
fn parse_request_line(data: &[u8]) -> Result<Option<(usize, RequestLine)>, ParseError> {
    let Some(idx) = find_crlf(data) else {
        return Ok(None);
    };

    let line = std::str::from_utf8(&data[..idx])
        .map_err(|_| ParseError::MalformedRequestLine(String::from_utf8_lossy(&data[..idx]).into_owned()))?;

    let parts: Vec<&str> = line.split(' ').collect();
    let [method, target, version] = parts[..] else {
        return Err(ParseError::MalformedRequestLine(line.to_string()));
    };

    if method.is_empty() || !method.bytes().all(|b| b.is_ascii_uppercase()) {
        return Err(ParseError::InvalidMethod(method.to_string()));
    }

    let version = match version.split_once('/') {
        Some(("HTTP", "1.1")) => "1.1",
        _ => return Err(ParseError::UnsupportedVersion(version.to_string())),
    };

    let request_line = RequestLine {
        method: method.to_string(),
        target: target.to_string(),
        version: version.to_string(),
    };

    Ok(Some((idx + CRLF_LEN, request_line)))
}

/// Reads from `reader` until one complete request has been parsed.
///
/// Consumed bytes are dropped from the front of the buffer after every
/// read; the buffer doubles whenever it fills up.
pub async fn read_request<R>(reader: &mut R) -> Result<Request, ParseError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = BytesMut::with_capacity(INITIAL_BUFFER_SIZE);
    let mut parser = RequestParser::new();

    while !parser.is_complete() {
        if buffer.len() == buffer.capacity() {
            let additional = buffer.capacity().max(INITIAL_BUFFER_SIZE);
            buffer.reserve(additional);
        }

        let n = reader.read_buf(&mut buffer).await?;
        if n == 0 {
            return Err(ParseError::Incomplete);
        }

        let consumed = parser.parse(&buffer)?;
        buffer.advance(consumed);
    }

    parser.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let mut parser = RequestParser::new();
        let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";

        let consumed = parser.parse(req).unwrap();
        assert_eq!(consumed, req.len());
        assert_eq!(parser.state(), ParserState::Complete);

        let parsed = parser.finish().unwrap();
        assert_eq!(parsed.target(), "/");
        assert_eq!(parsed.header("Host"), Some("example.com"));
    }

    #[test]
    fn partial_request_line_consumes_nothing() {
        let mut parser = RequestParser::new();

        assert_eq!(parser.parse(b"GET / HTT").unwrap(), 0);
        assert_eq!(parser.state(), ParserState::AwaitingRequestLine);
    }

    #[test]
    fn stops_between_states_when_data_runs_out() {
        let mut parser = RequestParser::new();

        let consumed = parser.parse(b"GET / HTTP/1.1\r\nHost: a\r\nAcc").unwrap();
        assert_eq!(consumed, b"GET / HTTP/1.1\r\nHost: a\r\n".len());
        assert_eq!(parser.state(), ParserState::AwaitingHeaders);
    }

    #[test]
    fn finish_before_complete_is_incomplete() {
        let mut parser = RequestParser::new();
        parser.parse(b"GET / HTTP/1.1\r\n").unwrap();

        assert!(matches!(parser.finish(), Err(ParseError::Incomplete)));
    }

    #[test]
    fn parse_after_complete_is_an_error() {
        let mut parser = RequestParser::new();
        parser.parse(b"GET / HTTP/1.1\r\n\r\n").unwrap();

        assert!(matches!(parser.parse(b"x"), Err(ParseError::AlreadyComplete)));
    }

    #[test]
    fn zero_content_length_completes_without_body_bytes() {
        let mut parser = RequestParser::new();
        parser
            .parse(b"POST /api HTTP/1.1\r\nContent-Length: 0\r\n\r\n")
            .unwrap();

        assert!(parser.is_complete());
    }

    #[test]
    fn request_line_errors() {
        let cases: [(&[u8], fn(&ParseError) -> bool); 5] = [
            (&b"GET /\r\n"[..], |e| matches!(e, ParseError::MalformedRequestLine(_))),
            (&b"GET  / HTTP/1.1\r\n"[..], |e| matches!(e, ParseError::MalformedRequestLine(_))),
            (&b"get / HTTP/1.1\r\n"[..], |e| matches!(e, ParseError::InvalidMethod(_))),
            (&b"GET / HTTP/1.0\r\n"[..], |e| matches!(e, ParseError::UnsupportedVersion(_))),
            (&b"GET / HTTPS/1.1\r\n"[..], |e| matches!(e, ParseError::UnsupportedVersion(_))),
        ];

        for (input, check) in cases {
            let err = RequestParser::new().parse(input).unwrap_err();
            assert!(check(&err), "unexpected error {:?} for {:?}", err, input);
        }
    }
}
