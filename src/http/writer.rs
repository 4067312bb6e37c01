//! Response serialization gated by a section-ordering state machine.
//!
//! ```text
//! StatusLine ──► Headers ──► Body ──┬─ write_body ───────────────────────► Done
//!                                   └─ write_chunk* ─ end_chunks ─► Trailers ─► Done
//! ```
//!
//! Every operation checks the current state first. A call made out of order
//! fails with [`WriterError::InvalidState`] before any byte reaches the sink.

use std::fmt;

use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::http::headers::HeaderTable;
use crate::http::response::StatusCode;

const HTTP_VERSION: &str = "HTTP/1.1";
const CRLF: &[u8] = b"\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    ReadyForStatusLine,
    ReadyForHeaders,
    ReadyForBody,
    ReadyForTrailers,
    Done,
}

impl fmt::Display for WriterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriterState::ReadyForStatusLine => "ready for status line",
            WriterState::ReadyForHeaders => "ready for headers",
            WriterState::ReadyForBody => "ready for body",
            WriterState::ReadyForTrailers => "ready for trailers",
            WriterState::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("cannot {operation} while writer is {state}")]
    InvalidState {
        operation: &'static str,
        state: WriterState,
    },
    #[error("declared trailer {0:?} has no value")]
    MissingTrailer(String),
    #[error("i/o error while writing response: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes one response onto `sink`.
pub struct ResponseWriter<W> {
    sink: W,
    state: WriterState,
    chunked: bool,
    declared_trailers: Option<String>,
}

impl<W> ResponseWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            state: WriterState::ReadyForStatusLine,
            chunked: false,
            declared_trailers: None,
        }
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    pub async fn write_status_line(&mut self, code: StatusCode) -> Result<(), WriterError> {
        self.require_state(WriterState::ReadyForStatusLine, "write status line")?;

        // codes without a known reason keep the SP: "HTTP/1.1 404 \r\n"
        let line = format!(
            "{} {} {}\r\n",
            HTTP_VERSION,
            code.as_u16(),
            code.reason_phrase()
        );
        self.emit(line.as_bytes()).await?;

        trace!(status = code.as_u16(), "wrote status line");
        self.state = WriterState::ReadyForHeaders;
        Ok(())
    }

    pub async fn write_headers(&mut self, headers: &HeaderTable) -> Result<(), WriterError> {
        self.require_state(WriterState::ReadyForHeaders, "write headers")?;

        self.emit(&headers.to_wire()).await?;

        self.declared_trailers = headers.get("Trailer").map(str::to_string);
        self.state = WriterState::ReadyForBody;
        Ok(())
    }

    /// Writes a fixed-length body. Not allowed once chunked writing started.
    pub async fn write_body(&mut self, body: &[u8]) -> Result<usize, WriterError> {
        self.require_state(WriterState::ReadyForBody, "write body")?;
        if self.chunked {
            return Err(WriterError::InvalidState {
                operation: "write body after chunks",
                state: self.state,
            });
        }

        self.emit(body).await?;

        self.state = WriterState::Done;
        Ok(body.len())
    }

    /// Writes one chunk of a chunked body. May be called repeatedly.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<usize, WriterError> {
        self.require_state(WriterState::ReadyForBody, "write chunk")?;

        let mut frame = Vec::with_capacity(chunk.len() + 12);
        frame.extend_from_slice(format!("{:x}", chunk.len()).as_bytes());
        frame.extend_from_slice(CRLF);
        frame.extend_from_slice(chunk);
        frame.extend_from_slice(CRLF);
        self.emit(&frame).await?;

        self.chunked = true;
        Ok(chunk.len())
    }

    /// Writes the zero-length chunk that ends a chunked body.
    pub async fn end_chunks(&mut self) -> Result<(), WriterError> {
        self.require_state(WriterState::ReadyForBody, "end chunks")?;

        self.emit(b"0\r\n").await?;

        self.chunked = true;
        self.state = WriterState::ReadyForTrailers;
        Ok(())
    }

    /// Writes the trailer section that follows a chunked body.
    ///
    /// The names to send come from the `Trailer` field of the header section.
    /// `trailers` may carry its own `Trailer` field, which is only consulted
    /// when the header section declared none. Every named field must have a
    /// value in `trailers`; otherwise nothing is written.
    pub async fn write_trailers(&mut self, trailers: &HeaderTable) -> Result<(), WriterError> {
        self.require_state(WriterState::ReadyForTrailers, "write trailers")?;

        let declared = self
            .declared_trailers
            .clone()
            .or_else(|| trailers.get("Trailer").map(str::to_string));

        let mut section = Vec::new();
        if let Some(declared) = declared {
            for name in declared.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                let value = trailers
                    .get(name)
                    .ok_or_else(|| WriterError::MissingTrailer(name.to_string()))?;
                section.extend_from_slice(name.as_bytes());
                section.push(b':');
                section.extend_from_slice(value.as_bytes());
                section.extend_from_slice(CRLF);
            }
        }
        section.extend_from_slice(CRLF);
        self.emit(&section).await?;

        self.state = WriterState::Done;
        Ok(())
    }

    fn require_state(&self, required: WriterState, operation: &'static str) -> Result<(), WriterError> {
        if self.state != required {
            return Err(WriterError::InvalidState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    async fn emit(&mut self, bytes: &[u8]) -> Result<(), WriterError> {
        self.sink.write_all(bytes).await?;
        self.sink.flush().await?;
        Ok(())
    }
}
