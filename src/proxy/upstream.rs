//! Upstream fetch over plain HTTP/1.1.
//!
//! This module connects to an upstream server, sends a GET request and
//! exposes the response body as an incremental byte stream so that a
//! handler can forward it chunk by chunk.

use anyhow::{bail, Context, Result};
use bytes::{Buf, Bytes, BytesMut};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use url::Url;

use crate::http::headers::{find_crlf, HeaderTable};

/// Default buffer size for streaming
const BUFFER_SIZE: usize = 8192;

/// Upper bound on the upstream status line and header section
const MAX_HEAD_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkPhase {
    Size,
    Data(usize),
    DataEnd,
    Trailers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    Length(usize),
    Chunked(ChunkPhase),
    UntilClose,
    Finished,
}

/// Status and headers of an upstream response, plus its still-unread body.
pub struct UpstreamResponse {
    pub status: u16,
    pub headers: HeaderTable,
    stream: TcpStream,
    buffer: BytesMut,
    framing: Framing,
}

/// Fetches `url` from an upstream server.
///
/// Only the `http` scheme is supported. Returns once the status line and
/// headers have arrived; the body is read lazily through
/// [`UpstreamResponse::next_chunk`].
pub async fn fetch(url: &Url, connect_timeout: Duration) -> Result<UpstreamResponse> {
    if url.scheme() != "http" {
        bail!("unsupported upstream scheme: {}", url.scheme());
    }
    let host = url.host_str().context("Upstream URL missing host")?;
    let port = url.port_or_known_default().unwrap_or(80);

    let addr = format!("{}:{}", host, port);
    let mut stream = timeout(connect_timeout, TcpStream::connect(&addr))
        .await
        .context("Connection timeout")?
        .with_context(|| format!("Failed to connect to upstream {}", addr))?;

    tracing::trace!(upstream = %addr, "Connected to upstream");

    let request = build_request(url)?;
    stream.write_all(&request).await?;
    stream.flush().await?;

    let mut buffer = BytesMut::with_capacity(BUFFER_SIZE);
    let (status, headers) = read_head(&mut stream, &mut buffer).await?;

    let framing = if headers
        .get("Transfer-Encoding")
        .is_some_and(|te| te.to_ascii_lowercase().contains("chunked"))
    {
        Framing::Chunked(ChunkPhase::Size)
    } else if let Some(cl) = headers.get("Content-Length") {
        let len = cl
            .trim()
            .parse()
            .with_context(|| format!("Invalid upstream Content-Length: {}", cl))?;
        Framing::Length(len)
    } else {
        Framing::UntilClose
    };

    tracing::debug!(upstream = %addr, status, ?framing, "Upstream response head received");

    Ok(UpstreamResponse {
        status,
        headers,
        stream,
        buffer,
        framing,
    })
}

/// Builds the GET request sent upstream.
pub fn build_request(url: &Url) -> Result<Vec<u8>> {
    let host = url.host_str().context("Upstream URL missing host")?;
    let host_value = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };

    let mut target = url.path().to_string();
    if target.is_empty() {
        target.push('/');
    }
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }

    let mut buffer = Vec::new();
    buffer.extend_from_slice(format!("GET {} HTTP/1.1\r\n", target).as_bytes());
    buffer.extend_from_slice(format!("Host: {}\r\n", host_value).as_bytes());
    buffer.extend_from_slice(b"Connection: close\r\n");
    buffer.extend_from_slice(b"Accept: */*\r\n");
    buffer.extend_from_slice(b"\r\n");
    Ok(buffer)
}

async fn read_head(stream: &mut TcpStream, buffer: &mut BytesMut) -> Result<(u16, HeaderTable)> {
    let mut status: Option<u16> = None;
    let mut headers = HeaderTable::new();

    loop {
        if status.is_none() {
            if let Some(line) = take_line(buffer)? {
                status = Some(parse_status_line(&line)?);
                continue;
            }
        } else {
            let (consumed, done) = headers
                .parse_field(buffer)
                .context("Invalid upstream header")?;
            buffer.advance(consumed);
            if done {
                break;
            }
            if consumed > 0 {
                continue;
            }
        }

        if buffer.len() > MAX_HEAD_SIZE {
            bail!("Upstream response headers too large");
        }
        if stream.read_buf(buffer).await? == 0 {
            bail!("Connection closed before complete response received");
        }
    }

    let status = status.context("Upstream response missing status line")?;
    Ok((status, headers))
}

fn parse_status_line(line: &str) -> Result<u16> {
    let parts: Vec<&str> = line.splitn(3, ' ').collect();
    if parts.len() < 2 || !parts[0].starts_with("HTTP/") {
        bail!("Invalid status line: {}", line);
    }
    parts[1].parse().context("Invalid status code")
}

/// Splits one CRLF-terminated line off the front of `buffer`.
fn take_line(buffer: &mut BytesMut) -> Result<Option<String>> {
    let Some(idx) = find_crlf(buffer) else {
        return Ok(None);
    };
    let line = buffer.split_to(idx + 2);
    let text = std::str::from_utf8(&line[..idx]).context("Invalid UTF-8 in upstream response")?;
    Ok(Some(text.to_string()))
}

impl UpstreamResponse {
    /// Returns the next piece of the body, or `None` once it has been fully
    /// read. Chunked bodies are returned without their framing.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        loop {
            match self.framing {
                Framing::Finished | Framing::Length(0) => {
                    self.framing = Framing::Finished;
                    return Ok(None);
                }

                Framing::Length(remaining) => {
                    self.fill_if_empty("body").await?;
                    let n = remaining.min(self.buffer.len());
                    self.framing = Framing::Length(remaining - n);
                    return Ok(Some(self.buffer.split_to(n).freeze()));
                }

                Framing::UntilClose => {
                    if self.buffer.is_empty() && self.fill().await? == 0 {
                        self.framing = Framing::Finished;
                        return Ok(None);
                    }
                    return Ok(Some(self.buffer.split().freeze()));
                }

                Framing::Chunked(ChunkPhase::Size) => {
                    let Some(line) = take_line(&mut self.buffer)? else {
                        self.fill_or_bail("chunk size").await?;
                        continue;
                    };
                    let size_str = line.split(';').next().unwrap_or_default().trim();
                    let size = usize::from_str_radix(size_str, 16)
                        .with_context(|| format!("Invalid chunk size: {:?}", size_str))?;
                    self.framing = if size == 0 {
                        Framing::Chunked(ChunkPhase::Trailers)
                    } else {
                        Framing::Chunked(ChunkPhase::Data(size))
                    };
                }

                Framing::Chunked(ChunkPhase::Data(remaining)) => {
                    self.fill_if_empty("chunk data").await?;
                    let n = remaining.min(self.buffer.len());
                    self.framing = if n == remaining {
                        Framing::Chunked(ChunkPhase::DataEnd)
                    } else {
                        Framing::Chunked(ChunkPhase::Data(remaining - n))
                    };
                    return Ok(Some(self.buffer.split_to(n).freeze()));
                }

                Framing::Chunked(ChunkPhase::DataEnd) => {
                    let Some(line) = take_line(&mut self.buffer)? else {
                        self.fill_or_bail("chunk terminator").await?;
                        continue;
                    };
                    if !line.is_empty() {
                        bail!("Chunk data longer than its declared size");
                    }
                    self.framing = Framing::Chunked(ChunkPhase::Size);
                }

                Framing::Chunked(ChunkPhase::Trailers) => {
                    let Some(line) = take_line(&mut self.buffer)? else {
                        self.fill_or_bail("chunked trailers").await?;
                        continue;
                    };
                    if line.is_empty() {
                        self.framing = Framing::Finished;
                    }
                }
            }
        }
    }

    async fn fill(&mut self) -> Result<usize> {
        self.buffer.reserve(BUFFER_SIZE);
        Ok(self.stream.read_buf(&mut self.buffer).await?)
    }

    async fn fill_if_empty(&mut self, what: &str) -> Result<()> {
        if self.buffer.is_empty() {
            self.fill_or_bail(what).await?;
        }
        Ok(())
    }

    async fn fill_or_bail(&mut self, what: &str) -> Result<()> {
        if self.fill().await? == 0 {
            bail!("Connection closed before complete {} received", what);
        }
        Ok(())
    }
}
