//! HTTP/1.1 protocol implementation over raw byte streams.
//!
//! - **`headers`**: case-insensitive header table and field-line parser
//! - **`request`**: parsed request representation
//! - **`parser`**: incremental request parser and the read loop driving it
//! - **`response`**: status codes and the default header set
//! - **`writer`**: response writer enforcing section order
//! - **`connection`**: serves one request on an accepted connection
//!
//! # Connection lifecycle
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← accumulate bytes until the request is complete
//!        └──────┬──────┘
//!               ├─ malformed → 400 Bad Request → Closed
//!               ▼
//!        ┌──────────────────┐
//!        │    Handling      │ ← handler drives the ResponseWriter
//!        └──────┬───────────┘
//!               ▼
//!            Closed
//! ```
//!
//! # Example
//!
//! ```ignore
//! use wireline::http::parser::read_request;
//! use wireline::http::response::{default_headers, StatusCode};
//! use wireline::http::writer::ResponseWriter;
//!
//! let request = read_request(&mut stream).await?;
//! let mut writer = ResponseWriter::new(&mut stream);
//! writer.write_status_line(StatusCode::OK).await?;
//! writer.write_headers(&default_headers(5)).await?;
//! writer.write_body(b"hello").await?;
//! ```

pub mod connection;
pub mod headers;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
