//! Wireline - HTTP/1.1 over raw TCP
//!
//! Incremental request parsing, a section-ordered response writer and a
//! concurrent connection server, built directly on tokio byte streams.

pub mod config;
pub mod handlers;
pub mod http;
pub mod proxy;
pub mod server;
