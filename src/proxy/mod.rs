//! Upstream fetching for proxied routes.
//!
//! The upstream is treated as an opaque byte producer: the handler pulls the
//! body piece by piece and forwards each piece as a response chunk.

pub mod upstream;

pub use upstream::{fetch, UpstreamResponse};
