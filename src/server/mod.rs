//! TCP server that hands each accepted connection to its own task.

pub mod handler;
pub mod listener;

pub use handler::Handler;
pub use listener::{serve, Server};
