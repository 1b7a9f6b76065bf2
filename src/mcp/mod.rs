//! Stdio JSON-RPC transport for tool servers.

pub mod client;
pub mod protocol;
pub mod server;

pub use client::StdioToolServer;
pub use server::{serve, serve_io};
