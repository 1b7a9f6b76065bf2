//! toolrelay: drive a tool server from single-line model directives.
//!
//! A language model answers each turn with one `FUNCTION_CALL:` or
//! `FINAL_ANSWER:` line. The orchestration loop parses it, coerces the
//! positional arguments against the tool catalog, calls the tool server and
//! feeds a progress log back into the next prompt.

pub mod agent;
pub mod config;
pub mod inference;
pub mod mcp;
pub mod recipe;
pub mod state;
pub mod tools;
pub mod types;
