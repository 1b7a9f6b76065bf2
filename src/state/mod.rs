//! Persistent run journal.

pub mod database;
pub mod schema;

pub use database::{Journal, RunRecord};
