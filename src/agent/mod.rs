//! The directive-driven orchestration loop and its building blocks.

pub mod coerce;
pub mod context;
pub mod directive;
pub mod error;
pub mod loop_;
pub mod system_prompt;

pub use error::AgentError;
pub use loop_::{LoopSettings, Orchestrator, RunOutcome, RunReport};
