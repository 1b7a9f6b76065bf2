pub mod local;
pub mod mail;
pub mod math;
pub mod registry;
pub mod traits;

pub use local::LocalToolServer;
pub use mail::{LocalMailbox, Mailbox};
pub use registry::ToolRegistry;
pub use traits::{ToolInvokeError, ToolServer};

use crate::types::{Arguments, ToolDescriptor};
use anyhow::{anyhow, Result};

/// Build the builtin catalog exposed by the in-process server.
pub fn builtin_definitions() -> Vec<ToolDescriptor> {
    let mut tools = math::definitions();
    tools.extend(mail::definitions());
    tools
}

// ---------------------------------------------------------------------------
// Argument accessors shared by the builtin tools
// ---------------------------------------------------------------------------

fn int_arg(args: &Arguments, name: &str) -> Result<i64> {
    args.get(name)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| anyhow!("Missing '{}' argument", name))
}

fn int_arg_or(args: &Arguments, name: &str, default: i64) -> Result<i64> {
    match args.get(name) {
        None => Ok(default),
        Some(v) => v
            .as_i64()
            .ok_or_else(|| anyhow!("Argument '{}' must be an integer", name)),
    }
}

fn str_arg<'a>(args: &'a Arguments, name: &str) -> Result<&'a str> {
    args.get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("Missing '{}' argument", name))
}

fn int_list_arg(args: &Arguments, name: &str) -> Result<Vec<i64>> {
    let items = args
        .get(name)
        .and_then(|v| v.as_array())
        .ok_or_else(|| anyhow!("Missing '{}' argument", name))?;
    items
        .iter()
        .map(|v| {
            v.as_i64()
                .ok_or_else(|| anyhow!("Argument '{}' must contain only integers", name))
        })
        .collect()
}
