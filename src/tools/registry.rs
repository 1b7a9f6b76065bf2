//! Name -> descriptor lookup over a published tool catalog.

use crate::agent::error::AgentError;
use crate::types::ToolDescriptor;
use tracing::warn;

/// Ordered, immutable view of a tool catalog.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    /// Build a registry from a catalog. Later duplicates of a name are dropped.
    pub fn from_catalog(catalog: Vec<ToolDescriptor>) -> Self {
        let mut tools: Vec<ToolDescriptor> = Vec::with_capacity(catalog.len());
        for tool in catalog {
            if tools.iter().any(|t| t.name == tool.name) {
                warn!("Duplicate tool '{}' in catalog, keeping the first", tool.name);
                continue;
            }
            tools.push(tool);
        }
        Self { tools }
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Like [`get`](Self::get) but fails with [`AgentError::UnknownTool`].
    pub fn lookup(&self, name: &str) -> Result<&ToolDescriptor, AgentError> {
        self.get(name)
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))
    }

    /// Tools to describe to the model. An empty filter selects everything.
    pub fn visible(&self, filter: &[String]) -> Vec<&ToolDescriptor> {
        self.tools
            .iter()
            .filter(|t| filter.is_empty() || filter.iter().any(|f| *f == t.name))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
