//! Shared types used across the toolrelay runtime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Named arguments for a tool call, in the tool's declared parameter order.
pub type Arguments = serde_json::Map<String, Value>;

// ---------------------------------------------------------------------------
// Tool catalog
// ---------------------------------------------------------------------------

/// Declared type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    Number,
    /// An array whose elements are integers.
    IntegerArray,
}

impl ParamType {
    /// The JSON Schema `type` keyword for this parameter type.
    pub fn json_type(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::IntegerArray => "array",
        }
    }

    /// Map a JSON Schema `type` keyword back to a parameter type.
    ///
    /// Anything undeclared or unrecognised is treated as a string.
    pub fn from_json_type(keyword: Option<&str>) -> Self {
        match keyword {
            Some("integer") => Self::Integer,
            Some("number") => Self::Number,
            Some("array") => Self::IntegerArray,
            _ => Self::String,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.json_type())
    }
}

/// One declared parameter of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub description: String,
}

/// Schema of a published tool: its name and ordered, typed parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
        }
    }

    /// Append a required parameter.
    pub fn required(mut self, name: &str, ty: ParamType, description: &str) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            ty,
            required: true,
            default: None,
            description: description.into(),
        });
        self
    }

    /// Append an optional parameter with an optional default value.
    pub fn optional(
        mut self,
        name: &str,
        ty: ParamType,
        default: Option<Value>,
        description: &str,
    ) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            ty,
            required: false,
            default,
            description: description.into(),
        });
        self
    }

    /// Look up a parameter by name.
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Render `name(a: integer, b: integer)` for prompts and listings.
    pub fn signature(&self) -> String {
        if self.params.is_empty() {
            return format!("{}(no parameters)", self.name);
        }
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| {
                if p.required {
                    format!("{}: {}", p.name, p.ty)
                } else {
                    format!("{}?: {}", p.name, p.ty)
                }
            })
            .collect();
        format!("{}({})", self.name, params.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Directive protocol
// ---------------------------------------------------------------------------

/// The single authoritative instruction extracted from one model turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Directive {
    /// `FUNCTION_CALL: tool|arg1|arg2`
    Invoke {
        tool_name: String,
        raw_args: Vec<String>,
    },
    /// `FINAL_ANSWER: text`
    FinalAnswer { text: String },
}

// ---------------------------------------------------------------------------
// Tool invocation channel
// ---------------------------------------------------------------------------

/// One content block of a tool response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".into(),
            text: text.into(),
        }
    }
}

/// Response of a tool call. Operation failures are reported in-band with
/// `is_error` set, so a caller always has something to log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub content: Vec<ContentItem>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl ToolResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::text(text)],
            is_error: false,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::text(message)],
            is_error: true,
        }
    }

    /// Flatten the content blocks into one line of text for the progress log.
    pub fn summary(&self) -> String {
        let texts: Vec<&str> = self
            .content
            .iter()
            .map(|item| {
                if item.kind == "text" {
                    item.text.as_str()
                } else {
                    item.kind.as_str()
                }
            })
            .collect();
        match texts.as_slice() {
            [] => "(no content)".into(),
            [single] => (*single).to_string(),
            many => format!("[{}]", many.join(", ")),
        }
    }
}

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

/// What one completed tool step contributed to a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    /// Zero-based iteration in which the tool was called.
    pub iteration_index: u32,
    pub tool_name: String,
    pub arguments: Arguments,
    pub result_summary: String,
    /// False when the tool server reported an in-band failure.
    pub success: bool,
    pub recorded_at: DateTime<Utc>,
}

/// Mutable state of a single orchestration run. Owned by the caller and
/// never shared between runs.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    pub iteration_count: u32,
    pub last_result: Option<ToolResponse>,
    pub progress: Vec<ProgressEntry>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear everything left over from a previous run.
    pub fn reset(&mut self) {
        self.iteration_count = 0;
        self.last_result = None;
        self.progress.clear();
    }
}

// ---------------------------------------------------------------------------
// Inference types
// ---------------------------------------------------------------------------

/// Text returned by one model invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

/// Token usage from an inference call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}
