//! Fixed system preamble for a run.
//!
//! Layers (in order):
//! 1. Operator instructions (from config)
//! 2. Tool catalog, numbered, as signatures
//! 3. Directive protocol rules
//! 4. Default-friendly tool notes
//! 5. Worked examples

use crate::agent::directive::format_directive;
use crate::tools::ToolRegistry;
use crate::types::{Directive, ParamType, ToolDescriptor};
use tracing::debug;

const DEFAULT_INSTRUCTIONS: &str =
    "You are an agent that solves tasks step by step by calling tools.";

const PROTOCOL_RULES: &str = r#"
You must respond with EXACTLY ONE line in one of these formats (no additional text):
1. For function calls:
   FUNCTION_CALL: function_name|param1|param2|...
2. For final answers:
   FINAL_ANSWER: [answer]

Important:
- Parameters are positional, in the order listed for each tool
- Optional parameters may be left off the end of the line
- Array parameters are written as [1,2,3]
- Each tool must be called separately in its own iteration
- Use the results in "Progress so far" instead of repeating a call
"#;

const CLOSING: &str = "DO NOT include any explanations or additional text.\n\
Your entire response should be a single line starting with either FUNCTION_CALL: or FINAL_ANSWER:";

/// Build the preamble describing the visible tools and the protocol.
pub fn build_system_prompt(
    registry: &ToolRegistry,
    tool_filter: &[String],
    default_friendly: &[String],
    instructions: &str,
) -> String {
    let mut prompt = String::with_capacity(4096);

    // Layer 1: instructions
    if instructions.trim().is_empty() {
        prompt.push_str(DEFAULT_INSTRUCTIONS);
    } else {
        prompt.push_str(instructions.trim());
    }
    prompt.push_str("\n\n");

    // Layer 2: catalog
    let visible = registry.visible(tool_filter);
    prompt.push_str("Available tools:\n");
    if visible.is_empty() {
        prompt.push_str("(none)\n");
    }
    for (i, tool) in visible.iter().enumerate() {
        prompt.push_str(&format!("{}. {}", i + 1, tool.signature()));
        if !tool.description.is_empty() {
            prompt.push_str(&format!(" - {}", tool.description));
        }
        prompt.push('\n');
    }

    // Layer 3: protocol
    prompt.push_str(PROTOCOL_RULES);

    // Layer 4: default-friendly notes
    for tool in visible
        .iter()
        .filter(|t| default_friendly.iter().any(|d| *d == t.name))
    {
        prompt.push_str(&format!(
            "- To use the defaults of {name}, omit its parameters: FUNCTION_CALL: {name}\n",
            name = tool.name
        ));
    }

    // Layer 5: examples
    prompt.push_str("\nExamples:\n");
    for example in worked_examples(&visible) {
        prompt.push_str(&format!("- {}\n", format_directive(&example)));
    }
    prompt.push('\n');
    prompt.push_str(CLOSING);

    debug!("System prompt: {} chars", prompt.len());
    prompt
}

/// One call of the first visible tool with placeholder arguments, then a
/// final answer.
fn worked_examples(visible: &[&ToolDescriptor]) -> Vec<Directive> {
    let mut examples = Vec::new();
    if let Some(tool) = visible.first() {
        let raw_args = tool
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| example_value(p.ty).to_string())
            .collect();
        examples.push(Directive::Invoke {
            tool_name: tool.name.clone(),
            raw_args,
        });
    }
    examples.push(Directive::FinalAnswer {
        text: "[42]".into(),
    });
    examples
}

fn example_value(ty: ParamType) -> &'static str {
    match ty {
        ParamType::String => "text",
        ParamType::Integer => "5",
        ParamType::Number => "2.5",
        ParamType::IntegerArray => "[1,2,3]",
    }
}
