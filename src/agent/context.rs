//! Prompt assembly for one model turn.
//!
//! The prompt is the fixed preamble, the user query and, once anything has
//! been tried, the rendered progress log.

use crate::types::{Arguments, ProgressEntry};
use tracing::debug;

/// Render one progress entry as a sentence the model can act on.
pub fn render_entry(entry: &ProgressEntry) -> String {
    let step = entry.iteration_index + 1;
    let args = render_arguments(&entry.arguments);
    if entry.success {
        format!(
            "Step {} completed: {} was called successfully with {}. Result: {}",
            step, entry.tool_name, args, entry.result_summary
        )
    } else {
        format!(
            "Step {} failed: {} was called with {} and reported an error. Result: {}",
            step, entry.tool_name, args, entry.result_summary
        )
    }
}

/// Render the whole progress log, one entry per line.
pub fn render_progress(progress: &[ProgressEntry]) -> String {
    progress
        .iter()
        .map(render_entry)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the full prompt for the next model invocation.
pub fn build_prompt(system_prompt: &str, query: &str, progress: &[ProgressEntry]) -> String {
    let mut prompt = format!("{}\n\nQuery: {}", system_prompt, query);
    if !progress.is_empty() {
        prompt.push_str("\n\nProgress so far:\n");
        prompt.push_str(&render_progress(progress));
        prompt.push_str("\n\nContinue with the next step based on the results above.");
    }
    debug!("Prompt: {} chars, {} progress entries", prompt.len(), progress.len());
    prompt
}

fn render_arguments(arguments: &Arguments) -> String {
    if arguments.is_empty() {
        return "no arguments".into();
    }
    serde_json::Value::Object(arguments.clone()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn entry(index: u32, success: bool) -> ProgressEntry {
        ProgressEntry {
            iteration_index: index,
            tool_name: "add".into(),
            arguments: json!({"a": 1, "b": 2}).as_object().cloned().unwrap(),
            result_summary: if success { "3".into() } else { "Error: boom".into() },
            success,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn first_turn_has_no_progress_section() {
        let prompt = build_prompt("PREAMBLE", "add 1 and 2", &[]);
        assert_eq!(prompt, "PREAMBLE\n\nQuery: add 1 and 2");
    }

    #[test]
    fn later_turns_include_every_entry() {
        let prompt = build_prompt("PREAMBLE", "q", &[entry(0, true), entry(1, false)]);
        assert!(prompt.contains("Progress so far:\nStep 1 completed: add was called successfully with {\"a\":1,\"b\":2}. Result: 3\n"));
        assert!(prompt.contains("Step 2 failed: add was called with"));
        assert!(prompt.ends_with("Continue with the next step based on the results above."));
    }

    #[test]
    fn empty_arguments_are_named() {
        let mut e = entry(0, true);
        e.arguments = Arguments::new();
        assert!(render_entry(&e).contains("with no arguments."));
    }
}
