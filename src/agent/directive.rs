//! Single-line directive protocol between the model and the loop.
//!
//! Exactly one line per model turn is authoritative:
//!
//! ```text
//! FUNCTION_CALL: tool_name|arg1|arg2|...
//! FINAL_ANSWER: text
//! ```
//!
//! Anything else the model writes around that line is ignored.

use crate::agent::error::AgentError;
use crate::types::Directive;
use std::fmt;

pub const FUNCTION_CALL_PREFIX: &str = "FUNCTION_CALL:";
pub const FINAL_ANSWER_PREFIX: &str = "FINAL_ANSWER:";
const ARG_SEPARATOR: char = '|';

/// How much of an unparseable response is kept in the error.
const MAX_ECHOED_RESPONSE: usize = 200;

/// Parse the first directive line found in a model response.
pub fn parse_directive(response: &str) -> Result<Directive, AgentError> {
    let line = response
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with(FUNCTION_CALL_PREFIX) || line.starts_with(FINAL_ANSWER_PREFIX))
        .ok_or_else(|| protocol_error(response))?;

    if let Some(text) = line.strip_prefix(FINAL_ANSWER_PREFIX) {
        return Ok(Directive::FinalAnswer {
            text: text.trim().to_string(),
        });
    }

    let payload = line
        .strip_prefix(FUNCTION_CALL_PREFIX)
        .ok_or_else(|| protocol_error(response))?;
    // Tolerate a doubled separator such as `FUNCTION_CALL:: add|1|2`.
    let payload = payload.trim_start().strip_prefix(':').unwrap_or(payload);

    let mut fields = payload.split(ARG_SEPARATOR).map(str::trim);
    let tool_name = fields.next().unwrap_or_default();
    if tool_name.is_empty() {
        return Err(protocol_error(response));
    }

    Ok(Directive::Invoke {
        tool_name: tool_name.to_string(),
        raw_args: fields.map(str::to_string).collect(),
    })
}

/// Render a directive as its canonical protocol line.
pub fn format_directive(directive: &Directive) -> String {
    directive.to_string()
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Invoke {
                tool_name,
                raw_args,
            } => {
                write!(f, "{} {}", FUNCTION_CALL_PREFIX, tool_name)?;
                for arg in raw_args {
                    write!(f, "{}{}", ARG_SEPARATOR, arg)?;
                }
                Ok(())
            }
            Directive::FinalAnswer { text } => write!(f, "{} {}", FINAL_ANSWER_PREFIX, text),
        }
    }
}

fn protocol_error(response: &str) -> AgentError {
    AgentError::Protocol {
        response: response.chars().take(MAX_ECHOED_RESPONSE).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoke(tool: &str, args: &[&str]) -> Directive {
        Directive::Invoke {
            tool_name: tool.into(),
            raw_args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn finds_function_call_inside_prose() {
        let response = "Sure, let me add those.\n\n   FUNCTION_CALL: add|3|4  \nThat should do it.";
        assert_eq!(parse_directive(response).unwrap(), invoke("add", &["3", "4"]));
    }

    #[test]
    fn first_directive_line_wins() {
        let response = "FINAL_ANSWER: done\nFUNCTION_CALL: add|1|2";
        assert_eq!(
            parse_directive(response).unwrap(),
            Directive::FinalAnswer {
                text: "done".into()
            }
        );
    }

    #[test]
    fn final_answer_keeps_internal_whitespace() {
        let directive = parse_directive("FINAL_ANSWER:   [The   answer is 42]  ").unwrap();
        assert_eq!(
            directive,
            Directive::FinalAnswer {
                text: "[The   answer is 42]".into()
            }
        );
    }

    #[test]
    fn arguments_are_trimmed() {
        let directive = parse_directive("FUNCTION_CALL: send_gmail | a@b.c |  Hi | body text ").unwrap();
        assert_eq!(directive, invoke("send_gmail", &["a@b.c", "Hi", "body text"]));
    }

    #[test]
    fn omitted_and_blank_arguments_differ() {
        assert_eq!(
            parse_directive("FUNCTION_CALL: show_unread_emails").unwrap(),
            invoke("show_unread_emails", &[])
        );
        assert_eq!(
            parse_directive("FUNCTION_CALL: show_unread_emails|").unwrap(),
            invoke("show_unread_emails", &[""])
        );
    }

    #[test]
    fn doubled_colon_is_tolerated() {
        assert_eq!(
            parse_directive("FUNCTION_CALL:: add|1|2").unwrap(),
            invoke("add", &["1", "2"])
        );
    }

    #[test]
    fn missing_directive_is_protocol_error() {
        let err = parse_directive("I think the answer is 42.").unwrap_err();
        assert!(matches!(err, AgentError::Protocol { .. }));

        let err = parse_directive("").unwrap_err();
        assert!(matches!(err, AgentError::Protocol { .. }));
    }

    #[test]
    fn empty_tool_name_is_protocol_error() {
        let err = parse_directive("FUNCTION_CALL: |1|2").unwrap_err();
        assert!(matches!(err, AgentError::Protocol { .. }));
    }

    #[test]
    fn prefix_must_start_the_line() {
        let err = parse_directive("Reply with FUNCTION_CALL: add|1|2 next time").unwrap_err();
        assert_eq!(err.kind(), "protocol");
    }

    #[test]
    fn formatted_directives_parse_back() {
        for directive in [
            invoke("add", &["1", "2"]),
            invoke("show_unread_emails", &[]),
            Directive::FinalAnswer {
                text: "All done".into(),
            },
        ] {
            let line = format_directive(&directive);
            assert_eq!(parse_directive(&line).unwrap(), directive);
        }
        assert_eq!(format_directive(&invoke("add", &["1", "2"])), "FUNCTION_CALL: add|1|2");
    }
}
