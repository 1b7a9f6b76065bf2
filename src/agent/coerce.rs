//! Positional string arguments -> typed named arguments.

use crate::agent::error::AgentError;
use crate::types::{Arguments, ParamSpec, ParamType, ToolDescriptor};
use serde_json::{json, Number, Value};
use tracing::debug;

/// Coerce the raw positional arguments of a `FUNCTION_CALL` directive into
/// the named mapping a tool server expects.
///
/// Parameters are filled in declared order. Once the raw arguments run out,
/// optional parameters are left out of the mapping so the server applies its
/// own defaults; a missing required parameter is an error.
///
/// Tools listed in `default_friendly` get an empty mapping when called with
/// no arguments or a single blank one (`tool` / `tool|`).
pub fn coerce_arguments(
    descriptor: &ToolDescriptor,
    raw_args: &[String],
    default_friendly: &[String],
) -> Result<Arguments, AgentError> {
    if is_blank(raw_args) && default_friendly.iter().any(|t| *t == descriptor.name) {
        debug!("Using server defaults for {}", descriptor.name);
        return Ok(Arguments::new());
    }

    let mut remaining = raw_args.iter();
    let mut arguments = Arguments::new();

    for param in &descriptor.params {
        let Some(raw) = remaining.next() else {
            if param.required {
                return Err(AgentError::MissingArgument {
                    tool: descriptor.name.clone(),
                    param: param.name.clone(),
                });
            }
            continue;
        };
        arguments.insert(param.name.clone(), coerce_value(param, raw)?);
    }

    let surplus = remaining.count();
    if surplus > 0 {
        debug!("Ignoring {} surplus argument(s) for {}", surplus, descriptor.name);
    }

    Ok(arguments)
}

/// Coerce one raw string according to the parameter's declared type.
pub fn coerce_value(param: &ParamSpec, raw: &str) -> Result<Value, AgentError> {
    let trimmed = raw.trim();
    match param.ty {
        ParamType::Integer => {
            if trimmed.is_empty() {
                return Ok(param.default.clone().unwrap_or_else(|| json!(0)));
            }
            trimmed
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| mismatch(param, raw))
        }
        ParamType::Number => {
            if trimmed.is_empty() {
                return Ok(param.default.clone().unwrap_or_else(|| json!(0.0)));
            }
            trimmed
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| mismatch(param, raw))
        }
        ParamType::IntegerArray => {
            let inner = trimmed.strip_prefix('[').unwrap_or(trimmed);
            let inner = inner.strip_suffix(']').unwrap_or(inner).trim();
            if inner.is_empty() {
                return Ok(Value::Array(Vec::new()));
            }
            inner
                .split(',')
                .map(|item| item.trim().parse::<i64>().map(Value::from))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
                .map_err(|_| mismatch(param, raw))
        }
        ParamType::String => Ok(Value::String(raw.to_string())),
    }
}

fn is_blank(raw_args: &[String]) -> bool {
    match raw_args {
        [] => true,
        [only] => only.trim().is_empty(),
        _ => false,
    }
}

fn mismatch(param: &ParamSpec, raw: &str) -> AgentError {
    AgentError::TypeCoercion {
        param: param.name.clone(),
        expected: param.ty,
        value: raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|a| a.to_string()).collect()
    }

    fn unread_tool() -> ToolDescriptor {
        ToolDescriptor::new("show_unread_emails", "").optional(
            "max_emails",
            ParamType::Integer,
            Some(json!(5)),
            "",
        )
    }

    fn friendly() -> Vec<String> {
        vec!["show_unread_emails".to_string()]
    }

    #[test]
    fn default_friendly_tool_without_args_is_empty() {
        let out = coerce_arguments(&unread_tool(), &args(&[]), &friendly()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn default_friendly_tool_with_blank_arg_is_empty() {
        let out = coerce_arguments(&unread_tool(), &args(&[""]), &friendly()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn default_friendly_tool_with_value() {
        let out = coerce_arguments(&unread_tool(), &args(&["10"]), &friendly()).unwrap();
        assert_eq!(out.get("max_emails"), Some(&json!(10)));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn blank_integer_takes_declared_default_for_other_tools() {
        let out = coerce_arguments(&unread_tool(), &args(&[""]), &[]).unwrap();
        assert_eq!(out.get("max_emails"), Some(&json!(5)));

        let no_default = ToolDescriptor::new("count", "").required("n", ParamType::Integer, "");
        let out = coerce_arguments(&no_default, &args(&["  "]), &[]).unwrap();
        assert_eq!(out.get("n"), Some(&json!(0)));
    }

    #[test]
    fn integer_coercion_ignores_padding() {
        let param = &unread_tool().params[0];
        assert_eq!(coerce_value(param, "5").unwrap(), coerce_value(param, "  5  ").unwrap());
    }

    #[test]
    fn non_numeric_integer_fails() {
        let err = coerce_arguments(&unread_tool(), &args(&["five"]), &[]).unwrap_err();
        assert!(matches!(
            err,
            AgentError::TypeCoercion { ref param, expected: ParamType::Integer, .. } if param == "max_emails"
        ));
    }

    #[test]
    fn number_parses_and_defaults() {
        let tool = ToolDescriptor::new("scale", "")
            .required("factor", ParamType::Number, "")
            .optional("offset", ParamType::Number, None, "");
        let out = coerce_arguments(&tool, &args(&["2.5", ""]), &[]).unwrap();
        assert_eq!(out.get("factor"), Some(&json!(2.5)));
        assert_eq!(out.get("offset"), Some(&json!(0.0)));

        let err = coerce_arguments(&tool, &args(&["NaN"]), &[]).unwrap_err();
        assert_eq!(err.kind(), "type_coercion");
    }

    #[test]
    fn integer_arrays() {
        let tool = ToolDescriptor::new("add_list", "").required("l", ParamType::IntegerArray, "");
        let param = &tool.params[0];
        assert_eq!(coerce_value(param, "").unwrap(), json!([]));
        assert_eq!(coerce_value(param, "[]").unwrap(), json!([]));
        assert_eq!(coerce_value(param, "[1, 2, 3]").unwrap(), json!([1, 2, 3]));
        assert_eq!(coerce_value(param, "4,5").unwrap(), json!([4, 5]));
        assert!(coerce_value(param, "[1, two]").is_err());
    }

    #[test]
    fn strings_pass_through_untouched() {
        let tool = ToolDescriptor::new("echo", "").required("text", ParamType::String, "");
        let out = coerce_arguments(&tool, &args(&["hello | world"]), &[]).unwrap();
        assert_eq!(out.get("text"), Some(&json!("hello | world")));
    }

    #[test]
    fn missing_required_argument() {
        let tool = ToolDescriptor::new("add", "")
            .required("a", ParamType::Integer, "")
            .required("b", ParamType::Integer, "");
        let err = coerce_arguments(&tool, &args(&["1"]), &[]).unwrap_err();
        match err {
            AgentError::MissingArgument { tool, param } => {
                assert_eq!(tool, "add");
                assert_eq!(param, "b");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn omitted_optionals_are_absent_and_order_follows_schema() {
        let tool = ToolDescriptor::new("draw", "")
            .required("x", ParamType::Integer, "")
            .required("y", ParamType::Integer, "")
            .optional("color", ParamType::String, Some(json!("green")), "");
        let out = coerce_arguments(&tool, &args(&["3", "4"]), &[]).unwrap();
        let keys: Vec<&String> = out.keys().collect();
        assert_eq!(keys, ["x", "y"]);
        assert!(!out.contains_key("color"));
    }

    #[test]
    fn surplus_arguments_are_ignored() {
        let tool = ToolDescriptor::new("sqrt", "").required("a", ParamType::Integer, "");
        let out = coerce_arguments(&tool, &args(&["9", "extra"]), &[]).unwrap();
        assert_eq!(out.len(), 1);
    }
}
