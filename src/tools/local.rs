//! In-process tool server backed by the builtin catalog.

use super::traits::{ToolInvokeError, ToolServer};
use super::{builtin_definitions, mail, math, Mailbox};
use crate::types::{Arguments, ParamType, ToolDescriptor, ToolResponse};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Tool server that runs the builtin tools in the current process.
pub struct LocalToolServer {
    catalog: Vec<ToolDescriptor>,
    mailbox: Arc<dyn Mailbox>,
}

impl LocalToolServer {
    pub fn new(mailbox: Arc<dyn Mailbox>) -> Self {
        Self {
            catalog: builtin_definitions(),
            mailbox,
        }
    }

    async fn dispatch(&self, name: &str, args: &Arguments) -> anyhow::Result<String> {
        if let Some(result) = mail::execute(self.mailbox.as_ref(), name, args).await {
            return result;
        }
        math::execute(name, args).unwrap_or_else(|| Err(anyhow::anyhow!("Unknown tool: {}", name)))
    }
}

#[async_trait]
impl ToolServer for LocalToolServer {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolInvokeError> {
        Ok(self.catalog.clone())
    }

    async fn call_tool(
        &self,
        name: &str,
        mut arguments: Arguments,
    ) -> Result<ToolResponse, ToolInvokeError> {
        let Some(descriptor) = self.catalog.iter().find(|t| t.name == name) else {
            warn!("Call to unknown tool '{}'", name);
            return Ok(ToolResponse::failure(format!("Error: Unknown tool: {}", name)));
        };

        if let Err(message) = validate_arguments(descriptor, &mut arguments) {
            warn!("Rejected arguments for {}: {}", name, message);
            return Ok(ToolResponse::failure(format!("Error: {}", message)));
        }

        debug!("CALLED: {}", descriptor.signature());
        match self.dispatch(name, &arguments).await {
            Ok(output) => Ok(ToolResponse::text(output)),
            Err(e) => Ok(ToolResponse::failure(format!("Error: {:#}", e))),
        }
    }
}

/// Check `arguments` against the descriptor and fill in declared defaults
/// for omitted optional parameters.
pub fn validate_arguments(
    descriptor: &ToolDescriptor,
    arguments: &mut Arguments,
) -> Result<(), String> {
    if let Some(unexpected) = arguments.keys().find(|k| descriptor.param(k).is_none()) {
        return Err(format!(
            "unexpected argument '{}' for {}",
            unexpected, descriptor.name
        ));
    }

    for param in &descriptor.params {
        match arguments.get(&param.name) {
            Some(value) => {
                if !matches_type(param.ty, value) {
                    return Err(format!(
                        "argument '{}' must be of type {}",
                        param.name, param.ty
                    ));
                }
            }
            None if param.required => {
                return Err(format!("missing required argument '{}'", param.name));
            }
            None => {
                if let Some(default) = &param.default {
                    arguments.insert(param.name.clone(), default.clone());
                }
            }
        }
    }
    Ok(())
}

fn matches_type(ty: ParamType, value: &Value) -> bool {
    match ty {
        ParamType::String => value.is_string(),
        ParamType::Integer => value.is_i64() || value.is_u64(),
        ParamType::Number => value.is_number(),
        ParamType::IntegerArray => value
            .as_array()
            .map(|items| items.iter().all(|v| v.is_i64() || v.is_u64()))
            .unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::mail::{LocalMailbox, MailMessage};
    use serde_json::json;

    fn server() -> LocalToolServer {
        let inbox = (1..=7)
            .map(|i| MailMessage {
                id: format!("m{i}"),
                from: "a@example.com".into(),
                to: "me@localhost".into(),
                subject: "s".into(),
                date: "d".into(),
                snippet: String::new(),
                body: String::new(),
                unread: true,
            })
            .collect();
        LocalToolServer::new(Arc::new(LocalMailbox::in_memory("me@localhost", inbox)))
    }

    fn args(value: serde_json::Value) -> Arguments {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn catalog_is_builtin() {
        let tools = server().list_tools().await.unwrap();
        assert!(tools.iter().any(|t| t.name == "add"));
        assert!(tools.iter().any(|t| t.name == "show_unread_emails"));
    }

    #[tokio::test]
    async fn successful_call() {
        let resp = server()
            .call_tool("add", args(json!({"a": 2, "b": 40})))
            .await
            .unwrap();
        assert!(!resp.is_error);
        assert_eq!(resp.summary(), "42");
    }

    #[tokio::test]
    async fn omitted_optional_gets_default() {
        let resp = server()
            .call_tool("show_unread_emails", Arguments::new())
            .await
            .unwrap();
        assert!(resp.summary().starts_with("📬 Found 5 unread emails"));
    }

    #[tokio::test]
    async fn failures_are_in_band() {
        let srv = server();

        let unknown = srv.call_tool("paint", Arguments::new()).await.unwrap();
        assert!(unknown.is_error);

        let missing = srv.call_tool("add", args(json!({"a": 1}))).await.unwrap();
        assert!(missing.is_error);
        assert!(missing.summary().contains("missing required argument 'b'"));

        let wrong_type = srv
            .call_tool("add", args(json!({"a": "1", "b": 2})))
            .await
            .unwrap();
        assert!(wrong_type.is_error);

        let div_zero = srv
            .call_tool("divide", args(json!({"a": 1, "b": 0})))
            .await
            .unwrap();
        assert!(div_zero.is_error);
        assert_eq!(div_zero.summary(), "Error: division by zero");
    }

    #[test]
    fn unexpected_argument_rejected() {
        let tool = ToolDescriptor::new("sqrt", "").required("a", ParamType::Integer, "");
        let mut arguments = args(json!({"a": 4, "b": 1}));
        assert!(validate_arguments(&tool, &mut arguments).is_err());
    }
}
