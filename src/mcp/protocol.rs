//! JSON-RPC 2.0 framing and the tool-catalog wire format.
//!
//! Messages are newline-delimited JSON objects. Tool descriptors travel as
//! `{ name, description, inputSchema }` where `inputSchema` is a JSON Schema
//! object with `properties` and a `required` list.

use crate::types::{ParamSpec, ParamType, ToolDescriptor};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const PROTOCOL_VERSION: &str = "2025-06-18";
pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    /// Absent for notifications. An explicit `null` is kept as
    /// `Some(Value::Null)` so it is not mistaken for one.
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: &str, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(Value::from(id)),
            method: method.to_string(),
            params,
        }
    }

    pub fn notification(method: &str, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            method: method.to_string(),
            params,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Render a descriptor as a `tools/list` entry.
pub fn descriptor_to_json(tool: &ToolDescriptor) -> Value {
    let mut properties = Map::new();
    for param in &tool.params {
        let mut schema = Map::new();
        schema.insert("type".into(), json!(param.ty.json_type()));
        if param.ty == ParamType::IntegerArray {
            schema.insert("items".into(), json!({ "type": "integer" }));
        }
        if let Some(default) = &param.default {
            schema.insert("default".into(), default.clone());
        }
        if !param.description.is_empty() {
            schema.insert("description".into(), json!(param.description));
        }
        properties.insert(param.name.clone(), Value::Object(schema));
    }
    let required: Vec<&str> = tool
        .params
        .iter()
        .filter(|p| p.required)
        .map(|p| p.name.as_str())
        .collect();

    json!({
        "name": tool.name,
        "description": tool.description,
        "inputSchema": {
            "type": "object",
            "properties": properties,
            "required": required,
        }
    })
}

/// Parse a `tools/list` entry. Property order in the schema is the
/// positional argument order.
pub fn descriptor_from_json(value: &Value) -> Option<ToolDescriptor> {
    let name = value.get("name")?.as_str()?;
    let description = value
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let schema = value.get("inputSchema");
    let required: Vec<&str> = schema
        .and_then(|s| s.get("required"))
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut tool = ToolDescriptor::new(name, description);
    if let Some(properties) = schema
        .and_then(|s| s.get("properties"))
        .and_then(Value::as_object)
    {
        for (param_name, prop) in properties {
            let ty = match prop.get("type").and_then(Value::as_str) {
                Some("array") => {
                    // Only integer arrays are coercible; other item types fall back to text.
                    let items = prop
                        .get("items")
                        .and_then(|i| i.get("type"))
                        .and_then(Value::as_str);
                    if items == Some("integer") || items.is_none() {
                        ParamType::IntegerArray
                    } else {
                        ParamType::String
                    }
                }
                other => ParamType::from_json_type(other),
            };
            tool.params.push(ParamSpec {
                name: param_name.clone(),
                ty,
                required: required.contains(&param_name.as_str()),
                default: prop.get("default").cloned(),
                description: prop
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            });
        }
    }
    Some(tool)
}
