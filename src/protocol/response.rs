use serde::ser::{Serialize, Serializer};
use serde_json::Value;

use super::request::RpcId;

// ---------------------------------------------------------------------------
// JSON-RPC 2.0 response layer
// ---------------------------------------------------------------------------

/// JSON-RPC 2.0 response envelope.
#[derive(Debug, Clone, serde::Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RpcId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<RpcId>, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<RpcId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// JSON-RPC 2.0 error object (protocol-level errors).
#[derive(Debug, Clone, serde::Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcError {
    pub fn parse_error() -> Self {
        Self { code: -32700, message: "Parse error".into(), data: None }
    }

    pub fn invalid_request() -> Self {
        Self { code: -32600, message: "Invalid Request".into(), data: None }
    }

    pub fn invalid_request_with(detail: impl Into<String>) -> Self {
        Self { code: -32600, message: detail.into(), data: None }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {method}"),
            data: None,
        }
    }

    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self { code: -32602, message: detail.into(), data: None }
    }

    pub fn internal_error(detail: impl Into<String>) -> Self {
        Self { code: -32603, message: detail.into(), data: None }
    }
}

// ---------------------------------------------------------------------------
// MCP tool result layer (returned inside a *successful* JSON-RPC response)
// ---------------------------------------------------------------------------

/// MCP tool call result wrapper.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolResult {
    pub content: Vec<ToolResultContent>,
    #[serde(rename = "isError", skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

/// A single content block inside a tool result.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolResultContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolResultContent {
                content_type: "text".into(),
                text: text.into(),
            }],
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolResultContent {
                content_type: "text".into(),
                text: text.into(),
            }],
            is_error: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Tool response envelope (carried as the text of a tool result)
// ---------------------------------------------------------------------------

/// Envelope keys a payload may not carry.
const RESERVED_KEYS: [&str; 2] = ["success", "error"];

/// Operation-specific success fields.
pub type Payload = serde_json::Map<String, Value>;

/// Uniform outcome of one tool invocation.
///
/// Serializes as `{"success": true, ...payload}` or
/// `{"success": false, "error": ..., "tool": ...}`.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEnvelope {
    Success(Payload),
    Failure { error: String, tool: String },
}

impl ResponseEnvelope {
    /// Wrap an engine payload. `success` and `error` keys are reserved for
    /// the envelope and are dropped from the payload.
    pub fn success(mut payload: Payload) -> Self {
        for key in RESERVED_KEYS {
            payload.remove(key);
        }
        Self::Success(payload)
    }

    pub fn failure(error: impl Into<String>, tool: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
            tool: tool.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Self::Success(payload) => Some(payload),
            Self::Failure { .. } => None,
        }
    }

    /// The wire form. Reserved keys in a payload never override the
    /// envelope's own `success` and `error`.
    pub fn to_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        match self {
            Self::Success(payload) => {
                map.extend(
                    payload
                        .iter()
                        .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
                        .map(|(k, v)| (k.clone(), v.clone())),
                );
                map.insert("success".into(), Value::Bool(true));
            }
            Self::Failure { error, tool } => {
                map.insert("success".into(), Value::Bool(false));
                map.insert("error".into(), Value::String(error.clone()));
                map.insert("tool".into(), Value::String(tool.clone()));
            }
        }
        Value::Object(map)
    }
}

impl Serialize for ResponseEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// The envelope travels as pretty-printed JSON text; `isError` mirrors
/// `success == false`.
impl From<&ResponseEnvelope> for ToolResult {
    fn from(envelope: &ResponseEnvelope) -> Self {
        let text = format!("{:#}", envelope.to_value());
        if envelope.is_success() {
            Self::text(text)
        } else {
            Self::error(text)
        }
    }
}
