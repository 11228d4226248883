use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON-RPC 2.0 ID, either a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(i64),
    Str(String),
}

/// JSON-RPC 2.0 request envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<RpcId>,
    pub method: String,
    pub params: Option<serde_json::Value>,
}

/// MCP `initialize` params.
#[derive(Debug, Clone, Deserialize)]
pub struct InitializeParams {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: Option<String>,
    #[serde(rename = "clientInfo")]
    pub client_info: Option<ClientInfo>,
}

/// Client information sent during `initialize`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientInfo {
    pub name: Option<String>,
    pub version: Option<String>,
}

/// Parameters for `tools/call`.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    pub arguments: Option<serde_json::Value>,
}

/// One tool invocation handed to the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub name: String,
    pub arguments: Value,
}

impl Invocation {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

impl From<ToolCallParams> for Invocation {
    fn from(params: ToolCallParams) -> Self {
        Self {
            name: params.name,
            arguments: params
                .arguments
                .unwrap_or_else(|| Value::Object(Map::new())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tool parameters (deserialized after catalog defaults are applied)
// ---------------------------------------------------------------------------

/// XPath language level requested by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum XPathVersion {
    #[serde(rename = "2.0")]
    V2_0,
    #[serde(rename = "3.0")]
    V3_0,
    #[default]
    #[serde(rename = "3.1")]
    V3_1,
}

impl XPathVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V2_0 => "2.0",
            Self::V3_0 => "3.0",
            Self::V3_1 => "3.1",
        }
    }
}

/// Parameters for the `xpath_query` tool.
#[derive(Debug, Clone, Deserialize)]
pub struct XPathQueryParams {
    pub xpath: String,
    #[serde(default)]
    pub version: XPathVersion,
    #[serde(default)]
    pub return_count: bool,
}

/// Parameters for the `xquery_query` tool.
#[derive(Debug, Clone, Deserialize)]
pub struct XQueryParams {
    pub xquery: String,
    #[serde(default)]
    pub external_vars: Map<String, Value>,
}

/// Parameters for the `xslt_transform` tool.
#[derive(Debug, Clone, Deserialize)]
pub struct XsltTransformParams {
    pub xslt: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    pub save_output: Option<String>,
}

/// Parameters for the `get_structure_summary` tool.
#[derive(Debug, Clone, Deserialize)]
pub struct StructureSummaryParams {
    pub max_depth: u32,
}

/// Query language of an irregularity check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    #[default]
    XPath,
    XQuery,
}

/// One entry of `find_irregularities.checks`.
#[derive(Debug, Clone, Deserialize)]
pub struct IrregularityCheck {
    pub xpath: String,
    pub description: String,
    #[serde(rename = "type", default)]
    pub kind: CheckKind,
}

/// Parameters for the `find_irregularities` tool.
#[derive(Debug, Clone, Deserialize)]
pub struct FindIrregularitiesParams {
    pub checks: Vec<IrregularityCheck>,
}

/// Parameters for the `apply_transformation` tool.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplyTransformationParams {
    pub xslt: String,
    pub validate: bool,
    #[serde(default)]
    pub description: String,
}

/// One edit of a `batch_corrections` call, tagged by `action`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Correction {
    SetText { xpath: String, value: String },
    SetAttribute { xpath: String, name: String, value: String },
    RemoveAttribute { xpath: String, name: String },
    Rename { xpath: String, name: String },
    Delete { xpath: String },
}

/// Parameters for the `batch_corrections` tool.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchCorrectionsParams {
    pub corrections: Vec<Correction>,
    pub validate: bool,
}
