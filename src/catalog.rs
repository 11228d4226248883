//! The fixed set of tools advertised on `tools/list`.
//!
//! [`ToolId`] is the only mapping from a wire name to an operation; the
//! dispatcher matches on it exhaustively, so adding a tool means adding a
//! variant, a descriptor and a dispatch arm.

use serde_json::{json, Value};

/// Identifier of every operation the server exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolId {
    XPathQuery,
    XQueryQuery,
    XsltTransform,
    StructureSummary,
    FindIrregularities,
    ApplyTransformation,
    BatchCorrections,
    CreateBackup,
    ReloadDocument,
}

impl ToolId {
    /// All tools in catalog order.
    pub const ALL: [ToolId; 9] = [
        ToolId::XPathQuery,
        ToolId::XQueryQuery,
        ToolId::XsltTransform,
        ToolId::StructureSummary,
        ToolId::FindIrregularities,
        ToolId::ApplyTransformation,
        ToolId::BatchCorrections,
        ToolId::CreateBackup,
        ToolId::ReloadDocument,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::XPathQuery => "xpath_query",
            Self::XQueryQuery => "xquery_query",
            Self::XsltTransform => "xslt_transform",
            Self::StructureSummary => "get_structure_summary",
            Self::FindIrregularities => "find_irregularities",
            Self::ApplyTransformation => "apply_transformation",
            Self::BatchCorrections => "batch_corrections",
            Self::CreateBackup => "create_backup",
            Self::ReloadDocument => "reload_document",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    /// Whether the operation changes the in-memory document.
    pub fn mutates_document(&self) -> bool {
        matches!(
            self,
            Self::ApplyTransformation | Self::BatchCorrections | Self::ReloadDocument
        )
    }

    fn description(&self) -> &'static str {
        match self {
            Self::XPathQuery => "Execute XPath 3.1 query on the XML document. Supports advanced features like maps, arrays, arrow operators, and higher-order functions. The version argument is informational only: every expression is evaluated by the XPath 3.1 processor, which accepts 2.0 and 3.0 syntax unchanged.",
            Self::XQueryQuery => "Execute XQuery 3.1 query for complex data extraction and transformation. Supports FLWOR expressions, functions, and modules.",
            Self::XsltTransform => "Apply XSLT 3.0 transformation to the XML document and return the output without modifying the document.",
            Self::StructureSummary => "Analyze and summarize XML document structure",
            Self::FindIrregularities => "Run validation checks using XPath or XQuery to find inconsistencies",
            Self::ApplyTransformation => "Apply XSLT transformation to modify the document with validation",
            Self::BatchCorrections => "Apply multiple corrections via auto-generated XSLT",
            Self::CreateBackup => "Create a timestamped backup of the current XML document",
            Self::ReloadDocument => "Reload XML document from disk",
        }
    }

    fn input_schema(&self) -> Value {
        match self {
            Self::XPathQuery => json!({
                "type": "object",
                "required": ["xpath"],
                "properties": {
                    "xpath": {
                        "type": "string",
                        "description": "XPath 3.1 expression to evaluate"
                    },
                    "version": {
                        "type": "string",
                        "enum": ["3.1", "3.0", "2.0"],
                        "default": "3.1",
                        "description": "XPath version the expression targets; reported back, evaluation always uses XPath 3.1"
                    },
                    "return_count": {
                        "type": "boolean",
                        "default": false,
                        "description": "If true, only return count of matches"
                    }
                }
            }),
            Self::XQueryQuery => json!({
                "type": "object",
                "required": ["xquery"],
                "properties": {
                    "xquery": {
                        "type": "string",
                        "description": "XQuery 3.1 expression to evaluate"
                    },
                    "external_vars": {
                        "type": "object",
                        "default": {},
                        "description": "Optional external variables as key-value pairs"
                    }
                }
            }),
            Self::XsltTransform => json!({
                "type": "object",
                "required": ["xslt"],
                "properties": {
                    "xslt": {
                        "type": "string",
                        "description": "XSLT 3.0 stylesheet as string"
                    },
                    "params": {
                        "type": "object",
                        "default": {},
                        "description": "Optional stylesheet parameters"
                    },
                    "save_output": {
                        "type": "string",
                        "description": "Optional file path to save output (relative to the document directory)"
                    }
                }
            }),
            Self::StructureSummary => json!({
                "type": "object",
                "properties": {
                    "max_depth": {
                        "type": "integer",
                        "minimum": 1,
                        "default": 3,
                        "description": "Maximum depth to analyze"
                    }
                }
            }),
            Self::FindIrregularities => json!({
                "type": "object",
                "required": ["checks"],
                "properties": {
                    "checks": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["xpath", "description"],
                            "properties": {
                                "xpath": { "type": "string" },
                                "description": { "type": "string" },
                                "type": {
                                    "type": "string",
                                    "enum": ["xpath", "xquery"],
                                    "default": "xpath"
                                }
                            }
                        }
                    }
                }
            }),
            Self::ApplyTransformation => json!({
                "type": "object",
                "required": ["xslt"],
                "properties": {
                    "xslt": {
                        "type": "string",
                        "description": "XSLT stylesheet to apply"
                    },
                    "validate": {
                        "type": "boolean",
                        "default": true,
                        "description": "Validate after transformation"
                    },
                    "description": {
                        "type": "string",
                        "default": "",
                        "description": "Description of the transformation"
                    }
                }
            }),
            Self::BatchCorrections => json!({
                "type": "object",
                "required": ["corrections"],
                "properties": {
                    "corrections": {
                        "type": "array",
                        "description": "List of correction operations",
                        "items": {
                            "type": "object",
                            "required": ["action", "xpath"],
                            "properties": {
                                "action": {
                                    "type": "string",
                                    "enum": ["set_text", "set_attribute", "remove_attribute", "rename", "delete"]
                                },
                                "xpath": {
                                    "type": "string",
                                    "description": "XSLT match pattern selecting the nodes to correct"
                                },
                                "name": { "type": "string" },
                                "value": { "type": "string" }
                            }
                        }
                    },
                    "validate": {
                        "type": "boolean",
                        "default": true
                    }
                }
            }),
            Self::CreateBackup | Self::ReloadDocument => json!({
                "type": "object",
                "properties": {}
            }),
        }
    }
}

/// Advertised description of one tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub id: ToolId,
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

impl ToolDescriptor {
    fn new(id: ToolId) -> Self {
        Self {
            id,
            name: id.name(),
            description: id.description(),
            input_schema: id.input_schema(),
        }
    }

    /// Top-level keys listed in the schema's `required` array.
    pub fn required(&self) -> Vec<&str> {
        self.input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|keys| keys.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Schema-declared default for a top-level key.
    pub fn default_for(&self, key: &str) -> Option<&Value> {
        self.input_schema
            .get("properties")
            .and_then(|props| props.get(key))
            .and_then(|prop| prop.get("default"))
    }

    pub fn to_json(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema,
        })
    }
}

/// Read-only catalog built once per dispatcher.
#[derive(Debug, Clone)]
pub struct ToolCatalog {
    descriptors: Vec<ToolDescriptor>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self {
            descriptors: ToolId::ALL.into_iter().map(ToolDescriptor::new).collect(),
        }
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn get(&self, id: ToolId) -> &ToolDescriptor {
        // `ToolId::ALL` is in declaration order.
        &self.descriptors[id as usize]
    }

    pub fn lookup(&self, name: &str) -> Option<&ToolDescriptor> {
        ToolId::from_name(name).map(|id| self.get(id))
    }

    /// The `tools/list` result.
    pub fn to_json(&self) -> Value {
        json!({
            "tools": self.descriptors.iter().map(ToolDescriptor::to_json).collect::<Vec<_>>()
        })
    }
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::new()
    }
}
