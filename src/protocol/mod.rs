pub mod request;
pub mod response;

pub use request::{
    ApplyTransformationParams, BatchCorrectionsParams, CheckKind, ClientInfo, Correction,
    FindIrregularitiesParams, InitializeParams, Invocation, IrregularityCheck, JsonRpcRequest,
    RpcId, StructureSummaryParams, ToolCallParams, XPathQueryParams, XPathVersion, XQueryParams,
    XsltTransformParams,
};
pub use response::{
    JsonRpcError, JsonRpcResponse, Payload, ResponseEnvelope, ToolResult, ToolResultContent,
};
