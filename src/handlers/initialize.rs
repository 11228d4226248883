use serde_json::{json, Value};
use tracing::info;

use crate::protocol::InitializeParams;

/// MCP protocol revision answered to every client.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Server name reported in `serverInfo`.
pub const SERVER_NAME: &str = "xml-mcp-server";

/// Handle the `initialize` handshake.
///
/// Client details are only logged; the answer does not depend on them.
pub fn handle(params: Option<&Value>) -> Value {
    let params = params.and_then(|v| serde_json::from_value::<InitializeParams>(v.clone()).ok());
    if let Some(params) = params {
        let client = params.client_info.as_ref();
        info!(
            client = client.and_then(|c| c.name.as_deref()).unwrap_or("unknown"),
            client_version = client.and_then(|c| c.version.as_deref()).unwrap_or("unknown"),
            protocol = params.protocol_version.as_deref().unwrap_or("unspecified"),
            "client connected"
        );
    }

    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": {}
        },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}
