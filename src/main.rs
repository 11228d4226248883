use std::path::PathBuf;

use tracing::{error, info, warn};
use xml_mcp_server::config::{ConfigResolver, CONFIG_ENV};
use xml_mcp_server::dispatcher::RequestDispatcher;
use xml_mcp_server::engine::saxon::SaxonFactory;
use xml_mcp_server::logging;
use xml_mcp_server::server::McpServer;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let resolver = match ConfigResolver::from_current_exe() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("xml-mcp-server: configuration error: {e}");
            std::process::exit(1);
        }
    };

    let config_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    let resolution = match resolver.resolve(config_path.as_deref()) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("xml-mcp-server: configuration error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = logging::init(&resolution.config.log_dir) {
        warn!(
            log_dir = %resolution.config.log_dir.display(),
            "logging to stderr only: {e}"
        );
    }
    for notice in &resolution.notices {
        warn!("{notice}");
    }
    info!(
        server_dir = %resolver.server_dir().display(),
        document = %resolution.config.document_path.display(),
        "configuration resolved"
    );

    let dispatcher = RequestDispatcher::new(SaxonFactory, resolution.config);
    let mut server = McpServer::new(dispatcher);
    if let Err(e) = server.run().await {
        error!("fatal error: {e}");
        std::process::exit(1);
    }
}
