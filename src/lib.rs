//! MCP server for XML documents.
//!
//! Exposes XPath, XQuery and XSLT queries, structure summaries, irregularity
//! checks, validated transformations, batch corrections, backups and reloads
//! over JSON-RPC 2.0 stdio transport, compatible with any MCP-aware AI agent.

pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod handlers;
pub mod logging;
pub mod protocol;
pub mod server;

pub mod schema;
