//! Transport loop driven with in-memory streams.

mod common;

use serde_json::{json, Value};
use xml_mcp_server::dispatcher::RequestDispatcher;
use xml_mcp_server::server::McpServer;

use common::{test_config, FakeFactory};

const INITIALIZE: &str = r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","clientInfo":{"name":"test-host","version":"1.0"}}}"#;
const INITIALIZED: &str = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;

async fn run_session(factory: &FakeFactory, lines: &[&str]) -> Vec<Value> {
    let tmp = std::env::temp_dir();
    let dispatcher = RequestDispatcher::new(factory.clone(), test_config(&tmp));
    let mut server = McpServer::new(dispatcher);

    let input = lines.join("\n") + "\n";
    let mut output = Vec::new();
    server
        .serve(input.as_bytes(), &mut output)
        .await
        .expect("serve should end cleanly at end of input");

    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).expect("each output line is JSON"))
        .collect()
}

fn tool_call(id: i64, name: &str, arguments: Value) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": name, "arguments": arguments }
    })
    .to_string()
}

fn envelope(response: &Value) -> Value {
    let text = response["result"]["content"][0]["text"].as_str().unwrap();
    serde_json::from_str(text).unwrap()
}

#[tokio::test]
async fn full_session_answers_every_request_in_order() {
    let factory = FakeFactory::new();
    let list = r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#;
    let unknown = tool_call(3, "not_a_tool", json!({}));
    let summary = tool_call(4, "get_structure_summary", json!({}));

    let responses = run_session(
        &factory,
        &[INITIALIZE, INITIALIZED, list, unknown.as_str(), summary.as_str()],
    )
    .await;

    assert_eq!(responses.len(), 4, "notifications get no response");
    let ids: Vec<i64> = responses.iter().map(|r| r["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);

    assert_eq!(responses[0]["result"]["serverInfo"]["name"], json!("xml-mcp-server"));
    assert_eq!(responses[0]["result"]["protocolVersion"], json!("2024-11-05"));

    let tools = responses[1]["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 9);

    assert_eq!(responses[2]["result"]["isError"], json!(true));
    assert_eq!(
        envelope(&responses[2]),
        json!({ "success": false, "error": "Unknown tool: not_a_tool", "tool": "not_a_tool" })
    );

    assert!(responses[3]["result"].get("isError").is_none());
    let summary = envelope(&responses[3]);
    assert_eq!(summary["success"], json!(true));
    assert_eq!(summary["structure"]["analyzed_depth"], json!(3));
}

#[tokio::test]
async fn catalog_listing_does_not_build_engine() {
    let factory = FakeFactory::new();
    let list = r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#;

    let responses = run_session(&factory, &[INITIALIZE, list]).await;

    assert_eq!(responses.len(), 2);
    assert_eq!(factory.attempts(), 0);
}

#[tokio::test]
async fn requests_before_initialize_are_refused() {
    let factory = FakeFactory::new();
    let early = tool_call(7, "get_structure_summary", json!({}));

    let responses = run_session(&factory, &[early.as_str(), INITIALIZED, INITIALIZE]).await;

    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["id"], json!(7));
    assert_eq!(responses[0]["error"]["code"], json!(-32600));
    assert_eq!(responses[0]["error"]["message"], json!("Server not initialized"));
    assert_eq!(responses[1]["id"], json!(1));
    assert_eq!(factory.attempts(), 0);
}

#[tokio::test]
async fn malformed_lines_do_not_stop_the_loop() {
    let factory = FakeFactory::new();
    let ping = r#"{"jsonrpc":"2.0","id":5,"method":"ping"}"#;
    let wrong_version = r#"{"jsonrpc":"1.0","id":6,"method":"ping"}"#;

    let responses = run_session(
        &factory,
        &[INITIALIZE, "{ this is not json", "", wrong_version, ping],
    )
    .await;

    assert_eq!(responses.len(), 4);
    assert_eq!(responses[1]["error"]["code"], json!(-32700));
    assert_eq!(responses[2]["error"]["code"], json!(-32600));
    assert_eq!(responses[3]["id"], json!(5));
    assert_eq!(responses[3]["result"], json!({}));
}

#[tokio::test]
async fn unknown_method_is_reported() {
    let factory = FakeFactory::new();
    let unknown = r#"{"jsonrpc":"2.0","id":9,"method":"resources/list"}"#;

    let responses = run_session(&factory, &[INITIALIZE, unknown]).await;

    assert_eq!(responses[1]["error"]["code"], json!(-32601));
}

#[tokio::test]
async fn tools_call_without_params_is_invalid() {
    let factory = FakeFactory::new();
    let bare = r#"{"jsonrpc":"2.0","id":3,"method":"tools/call"}"#;

    let responses = run_session(&factory, &[INITIALIZE, bare]).await;

    assert_eq!(responses[1]["error"]["code"], json!(-32602));
}

#[tokio::test]
async fn failure_does_not_end_session_and_mutations_are_ordered() {
    let factory = FakeFactory::new();
    let transformed = "<recipe><title>After</title></recipe>";
    let failing = tool_call(2, "xpath_query", json!({ "xpath": "boom" }));
    let apply = tool_call(3, "apply_transformation", json!({ "xslt": transformed }));
    let query = tool_call(4, "xpath_query", json!({ "xpath": "/" }));

    let responses = run_session(&factory, &[INITIALIZE, failing.as_str(), apply.as_str(), query.as_str()]).await;

    assert_eq!(responses.len(), 4);
    let failed = envelope(&responses[1]);
    assert_eq!(failed["success"], json!(false));
    assert_eq!(failed["tool"], json!("xpath_query"));

    assert_eq!(envelope(&responses[2])["success"], json!(true));
    assert_eq!(envelope(&responses[3])["document"], json!(transformed));
    assert_eq!(factory.constructions(), 1);
}

#[tokio::test]
async fn empty_input_ends_cleanly() {
    let factory = FakeFactory::new();
    let responses = run_session(&factory, &[]).await;
    assert!(responses.is_empty());
}
