use std::{
    io::{Read, Write},
    net::TcpListener,
    sync::{mpsc, Arc},
    thread,
};

use agentbench::{
    functions::{http::load_http_tools, FunctionCall, ToolCall},
    providers::scripted::ScriptedProvider,
    AgentKind, AgentSettings, MessageRole,
};
use serde_json::json;
use tempfile::TempDir;

// Serves a single canned JSON response and reports the request line it saw.
fn serve_once(body: &'static str) -> (String, mpsc::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let address = listener.local_addr().expect("addr");
    let (sender, receiver) = mpsc::channel();

    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let mut request = Vec::new();
        let mut buffer = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let read = stream.read(&mut buffer).expect("read");
            if read == 0 {
                break;
            }
            request.extend_from_slice(&buffer[..read]);
        }
        let text = String::from_utf8_lossy(&request);
        let request_line = text.lines().next().unwrap_or_default().to_string();
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).expect("write");
        let _ = sender.send(request_line);
    });

    (format!("http://{address}"), receiver)
}

fn write_tools(dir: &TempDir, base_url: &str) -> std::path::PathBuf {
    let path = dir.path().join("tools.yaml");
    let yaml = format!(
        "tools:\n  - name: email_search\n    description: Search the mailbox\n    method: GET\n    url: {base_url}/email/search\n    query:\n      query:\n        type: string\n        description: Free-text search\n"
    );
    std::fs::write(&path, yaml).expect("write tools");
    path
}

#[tokio::test]
async fn http_tool_executes_and_returns_body() {
    let (base_url, seen) = serve_once(r#"{"results": [{"subject": "ACME invoice #42"}]}"#);
    let dir = TempDir::new().expect("tempdir");
    let registry = load_http_tools(write_tools(&dir, &base_url)).expect("tools");

    let definitions = registry.definitions();
    assert_eq!(definitions.len(), 1);
    assert_eq!(definitions[0].parameters.required, vec!["query"]);

    let result = registry
        .invoke(&FunctionCall::new("email_search", json!({ "query": "ACME" })))
        .await
        .expect("invoke");

    assert_eq!(result["status"], 200);
    assert_eq!(result["body"]["results"][0]["subject"], "ACME invoice #42");
    let request_line = seen.recv().expect("request line");
    assert!(request_line.starts_with("GET /email/search?query=ACME "));
}

#[tokio::test]
async fn react_agent_feeds_http_results_back() {
    let (base_url, _seen) = serve_once(r#"{"results": ["ACME invoice #42"]}"#);
    let dir = TempDir::new().expect("tempdir");
    let registry = load_http_tools(write_tools(&dir, &base_url)).expect("tools");

    let provider = Arc::new(
        ScriptedProvider::new()
            .with_tool_calls(
                vec![ToolCall::new(FunctionCall::new("email_search", json!({ "query": "ACME" }))).with_id("call_a")],
                None,
            )
            .with_reply("Invoice #42 from ACME."),
    );
    let agent = agentbench::build_agent(
        AgentKind::React,
        provider.clone(),
        AgentSettings::new("agent-model").with_tools(Arc::new(registry)),
    );
    let task = agentbench::create_task("email", "Find the ACME invoice", "#42", ["mentions #42"], None);

    let result = agent.run(&task, None).await.expect("run");
    assert_eq!(result.response, "Invoice #42 from ACME.");

    let requests = provider.requests();
    assert_eq!(requests[0].tools.len(), 1);
    let tool_message = requests[1].messages.last().expect("tool message");
    assert_eq!(tool_message.role, MessageRole::Tool);
    assert_eq!(tool_message.tool_call_id.as_deref(), Some("call_a"));
    assert!(tool_message.text().unwrap_or_default().contains("ACME invoice #42"));
}
