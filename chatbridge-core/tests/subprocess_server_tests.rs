// Subprocess tool-server tests - real child processes over stdio
#![cfg(unix)]

use chatbridge_core::config::McpSettings;
use chatbridge_core::tooling::{ConnectionManager, ConnectionStatus, ToolInvokeError};
use serde_json::json;
use std::time::Duration;
use tokio::time::timeout;

/// A shell stand-in for an MCP server that answers the fixed request
/// sequence initialize, tools/list, tools/call.
const SCRIPTED_SERVER: &str = r#"
printf '\033[32mstarting up\033[0m\n'
echo 'booting' >&2
read -r line
echo '{"jsonrpc":"2.0","id":"req-1","result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"sh","version":"1"}}}'
read -r line
read -r line
echo 'not json at all'
echo '{"jsonrpc":"2.0","id":"req-2","result":{"tools":[{"name":"add","description":"Add two numbers","inputSchema":{"type":"object"}}]}}'
read -r line
echo '{"jsonrpc":"2.0","id":"req-3","result":{"content":[{"type":"text","text":"5"}]}}'
read -r line
"#;

fn settings(servers: serde_json::Value) -> McpSettings {
    McpSettings::from_json_str(&json!({ "mcpServers": servers }).to_string()).expect("valid map")
}

#[tokio::test]
async fn talks_to_a_subprocess_server() {
    let manager = ConnectionManager::new();
    manager
        .initialize(&settings(json!({
            "calc": { "command": "sh", "args": ["-c", SCRIPTED_SERVER], "autoApprove": ["add"] }
        })))
        .await;

    let snapshots = manager.connections().await;
    assert_eq!(snapshots[0].status, ConnectionStatus::Connected, "{:?}", snapshots[0].error);

    let tools = manager.tools(Some("calc")).await;
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "add");
    assert!(tools[0].auto_approve);

    let result = manager
        .call_tool("calc", "add", json!({"a": 2, "b": 3}))
        .await
        .expect("tool result");
    assert_eq!(result["content"][0]["text"], json!("5"));

    manager.dispose().await;
    assert!(manager.connections().await.is_empty());
}

#[tokio::test]
async fn exiting_process_is_recorded_as_disconnected() {
    let manager = ConnectionManager::new();
    manager
        .initialize(&settings(json!({
            "crashy": { "command": "sh", "args": ["-c", "exit 3"] }
        })))
        .await;

    let snapshot = &manager.connections().await[0];
    assert_eq!(snapshot.status, ConnectionStatus::Disconnected);
    assert!(snapshot.error.is_some());
    assert!(manager.tools(None).await.is_empty());
}

#[tokio::test]
async fn missing_command_fails_only_its_own_server() {
    let manager = ConnectionManager::new();
    manager
        .initialize(&settings(json!({
            "ghost": { "command": "/definitely/not/a/real/binary" },
            "calc": { "command": "sh", "args": ["-c", SCRIPTED_SERVER] }
        })))
        .await;

    let snapshots = manager.connections().await;
    assert_eq!(snapshots[0].name, "ghost");
    assert_eq!(snapshots[0].status, ConnectionStatus::Disconnected);
    assert!(
        snapshots[0]
            .error
            .as_deref()
            .is_some_and(|err| err.contains("failed to spawn"))
    );
    assert_eq!(snapshots[1].status, ConnectionStatus::Connected);

    let err = manager
        .call_tool("ghost", "add", json!({}))
        .await
        .expect_err("not connected");
    assert!(matches!(err, ToolInvokeError::NotConnected { .. }));

    manager.dispose().await;
}

#[tokio::test]
async fn server_that_closes_stdout_but_keeps_running_does_not_stall() {
    let manager = ConnectionManager::new();
    let servers = settings(json!({
        "mute": { "command": "sh", "args": ["-c", "exec 1>&-; exec sleep 60"], "timeout": 5 }
    }));
    timeout(Duration::from_secs(20), manager.initialize(&servers))
        .await
        .expect("initialize finished");

    let snapshot = &manager.connections().await[0];
    assert_eq!(snapshot.status, ConnectionStatus::Disconnected);
    assert!(snapshot.error.is_some());

    timeout(Duration::from_secs(5), manager.dispose())
        .await
        .expect("dispose finished");
    assert!(manager.connections().await.is_empty());
}
