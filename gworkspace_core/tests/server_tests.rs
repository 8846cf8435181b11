use std::sync::Arc;

use gworkspace_core::mcp_server::{JsonRpcHandler, McpServer};
use gworkspace_core::testing::{StubAuthenticator, StubFactory};
use gworkspace_core::{
    fingerprint, CachePolicy, Dispatcher, GoogleClientFactory, ServiceKind, SessionManager,
    ToolCatalog,
};
use serde_json::{json, Value};

fn handler_with(factory: Arc<StubFactory>, multi_tenant: bool, services: &[ServiceKind]) -> JsonRpcHandler {
    let sessions = Arc::new(SessionManager::new(
        factory,
        multi_tenant,
        services.to_vec(),
        CachePolicy::default(),
    ));
    let catalog = Arc::new(ToolCatalog::new(services));
    let server = Arc::new(McpServer::new(Arc::new(Dispatcher::new(sessions, catalog))));
    JsonRpcHandler::new(server)
}

fn call(id: u64, name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {"name": name, "arguments": arguments},
    })
}

fn result_text(response: &Value) -> &str {
    response["result"]["content"][0]["text"].as_str().unwrap_or_default()
}

#[tokio::test]
async fn test_initialize_advertises_tools() {
    let handler = handler_with(Arc::new(StubFactory::new()), true, &ServiceKind::ALL);
    let response = handler
        .handle_request(
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "initialize",
                "params": {
                    "protocolVersion": "2025-03-26",
                    "capabilities": {},
                    "clientInfo": {"name": "test-client", "version": "0.0.1"}
                }
            }),
            None,
        )
        .await
        .unwrap();

    assert_eq!(response["id"], 1);
    assert_eq!(response["result"]["serverInfo"]["name"], "gworkspace_mcp");
    assert!(response["result"]["capabilities"]["tools"].is_object());
}

#[tokio::test]
async fn test_tools_list_full_and_scoped() {
    let handler = handler_with(Arc::new(StubFactory::new()), true, &ServiceKind::ALL);

    let all = handler
        .handle_request(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}), None)
        .await
        .unwrap();
    let tools = all["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 29);
    for tool in tools {
        assert!(tool["name"].as_str().unwrap().starts_with("google_"));
        assert_eq!(tool["inputSchema"]["type"], "object");
    }

    let scoped = handler
        .handle_request(
            json!({
                "jsonrpc": "2.0",
                "id": 2,
                "method": "tools/list",
                "params": {"scopes": ["calendar.readonly", "calendar"]}
            }),
            None,
        )
        .await
        .unwrap();
    let names: Vec<&str> = scoped["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names.len(), 7);
    assert_eq!(names[0], "google_calendar_list_calendars");
    assert_eq!(names[4], "google_calendar_create_event");
}

#[tokio::test]
async fn test_create_event_over_jsonrpc() {
    let factory = Arc::new(StubFactory::new());
    let handler = handler_with(factory.clone(), true, &ServiceKind::ALL);

    let mut request = call(
        3,
        "google_calendar_create_event",
        json!({
            "summary": "Sync",
            "start": "2025-04-02T10:00:00-07:00",
            "end": "2025-04-02T11:00:00-07:00"
        }),
    );
    request["params"]["_meta"] = json!({"authorization": "Bearer tok-A"});

    let response = handler.handle_request(request, None).await.unwrap();
    assert_eq!(response["result"]["isError"], false);
    assert_eq!(result_text(&response), "Created event 'Sync' (stub-event-1)");

    let calls = factory.log().calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].identity, fingerprint("tok-A"));
}

#[tokio::test]
async fn test_transport_credential_wins_over_meta() {
    let factory = Arc::new(StubFactory::new());
    let handler = handler_with(factory.clone(), true, &ServiceKind::ALL);

    let mut request = call(4, "google_gmail_list_labels", json!({}));
    request["params"]["_meta"] = json!({"authorization": "Bearer tok-meta"});
    handler.handle_request(request, Some("tok-header")).await.unwrap();

    assert_eq!(factory.log().calls()[0].identity, fingerprint("tok-header"));
}

#[tokio::test]
async fn test_tool_errors_stay_in_result() {
    let handler = handler_with(Arc::new(StubFactory::new()), true, &[ServiceKind::Gmail]);

    let unknown = handler
        .handle_request(call(5, "google_calendar_list_events", json!({})), Some("tok"))
        .await
        .unwrap();
    assert!(unknown.get("error").is_none());
    assert_eq!(unknown["result"]["isError"], true);
    assert_eq!(result_text(&unknown), "Unknown tool: google_calendar_list_events");

    let invalid = handler
        .handle_request(call(6, "google_gmail_send_email", json!({"to": []})), Some("tok"))
        .await
        .unwrap();
    assert_eq!(invalid["result"]["isError"], true);
    assert!(result_text(&invalid).starts_with("Error: Invalid arguments:"));
}

#[tokio::test]
async fn test_non_object_arguments_stay_in_result() {
    let factory = Arc::new(StubFactory::new());
    let handler = handler_with(factory.clone(), true, &ServiceKind::ALL);

    let response = handler
        .handle_request(call(11, "google_calendar_create_event", json!(["Sync"])), Some("tok"))
        .await
        .unwrap();
    assert!(response.get("error").is_none());
    assert_eq!(response["result"]["isError"], true);
    assert_eq!(
        result_text(&response),
        "Error: Invalid arguments: arguments must be an object (got array)"
    );
    assert_eq!(factory.builds(), 0);
}

#[tokio::test]
async fn test_protocol_errors_and_notifications() {
    let handler = handler_with(Arc::new(StubFactory::new()), true, &ServiceKind::ALL);

    let missing = handler
        .handle_request(json!({"jsonrpc": "2.0", "id": 9, "method": "resources/list"}), None)
        .await
        .unwrap();
    assert_eq!(missing["error"]["code"], -32601);

    let bad_params = handler
        .handle_request(
            json!({"jsonrpc": "2.0", "id": 10, "method": "tools/call", "params": {"arguments": {}}}),
            None,
        )
        .await
        .unwrap();
    assert_eq!(bad_params["error"]["code"], -32602);

    let note = handler
        .handle_request(
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            None,
        )
        .await;
    assert!(note.is_none());
}

#[tokio::test]
async fn test_meet_reuses_calendar_client_for_same_identity() {
    let factory = Arc::new(StubFactory::new());
    let handler = handler_with(factory.clone(), true, &ServiceKind::ALL);

    handler
        .handle_request(call(1, "google_calendar_list_calendars", json!({})), Some("tok-M"))
        .await
        .unwrap();
    handler
        .handle_request(call(2, "google_meet_list_conference_records", json!({})), Some("tok-M"))
        .await
        .unwrap();

    assert_eq!(factory.builds_of(ServiceKind::Calendar), 1);
    assert_eq!(factory.builds_of(ServiceKind::Meet), 1);
}

#[tokio::test]
async fn test_single_tenant_serves_default_identity() {
    let factory = Arc::new(StubFactory::new());
    let sessions = Arc::new(SessionManager::new(
        factory.clone(),
        false,
        ServiceKind::ALL.to_vec(),
        CachePolicy::default(),
    ));
    sessions.initialize_default().await.unwrap();
    let built = factory.builds();

    let catalog = Arc::new(ToolCatalog::new(&ServiceKind::ALL));
    let server = Arc::new(McpServer::new(Arc::new(Dispatcher::new(sessions, catalog))));
    let handler = JsonRpcHandler::new(server);

    for id in 0..3 {
        let response = handler
            .handle_request(call(id, "google_drive_search_files", json!({"query": "roadmap"})), None)
            .await
            .unwrap();
        assert_eq!(response["result"]["isError"], false);
    }
    assert_eq!(factory.builds(), built);
}

#[tokio::test]
async fn test_authentication_exchange_happens_once_per_identity() {
    let authenticator = Arc::new(StubAuthenticator::new());
    let factory = Arc::new(GoogleClientFactory::new(
        authenticator.clone(),
        reqwest::Client::new(),
    ));
    let sessions = SessionManager::new(
        factory,
        true,
        ServiceKind::ALL.to_vec(),
        CachePolicy::default(),
    );

    let first = sessions.get(ServiceKind::Tasks, Some("tok-A")).await.unwrap();
    let second = sessions.get(ServiceKind::Tasks, Some("tok-A")).await.unwrap();
    assert!(first.same_instance(&second));
    assert_eq!(authenticator.calls(), 1);

    let other = sessions.get(ServiceKind::Tasks, Some("tok-B")).await.unwrap();
    assert!(!first.same_instance(&other));
    assert_eq!(authenticator.calls(), 2);

    let rejected = sessions.get(ServiceKind::Tasks, Some("bad-token")).await;
    assert!(rejected.is_err());
    assert_eq!(sessions.cached_len().await, 2);
}
