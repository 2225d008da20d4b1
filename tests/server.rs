mod common;

use std::sync::Arc;

use serde_json::{json, Value};

use course_rag::server::router;

use common::{system_with, ScriptedService, COMPUTER_USE, MCP};

/// Serve the router on an ephemeral port and return its base URL.
async fn spawn(service: Arc<ScriptedService>) -> String {
    let system = system_with(service);
    for doc in [COMPUTER_USE, MCP] {
        system.add_course_text(doc).await.unwrap();
    }
    let app = router(Arc::new(system));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn health_reports_ok() {
    let base = spawn(ScriptedService::new()).await;
    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn courses_endpoint_lists_titles() {
    let base = spawn(ScriptedService::new()).await;
    let body: Value = reqwest::get(format!("{}/api/courses", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["total_courses"], 2);
    assert_eq!(
        body["course_titles"],
        json!([
            "Building Towards Computer Use with Anthropic",
            "MCP: Build Rich-Context AI Apps with Anthropic"
        ])
    );
}

#[tokio::test]
async fn query_returns_answer_sources_and_session() {
    let service = ScriptedService::new();
    service.push_tool_uses(&[(
        "tu",
        "search_course_content",
        json!({"query": "protocol servers", "course_name": "MCP", "lesson_number": 1}),
    )]);
    service.push_text("They are reusable across hosts.");
    let base = spawn(service).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/query", base))
        .json(&json!({"query": "Why use protocol servers?"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["answer"], "They are reusable across hosts.");
    assert_eq!(
        body["sources"][0]["label"],
        "MCP: Build Rich-Context AI Apps with Anthropic - Lesson 1"
    );
    assert_eq!(
        body["sources"][0]["link"],
        "https://learn.deeplearning.ai/courses/mcp/lesson/1"
    );
    assert!(!body["session_id"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn empty_query_is_a_bad_request() {
    let base = spawn(ScriptedService::new()).await;
    let response = reqwest::Client::new()
        .post(format!("{}/api/query", base))
        .json(&json!({"query": "   "}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn generation_failure_maps_to_bad_gateway() {
    let service = ScriptedService::new();
    service.push_error("overloaded");
    let base = spawn(service).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/query", base))
        .json(&json!({"query": "hello", "session_id": "abc"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 502);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "generation_error");
    assert!(body["error"]["message"].as_str().unwrap().contains("overloaded"));
}
