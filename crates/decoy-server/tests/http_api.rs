//! Integration tests for the HTTP surface.
//!
//! Each test starts an in-process server on an ephemeral port and drives it
//! with reqwest.

use decoy_server::record::Recorder;
use decoy_server::server::{AppState, DecoyServer};
use decoy_server::service::MockService;
use decoy_server::store::{DocumentStore, InMemoryDocumentStore};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

const PREFIX: &str = "/_decoy";

/// Start a server backed by `store` and return its base URL
async fn start_server(store: Option<Arc<dyn DocumentStore>>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let service = Arc::new(MockService::new(store));
    let recorder = Recorder::new(Duration::from_secs(5)).unwrap();
    let server = DecoyServer::new(AppState::new(service, recorder, PREFIX));
    tokio::spawn(async move {
        let _ = server.serve(listener).await;
    });

    format!("http://{addr}")
}

async fn register(client: &Client, base: &str, payload: Value) -> reqwest::Response {
    client
        .post(format!("{base}{PREFIX}/mappings"))
        .json(&payload)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let base = start_server(None).await;
    let resp = reqwest::get(format!("{base}{PREFIX}/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_priority_scenario() {
    let base = start_server(None).await;
    let client = Client::new();

    let resp = register(
        &client,
        &base,
        json!({"rule": {"path": "/ping", "priority": 1},
               "response": {"status_code": 200, "text_body": "pong"}}),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    register(
        &client,
        &base,
        json!({"rule": {"path_regex": "^/p.*", "priority": 5},
               "response": {"status_code": 201, "text_body": "wild"}}),
    )
    .await;

    let resp = client.get(format!("{base}/ping")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(resp.text().await.unwrap(), "wild");
}

#[tokio::test]
async fn test_register_returns_mapping_and_lists_it() {
    let base = start_server(None).await;
    let client = Client::new();

    let resp = register(
        &client,
        &base,
        json!({"rule": {"methods": ["GET"], "path": "/items", "query_params": {"page": ["1"]}},
               "response": {"json_body": {"items": [1, 2]}, "content_type": "application/json"}}),
    )
    .await;
    let mapping: Value = resp.json().await.unwrap();
    assert_eq!(mapping["name"].as_str().unwrap().len(), 8);
    assert_eq!(mapping["response"]["status_code"], 200);

    let listed: Value = client
        .get(format!("{base}{PREFIX}/mappings"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["mappings"].as_array().unwrap().len(), 1);
    assert_eq!(listed["mappings"][0]["name"], mapping["name"]);

    let resp = client
        .get(format!("{base}/items?page=1&sort=asc"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()["content-type"].to_str().unwrap(),
        "application/json"
    );
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"items": [1, 2]}));
}

#[tokio::test]
async fn test_invalid_registrations_are_rejected() {
    let base = start_server(None).await;
    let client = Client::new();

    let resp = register(
        &client,
        &base,
        json!({"rule": {"path": "/a", "path_regex": "^/a"}, "response": {}}),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["errors"][0]["code"], "400");

    let resp = client
        .post(format!("{base}{PREFIX}/mappings"))
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = register(
        &client,
        &base,
        json!({"rule": {"path": "/b"}, "response": {"text_body": "x", "json_body": 1}}),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = register(
        &client,
        &base,
        json!({"rule": {"path": "/c"}, "response": {"status_code": 42}}),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert!(body["errors"][0]["message"]
        .as_str()
        .unwrap()
        .contains("invalid status code 42"));

    let listed: Value = client
        .get(format!("{base}{PREFIX}/mappings"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(listed["mappings"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_percent_encoded_path_is_matched_decoded() {
    let base = start_server(None).await;
    let client = Client::new();
    register(
        &client,
        &base,
        json!({"rule": {"path": "/files/my doc"}, "response": {"text_body": "doc"}}),
    )
    .await;

    let resp = client
        .get(format!("{base}/files/my%20doc"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "doc");
}

#[tokio::test]
async fn test_reset_and_unmatched() {
    let base = start_server(None).await;
    let client = Client::new();
    register(
        &client,
        &base,
        json!({"rule": {"path": "/gone"}, "response": {"text_body": "here"}}),
    )
    .await;

    let resp = client
        .delete(format!("{base}{PREFIX}/mappings"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["deleted"], 1);

    let resp = client.get(format!("{base}/gone")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_admin_route_is_not_stubbed() {
    let base = start_server(None).await;
    let client = Client::new();
    // A catch-all mapping must not shadow admin routes
    register(
        &client,
        &base,
        json!({"rule": {"path_regex": ".*"}, "response": {"text_body": "stub"}}),
    )
    .await;

    let resp = client
        .get(format!("{base}{PREFIX}/nope"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = client.get(format!("{base}/anything")).send().await.unwrap();
    assert_eq!(resp.text().await.unwrap(), "stub");
}

#[tokio::test]
async fn test_header_matching_over_http() {
    let base = start_server(None).await;
    let client = Client::new();
    register(
        &client,
        &base,
        json!({"rule": {"path": "/h", "headers": {"X-Api-Key": ["secret"]}},
               "response": {"text_body": "authorized"}}),
    )
    .await;

    let resp = client
        .get(format!("{base}/h"))
        .header("x-api-key", "secret")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client.get(format!("{base}/h")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_instances_share_mappings_through_store() {
    let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
    let first = start_server(Some(Arc::clone(&store))).await;
    let second = start_server(Some(Arc::clone(&store))).await;
    let client = Client::new();

    register(
        &client,
        &first,
        json!({"rule": {"path": "/shared"}, "response": {"text_body": "from first"}}),
    )
    .await;

    let resp = client.get(format!("{second}/shared")).send().await.unwrap();
    assert_eq!(resp.text().await.unwrap(), "from first");
}

#[tokio::test]
async fn test_record_against_stub() {
    let base = start_server(None).await;
    let client = Client::new();
    register(
        &client,
        &base,
        json!({"rule": {"methods": ["POST"], "path": "/echo"},
               "response": {"status_code": 202, "text_body": "recorded",
                            "content_type": "text/plain; charset=utf-8"}}),
    )
    .await;

    let resp = client
        .post(format!("{base}{PREFIX}/mappings:record"))
        .json(&json!({"scheme": base, "method": "POST", "path": "/echo", "text_body": "hi"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let recording: Value = resp.json().await.unwrap();
    assert_eq!(recording["request"]["method"], "POST");
    assert_eq!(recording["request"]["path"], "/echo");
    assert_eq!(recording["response"]["status_code"], 202);
    assert_eq!(recording["response"]["text_body"], "recorded");

    // The recorded response can be registered as-is
    let resp = register(
        &client,
        &base,
        json!({"rule": {"path": "/replay"}, "response": recording["response"]}),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_record_errors() {
    let base = start_server(None).await;
    let client = Client::new();

    let resp = client
        .post(format!("{base}{PREFIX}/mappings:record"))
        .body("garbage")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .post(format!("{base}{PREFIX}/mappings:record"))
        .json(&json!({"scheme": "http://127.0.0.1:1", "path": "/"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let base = start_server(None).await;
    let client = Client::new();
    client.get(format!("{base}/unmatched")).send().await.unwrap();

    let resp = client
        .get(format!("{base}{PREFIX}/metrics"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let text = resp.text().await.unwrap();
    assert!(text.contains("decoy_requests_total"));
}
