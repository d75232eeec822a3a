//! HTTP and WebSocket tests against a live server on a free port.

mod common;

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use common::{seeded_index, template_chat, test_config, KeywordEmbedder, OfflineEmbedder};
use curriculum_rag::chat::AnswerPayload;
use curriculum_rag::config::Config;
use curriculum_rag::index::VectorIndex;
use curriculum_rag::server::{self, AppState, HealthResponse, INITIALIZING_REPLY};

struct TestServer {
    base: String,
    ws: String,
    _tmp: TempDir,
}

async fn start(state: AppState, tmp: TempDir) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        server::serve(listener, state).await.unwrap();
    });
    wait_for_server(&format!("http://{}", addr)).await;
    TestServer {
        base: format!("http://{}", addr),
        ws: format!("ws://{}/ws", addr),
        _tmp: tmp,
    }
}

async fn start_seeded() -> TestServer {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let index = seeded_index(&cfg).await;
    let chat = template_chat(index, &cfg);
    start(AppState::new(cfg, chat, 3), tmp).await
}

async fn start_uninitialised() -> TestServer {
    let tmp = TempDir::new().unwrap();
    let cfg: Config = test_config(&tmp);
    let index = Arc::new(VectorIndex::from_config(Arc::new(KeywordEmbedder), &cfg));
    let chat = template_chat(index, &cfg);
    start(AppState::new(cfg, chat, 0), tmp).await
}

async fn start_offline_embedder() -> TestServer {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let index = Arc::new(VectorIndex::from_config(Arc::new(OfflineEmbedder), &cfg));
    index.create_or_load(&[]).await;
    let chat = template_chat(index, &cfg);
    start(AppState::new(cfg, chat, 0), tmp).await
}

async fn wait_for_server(base: &str) {
    let client = reqwest::Client::new();
    let url = format!("{}/health", base);
    for _ in 0..50 {
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    panic!("Server did not become ready within 5 seconds");
}

// ─── HTTP ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health_reports_ready_index() {
    let server = start_seeded().await;
    let health: HealthResponse = reqwest::get(format!("{}/health", server.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(health.status, "healthy");
    assert!(health.vector_store_ready);
    assert!(health.services.vector_store_initialized);
    assert_eq!(health.services.documents, 3);
    assert!(health.services.markdown_dir_exists);
}

#[tokio::test]
async fn test_health_before_index_is_loaded() {
    let server = start_uninitialised().await;
    let health: HealthResponse = reqwest::get(format!("{}/health", server.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health.status, "healthy");
    assert!(!health.vector_store_ready);
}

#[tokio::test]
async fn test_chat_round_trip_with_session() {
    let server = start_seeded().await;
    let client = reqwest::Client::new();

    let first: AnswerPayload = client
        .post(format!("{}/api/chat/", server.base))
        .json(&json!({ "message": "What is OSSU?" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(first.response.starts_with("OSSU (Open Source Society University)"));
    assert!(!first.session_id.is_empty());
    assert!(!first.sources.is_empty() && first.sources.len() <= 3);
    assert_eq!(first.sources[0], "README.md");

    // Same session through the slash-less route.
    let second: AnswerPayload = client
        .post(format!("{}/api/chat", server.base))
        .json(&json!({ "message": "Which calculus course?", "session_id": first.session_id }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second.session_id, first.session_id);
    assert_eq!(second.sources[0], "math.md");

    let debug: Value = reqwest::get(format!("{}/debug", server.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(debug["app_state"]["sessions"], 1);
}

#[tokio::test]
async fn test_chat_empty_message_is_400() {
    let server = start_seeded().await;
    let resp = reqwest::Client::new()
        .post(format!("{}/api/chat/", server.base))
        .json(&json!({ "message": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["detail"], "message must not be empty");
}

#[tokio::test]
async fn test_chat_malformed_body_is_400() {
    let server = start_seeded().await;
    let resp = reqwest::Client::new()
        .post(format!("{}/api/chat/", server.base))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_delete_session_always_succeeds() {
    let server = start_seeded().await;
    let resp = reqwest::Client::new()
        .delete(format!("{}/api/chat/never-created", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "message": "Session cleared" }));
}

#[tokio::test]
async fn test_suggestions_and_banner() {
    let server = start_seeded().await;

    let suggestions: Value = reqwest::get(format!("{}/api/chat/suggestions", server.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let questions = suggestions["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 8);
    assert_eq!(questions[0], "What is OSSU?");

    let banner: Value = reqwest::get(format!("{}/", server.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(banner["endpoints"]["websocket"], "/ws");
    assert_eq!(banner["endpoints"]["chat"], "/api/chat/");
}

#[tokio::test]
async fn test_debug_lists_markdown_files() {
    let server = start_seeded().await;
    let debug: Value = reqwest::get(format!("{}/debug", server.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(debug["app_state"]["index_backend"], "sqlite");
    assert_eq!(debug["app_state"]["indexed_chunks"], 3);
    assert_eq!(debug["app_state"]["embedder"], "keyword-test");
    assert_eq!(debug["app_state"]["providers"], json!(["template"]));
    assert_eq!(
        debug["files"]["markdown_files"],
        json!(["README.md", "extras/systems.md", "math.md"])
    );
}

// ─── WebSocket ──────────────────────────────────────────────────────

async fn ws_exchange(url: &str, message: Value) -> Value {
    let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    socket
        .send(Message::Text(message.to_string()))
        .await
        .unwrap();
    loop {
        match socket.next().await.unwrap().unwrap() {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            _ => continue,
        }
    }
}

#[tokio::test]
async fn test_ws_returns_retrieved_context() {
    let server = start_seeded().await;
    let reply = ws_exchange(&server.ws, json!({ "message": "calculus" })).await;

    let response = reply["response"].as_str().unwrap();
    assert!(response.starts_with("Based on the available documentation:\n\n# Core Math"));
    assert!(response.ends_with("..."));

    let sources = reply["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 3);
    assert_eq!(sources[0]["metadata"]["source"], "math.md");
    assert!(sources[0]["page_content"].as_str().unwrap().chars().count() <= 100);
}

#[tokio::test]
async fn test_ws_multiple_messages_on_one_socket() {
    let server = start_seeded().await;
    let (mut socket, _) = tokio_tungstenite::connect_async(&server.ws).await.unwrap();

    for query in ["python", "network"] {
        socket
            .send(Message::Text(json!({ "message": query }).to_string()))
            .await
            .unwrap();
        let reply = loop {
            if let Message::Text(text) = socket.next().await.unwrap().unwrap() {
                break serde_json::from_str::<Value>(&text).unwrap();
            }
        };
        assert!(reply["response"].as_str().unwrap().starts_with("Based on the available documentation"));
    }
}

#[tokio::test]
async fn test_ws_before_index_is_loaded() {
    let server = start_uninitialised().await;
    let reply = ws_exchange(&server.ws, json!({ "message": "anything" })).await;
    assert_eq!(reply["response"], INITIALIZING_REPLY);
    assert_eq!(reply["sources"], json!([]));
}

#[tokio::test]
async fn test_ws_malformed_json_closes_connection_only() {
    let server = start_seeded().await;
    let (mut socket, _) = tokio_tungstenite::connect_async(&server.ws).await.unwrap();
    socket.send(Message::Text("not json".to_string())).await.unwrap();

    // The server drops the socket: the stream ends or yields a close frame.
    let next = socket.next().await;
    assert!(matches!(next, None | Some(Ok(Message::Close(_))) | Some(Err(_))));

    // The server keeps serving new connections.
    let reply = ws_exchange(&server.ws, json!({ "message": "python" })).await;
    assert!(reply["response"].is_string());
}

#[tokio::test]
async fn test_ws_search_failure_gets_apology_and_socket_stays_open() {
    let server = start_offline_embedder().await;
    let (mut socket, _) = tokio_tungstenite::connect_async(&server.ws).await.unwrap();

    for query in ["python", "calculus"] {
        socket
            .send(Message::Text(json!({ "message": query }).to_string()))
            .await
            .unwrap();
        let reply = loop {
            if let Message::Text(text) = socket.next().await.unwrap().unwrap() {
                break serde_json::from_str::<Value>(&text).unwrap();
            }
        };
        let response = reply["response"].as_str().unwrap();
        assert!(
            response.starts_with("Sorry, I encountered an error:"),
            "unexpected reply: {}",
            response
        );
        assert_eq!(reply["sources"], json!([]));
    }
}
