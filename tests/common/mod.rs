use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use docchat::backend::HttpBackend;
use docchat::chat::SessionController;
use docchat::config::{BackendConfig, ChatConfig};
use docchat::storage::MemoryStore;

#[allow(dead_code)]
pub type TestController = SessionController<Arc<MemoryStore>, HttpBackend>;

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// HTTP backend pointed at a mock server
#[allow(dead_code)]
pub fn backend_for(server: &MockServer) -> HttpBackend {
    HttpBackend::new(&BackendConfig {
        base_url: server.uri(),
        timeout_seconds: 5,
        ..Default::default()
    })
    .expect("valid backend config")
}

/// Controller over a shared in-memory store and a mock server
#[allow(dead_code)]
pub fn controller_for(server: &MockServer, store: Arc<MemoryStore>) -> TestController {
    SessionController::new(store, backend_for(server), ChatConfig::default())
        .with_request_timeout(Duration::from_secs(2))
}

#[allow(dead_code)]
pub async fn mount_session_endpoint(server: &MockServer, session_id: &str) {
    Mock::given(method("POST"))
        .and(path("/api/chat/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session_id": session_id,
            "created_at": "2024-01-15T10:30:00",
            "initial_response": "Hello"
        })))
        .mount(server)
        .await;
}

#[allow(dead_code)]
pub fn chat_response(content: &str, session_id: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "response": content,
        "sources": [
            {"title": "Ch.1", "url": "/docs/intro", "relevance_score": 0.92}
        ],
        "session_id": session_id,
        "timestamp": "2024-01-15T10:30:01"
    }))
}
