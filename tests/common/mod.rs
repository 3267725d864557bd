//! Common test utilities shared across integration tests

use serde_json::{json, Value};
use sessions_auth::StaticTokenProvider;
use sessions_executor::{ExecutionClient, ExecutorConfig};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Bearer token handed out by [`static_client`]
pub const TEST_TOKEN: &str = "test-access-token";

/// Session identifier used by every test client
pub const TEST_IDENTIFIER: &str = "test-session";

/// Setup logging for tests
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// Configuration pointing at a mock pool
pub fn pool_config(server: &MockServer) -> ExecutorConfig {
    ExecutorConfig::new(server.uri()).with_identifier(TEST_IDENTIFIER)
}

/// Client authenticating with a fixed token
pub fn static_client(server: &MockServer) -> ExecutionClient {
    ExecutionClient::with_provider(pool_config(server), StaticTokenProvider::new(TEST_TOKEN))
        .expect("Failed to build client")
}

/// Same as [`static_client`] with a short HTTP timeout
pub fn impatient_client(server: &MockServer, timeout: Duration) -> ExecutionClient {
    let config = pool_config(server).with_request_timeout(timeout);
    ExecutionClient::with_provider(config, StaticTokenProvider::new(TEST_TOKEN))
        .expect("Failed to build client")
}

/// Answer `code` with `body`
pub async fn mount_fragment(server: &MockServer, code: &str, body: Value) {
    Mock::given(method("POST"))
        .and(path("/python/execute"))
        .and(body_partial_json(json!({ "properties": { "pythonCode": code } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Sandbox response carrying only stdout
pub fn stdout_response(stdout: &str) -> Value {
    json!({ "stdout": stdout, "stderr": "", "result": null, "error": null })
}
