//! Token acquisition and reuse across batches

use assert_matches::assert_matches;
use serde_json::json;
use sessions_auth::{AuthError, ClientSecretCredential, TokenCache, SESSIONS_SCOPE};
use sessions_executor::{BatchState, CodeFragment, ExecutionClient, ExecutorError};
use sessions_tests::common::*;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_PATH: &str = "/test-tenant/oauth2/v2.0/token";

fn credential(authority: &MockServer) -> ClientSecretCredential {
    ClientSecretCredential::new(&authority.uri(), "test-tenant", "client-id", "client-secret")
        .expect("Failed to build credential")
}

async fn mount_token(authority: &MockServer, expires_in: i64, calls: u64) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": expires_in,
            "access_token": "pool-token"
        })))
        .expect(calls)
        .mount(authority)
        .await;
}

async fn mount_pool(pool: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/python/execute"))
        .and(header("authorization", "Bearer pool-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(stdout_response("ok\n")))
        .mount(pool)
        .await;
}

#[tokio::test]
async fn test_token_reused_across_batches() {
    setup_test_logging();
    let authority = MockServer::start().await;
    let pool = MockServer::start().await;
    mount_token(&authority, 3600, 1).await;
    mount_pool(&pool).await;

    let client = ExecutionClient::with_provider(pool_config(&pool), credential(&authority)).unwrap();
    let batch = [CodeFragment::new("a"), CodeFragment::new("b")];

    let first = client.execute(&batch).await.unwrap();
    let second = client.execute(&batch).await.unwrap();

    assert_eq!(first.combined_log, "ok\nok\n");
    assert_eq!(second.combined_log, "ok\nok\n");
    assert!(client.token_cache().cached(SESSIONS_SCOPE).await.is_some());
}

#[tokio::test]
async fn test_token_inside_refresh_margin_is_replaced() {
    setup_test_logging();
    let authority = MockServer::start().await;
    let pool = MockServer::start().await;
    // Two minutes is inside the default five minute margin
    mount_token(&authority, 120, 2).await;
    mount_pool(&pool).await;

    let client = ExecutionClient::with_provider(pool_config(&pool), credential(&authority)).unwrap();

    client.execute(&[CodeFragment::new("a")]).await.unwrap();
    client.execute(&[CodeFragment::new("b")]).await.unwrap();

    assert_eq!(pool.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_token_requested_with_pool_scope() {
    setup_test_logging();
    let authority = MockServer::start().await;
    let pool = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("scope=https%3A%2F%2Fdynamicsessions.io%2F.default"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "expires_in": 3600,
            "access_token": "pool-token"
        })))
        .expect(1)
        .mount(&authority)
        .await;
    mount_pool(&pool).await;

    let client = ExecutionClient::with_provider(pool_config(&pool), credential(&authority)).unwrap();
    let outcome = client.execute(&[CodeFragment::new("a")]).await.unwrap();

    assert_eq!(outcome.state, BatchState::Succeeded);
}

#[tokio::test]
async fn test_concurrent_batches_share_one_refresh() {
    setup_test_logging();
    let authority = MockServer::start().await;
    let pool = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "expires_in": 3600, "access_token": "pool-token" }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&authority)
        .await;
    mount_pool(&pool).await;

    let cache = Arc::new(TokenCache::new(credential(&authority)));
    let left = ExecutionClient::new(pool_config(&pool), cache.clone()).unwrap();
    let right = ExecutionClient::new(pool_config(&pool), cache).unwrap();

    let batch = [CodeFragment::new("a")];
    let (l, r) = tokio::join!(left.execute(&batch), right.execute(&batch));

    assert!(l.unwrap().success());
    assert!(r.unwrap().success());
}

#[tokio::test]
async fn test_auth_failure_is_raised() {
    setup_test_logging();
    let authority = MockServer::start().await;
    let pool = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "bad secret"
        })))
        .mount(&authority)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&pool)
        .await;

    let client = ExecutionClient::with_provider(pool_config(&pool), credential(&authority)).unwrap();
    let result = client.execute(&[CodeFragment::new("print(1)")]).await;

    assert_matches!(
        &result,
        Err(ExecutorError::Auth { source: AuthError::Rejected { status: 401, .. }, .. })
    );
    let err = result.unwrap_err();
    let partial = err.partial_outcome().unwrap();
    assert_eq!(partial.state, BatchState::Aborted);
    assert_eq!(partial.fragments_submitted, 0);
    assert_eq!(partial.combined_log, "");
}

#[tokio::test]
async fn test_unauthorized_pool_response_drops_cached_token() {
    setup_test_logging();
    let authority = MockServer::start().await;
    let pool = MockServer::start().await;
    mount_token(&authority, 3600, 1).await;
    Mock::given(method("POST"))
        .and(path("/python/execute"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&pool)
        .await;

    let client = ExecutionClient::with_provider(pool_config(&pool), credential(&authority)).unwrap();
    let outcome = client
        .execute(&[CodeFragment::new("a"), CodeFragment::new("b")])
        .await
        .unwrap();

    assert_eq!(outcome.state, BatchState::Aborted);
    assert_eq!(outcome.fragments_submitted, 1);
    assert!(client.token_cache().cached(SESSIONS_SCOPE).await.is_none());
}

#[tokio::test]
async fn test_pool_request_carries_acquired_token() {
    setup_test_logging();
    let authority = MockServer::start().await;
    let pool = MockServer::start().await;
    mount_token(&authority, 3600, 1).await;
    mount_pool(&pool).await;

    let client = ExecutionClient::with_provider(pool_config(&pool), credential(&authority)).unwrap();
    assert!(client.token_cache().cached(SESSIONS_SCOPE).await.is_none());

    client.execute(&[CodeFragment::new("a")]).await.unwrap();

    let token = client.token_cache().cached(SESSIONS_SCOPE).await.unwrap();
    assert!(token.expires_at() > chrono::Utc::now());
    let requests = pool.received_requests().await.unwrap();
    assert_eq!(
        requests[0].headers.get("authorization").unwrap(),
        "Bearer pool-token"
    );
}
