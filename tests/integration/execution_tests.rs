//! Batch execution against a mock session pool

use assert_matches::assert_matches;
use serde_json::{json, Value};
use sessions_executor::{BatchState, CodeExecutor, CodeFragment, TRANSPORT_ERROR_PREFIX};
use sessions_tests::common::*;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_single_fragment_prints() {
    setup_test_logging();
    let server = MockServer::start().await;
    mount_fragment(&server, "print(1)", stdout_response("1\n")).await;

    let client = static_client(&server);
    let outcome = client
        .execute(&[CodeFragment::new("print(1)")])
        .await
        .unwrap();

    assert_eq!(outcome.combined_log, "1\n");
    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.state, BatchState::Succeeded);
    assert!(outcome.success());
}

#[tokio::test]
async fn test_sandbox_error_sets_exit_code() {
    setup_test_logging();
    let server = MockServer::start().await;
    mount_fragment(
        &server,
        "1/0",
        json!({ "stdout": "", "stderr": "", "result": null, "error": "ZeroDivisionError" }),
    )
    .await;

    let outcome = static_client(&server)
        .execute(&[CodeFragment::new("1/0")])
        .await
        .unwrap();

    assert_eq!(outcome.combined_log, "\nZeroDivisionError");
    assert_eq!(outcome.exit_code, 1);
    assert_eq!(outcome.state, BatchState::PartiallyFailed);
    assert_eq!(outcome.error_detail.as_deref(), Some("ZeroDivisionError"));
}

#[tokio::test]
async fn test_sandbox_error_does_not_stop_batch() {
    setup_test_logging();
    let server = MockServer::start().await;
    mount_fragment(
        &server,
        "raise ValueError('x')",
        json!({ "stdout": "", "stderr": "", "error": "ValueError: x" }),
    )
    .await;
    mount_fragment(&server, "print('after')", stdout_response("after\n")).await;

    let outcome = static_client(&server)
        .execute(&[
            CodeFragment::new("raise ValueError('x')"),
            CodeFragment::new("print('after')"),
        ])
        .await
        .unwrap();

    assert_eq!(outcome.combined_log, "\nValueError: xafter\n");
    assert_eq!(outcome.exit_code, 1);
    assert_eq!(outcome.fragments_submitted, 2);
    assert_eq!(outcome.state, BatchState::PartiallyFailed);
}

#[tokio::test]
async fn test_outputs_concatenate_in_order() {
    setup_test_logging();
    let server = MockServer::start().await;
    mount_fragment(
        &server,
        "x = 6 * 7\nx",
        json!({ "stdout": "", "stderr": "", "result": 42 }),
    )
    .await;
    mount_fragment(
        &server,
        "import sys; sys.stderr.write('warn')",
        json!({ "stdout": "", "stderr": "warn", "result": "done" }),
    )
    .await;

    let outcome = static_client(&server)
        .execute(&[
            CodeFragment::new("x = 6 * 7\nx"),
            CodeFragment::new("import sys; sys.stderr.write('warn')"),
        ])
        .await
        .unwrap();

    assert_eq!(outcome.combined_log, "42warndone");
    assert_eq!(outcome.exit_code, 0);
}

#[tokio::test]
async fn test_timeout_aborts_remaining_fragments() {
    setup_test_logging();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/python/execute"))
        .and(body_partial_json(json!({ "properties": { "pythonCode": "slow()" } })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(stdout_response("late\n"))
                .set_delay(Duration::from_secs(5)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/python/execute"))
        .and(body_partial_json(json!({ "properties": { "pythonCode": "print('b')" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(stdout_response("b\n")))
        .expect(0)
        .mount(&server)
        .await;

    let client = impatient_client(&server, Duration::from_millis(200));
    let outcome = client
        .execute(&[CodeFragment::new("slow()"), CodeFragment::new("print('b')")])
        .await
        .unwrap();

    assert_eq!(outcome.state, BatchState::Aborted);
    assert_eq!(outcome.exit_code, 1);
    assert_eq!(outcome.fragments_submitted, 1);
    assert_eq!(outcome.fragments_total, 2);
    assert!(outcome
        .combined_log
        .starts_with(&format!("\n{}", TRANSPORT_ERROR_PREFIX)));
    assert!(!outcome.combined_log.contains("late"));
}

#[tokio::test]
async fn test_server_error_keeps_earlier_output() {
    setup_test_logging();
    let server = MockServer::start().await;
    mount_fragment(&server, "print(1)", stdout_response("1\n")).await;
    Mock::given(method("POST"))
        .and(path("/python/execute"))
        .and(body_partial_json(json!({ "properties": { "pythonCode": "boom()" } })))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/python/execute"))
        .and(body_partial_json(json!({ "properties": { "pythonCode": "print(3)" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(stdout_response("3\n")))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = static_client(&server)
        .execute(&[
            CodeFragment::new("print(1)"),
            CodeFragment::new("boom()"),
            CodeFragment::new("print(3)"),
        ])
        .await
        .unwrap();

    let expected = format!(
        "1\n\n{}HTTP status 500 Internal Server Error for url ({}/python/execute)",
        TRANSPORT_ERROR_PREFIX,
        server.uri()
    );
    assert_eq!(outcome.combined_log, expected);
    assert_eq!(outcome.state, BatchState::Aborted);
    assert_eq!(outcome.fragments_submitted, 2);
}

#[tokio::test]
async fn test_undecodable_body_aborts() {
    setup_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/python/execute"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = static_client(&server)
        .execute(&[CodeFragment::new("a"), CodeFragment::new("b")])
        .await
        .unwrap();

    assert_eq!(outcome.state, BatchState::Aborted);
    assert_eq!(outcome.fragments_submitted, 1);
    assert!(outcome.combined_log.contains(TRANSPORT_ERROR_PREFIX));
}

#[tokio::test]
async fn test_request_wire_format() {
    setup_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/python/execute"))
        .and(header("authorization", format!("Bearer {}", TEST_TOKEN).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(stdout_response("1\n")))
        .expect(1)
        .mount(&server)
        .await;

    static_client(&server)
        .execute(&[CodeFragment::new("print(1)")])
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: Value = requests[0].body_json().unwrap();
    assert_eq!(
        body,
        json!({
            "properties": {
                "identifier": TEST_IDENTIFIER,
                "codeInputType": "inline",
                "executionType": "synchronous",
                "pythonCode": "print(1)",
                "timeoutInSeconds": 100
            }
        })
    );
}

#[tokio::test]
async fn test_empty_batch_sends_nothing() {
    setup_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = static_client(&server).execute(&[]).await.unwrap();

    assert_eq!(outcome.combined_log, "");
    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.state, BatchState::Succeeded);
}

#[tokio::test]
async fn test_markdown_runs_python_blocks_only() {
    setup_test_logging();
    let server = MockServer::start().await;
    mount_fragment(&server, "print('hi')", stdout_response("hi\n")).await;
    Mock::given(method("POST"))
        .and(path("/python/execute"))
        .and(body_partial_json(json!({ "properties": { "pythonCode": "ls -la" } })))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let message = "Let me check.\n```python\nprint('hi')\n```\nand\n```sh\nls -la\n```\n";
    let client = static_client(&server);
    let outcome = client.execute_markdown(message).await.unwrap();

    assert_eq!(outcome.combined_log, "hi\n");
    assert_eq!(outcome.fragments_total, 1);

    // Same path through the executor trait
    let executor: &dyn CodeExecutor = &client;
    let blocks = executor.extract_code_blocks(message);
    assert_eq!(blocks.len(), 1);
    assert_matches!(blocks[0].language(), Some("python"));
}
