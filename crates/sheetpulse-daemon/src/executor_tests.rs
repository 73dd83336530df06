use super::*;
use sheetpulse_protocols::WriteMode;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn credential() -> DecryptedCredential {
    DecryptedCredential::new(r#"{"access_token":"tok-123","ad_account":"act_9"}"#.to_string())
}

fn executor(server: &MockServer) -> HttpSyncExecutor {
    HttpSyncExecutor::new(Service::Meta, &format!("{}/meta", server.uri()), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_execute_posts_payload_and_parses_outcome() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/meta/sync"))
        .and(header("authorization", "Bearer sidecar-secret"))
        .and(body_partial_json(json!({
            "service": "meta",
            "tenantId": "42",
            "credential": { "ad_account": "act_9" },
            "params": { "targetDate": "2024-03-01" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "mode": "append",
            "rowNumber": 17,
            "durationMs": 840
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = SyncRequest::new("42").with_target_date(chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    let outcome = executor(&server)
        .with_auth_token("sidecar-secret")
        .execute(&credential(), &request)
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.mode, WriteMode::Append);
    assert_eq!(outcome.row_number, Some(17));
    assert_eq!(outcome.duration_ms, 840);
}

#[tokio::test]
async fn test_unauthorized_is_token_expired() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/meta/sync"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Error validating access token"))
        .mount(&server)
        .await;

    let err = executor(&server)
        .execute(&credential(), &SyncRequest::new("42"))
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::TokenExpired(_)));
}

#[tokio::test]
async fn test_too_many_requests_is_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/meta/sync"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let err = executor(&server)
        .execute(&credential(), &SyncRequest::new("42"))
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::RateLimited(_)));
}

#[tokio::test]
async fn test_bad_request_is_failed_with_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/meta/sync"))
        .respond_with(ResponseTemplate::new(400).set_body_string("sheet not found"))
        .mount(&server)
        .await;

    let err = executor(&server)
        .execute(&credential(), &SyncRequest::new("42"))
        .await
        .unwrap_err();
    match err {
        ExecutorError::Failed(message) => assert!(message.contains("sheet not found")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_outcome_is_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/meta/sync"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = executor(&server)
        .execute(&credential(), &SyncRequest::new("42"))
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::Failed(_)));
}

#[tokio::test]
async fn test_unreachable_is_unavailable() {
    let executor =
        HttpSyncExecutor::new(Service::Ga4, "http://127.0.0.1:1/ga4", Duration::from_secs(1)).unwrap();
    let err = executor
        .execute(&credential(), &SyncRequest::new("42"))
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::Unavailable(_)));
}

#[tokio::test]
async fn test_verify() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/meta/verify"))
        .and(body_partial_json(json!({ "service": "meta" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    executor(&server).verify(&credential()).await.unwrap();
}

#[test]
fn test_endpoint_gets_trailing_slash() {
    let executor =
        HttpSyncExecutor::new(Service::Shopify, "http://localhost:9000/shopify", Duration::from_secs(1)).unwrap();
    assert_eq!(executor.endpoint().as_str(), "http://localhost:9000/shopify/");
    assert!(HttpSyncExecutor::new(Service::Shopify, "not a url", Duration::from_secs(1)).is_err());
}
