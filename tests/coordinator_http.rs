//! Integration tests for the HTTP coordinator client

use rss_delegation::backend::BackendKind;
use rss_delegation::conf::keys;
use rss_delegation::{
    AccessRequest, AccessResult, CoordinatorClient, CoordinatorError, Decision, DelegatingManager,
    HttpCoordinatorClient, JobConf, ShuffleManager,
};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

use common::FakeFactory;

fn request(timeout: Duration) -> AccessRequest {
    let tags: BTreeSet<String> = ["gpu".to_string(), "ss_v4".to_string()].into_iter().collect();
    AccessRequest::new("team-a", tags, timeout)
}

#[tokio::test]
async fn test_access_granted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/access"))
        .and(body_json(serde_json::json!({
            "access_id": "team-a",
            "tags": ["gpu", "ss_v4"],
            "timeout_ms": 1000
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "SUCCESS",
            "message": ""
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HttpCoordinatorClient::new(&mock_server.uri()).unwrap();
    let result = assert_ok!(client.check_access(&request(Duration::from_secs(1))).await);

    assert_eq!(result, AccessResult::Success);
}

#[tokio::test]
async fn test_access_denied() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "ACCESS_DENIED",
            "message": "access id team-a is not in the whitelist"
        })))
        .mount(&mock_server)
        .await;

    let client = HttpCoordinatorClient::new(&mock_server.uri()).unwrap();
    let result = client
        .check_access(&request(Duration::from_secs(1)))
        .await
        .unwrap();

    assert_eq!(
        result,
        AccessResult::Denied("access id team-a is not in the whitelist".to_string())
    );
}

#[tokio::test]
async fn test_other_status_is_unreachable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "INTERNAL_ERROR",
            "message": "no available shuffle servers"
        })))
        .mount(&mock_server)
        .await;

    let client = HttpCoordinatorClient::new(&mock_server.uri()).unwrap();
    let result = client
        .check_access(&request(Duration::from_secs(1)))
        .await
        .unwrap();

    assert!(matches!(result, AccessResult::Unreachable(msg) if msg.contains("INTERNAL_ERROR")));
}

#[tokio::test]
async fn test_http_error_is_unreachable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/access"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .mount(&mock_server)
        .await;

    let client = HttpCoordinatorClient::new(&mock_server.uri()).unwrap();
    let result = client
        .check_access(&request(Duration::from_secs(1)))
        .await
        .unwrap();

    assert!(matches!(result, AccessResult::Unreachable(msg) if msg.contains("503")));
}

#[tokio::test]
async fn test_garbled_body_is_protocol_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/access"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock_server)
        .await;

    let client = HttpCoordinatorClient::new(&mock_server.uri()).unwrap();
    let err = assert_err!(client.check_access(&request(Duration::from_secs(1))).await);

    assert!(matches!(err, CoordinatorError::Protocol(_)));
}

#[tokio::test]
async fn test_slow_coordinator_times_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/access"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"status": "SUCCESS"}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let client = HttpCoordinatorClient::new(&mock_server.uri()).unwrap();
    let err = assert_err!(client.check_access(&request(Duration::from_millis(100))).await);

    assert!(matches!(err, CoordinatorError::Transport(_)));
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let client = HttpCoordinatorClient::new("127.0.0.1:1").unwrap();
    let err = assert_err!(client.check_access(&request(Duration::from_secs(1))).await);

    assert!(matches!(err, CoordinatorError::Transport(_)));
}

#[tokio::test]
async fn test_driver_negotiates_over_http() {
    let failing = MockServer::start().await;
    let granting = MockServer::start().await;
    let never_asked = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/access"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .expect(1)
        .mount(&failing)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "SUCCESS"
        })))
        .expect(1)
        .mount(&granting)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "ACCESS_DENIED",
            "message": "late denial"
        })))
        .expect(0)
        .mount(&never_asked)
        .await;

    let mut conf = JobConf::new();
    conf.set(keys::ACCESS_ID, "team-a")
        .set(keys::ACCESS_TIMEOUT_MS, "2000")
        .set(
            keys::COORDINATOR_QUORUM,
            format!("{},{},{}", failing.uri(), granting.uri(), never_asked.uri()),
        );

    let factory = FakeFactory::new();
    let manager = DelegatingManager::for_driver(&mut conf, &factory).await.unwrap();

    assert_eq!(manager.backend_kind(), BackendKind::Remote);
    assert_eq!(manager.coordinator_count(), 3);
    assert_eq!(Decision::read(&conf).unwrap(), Decision::Remote);

    manager.stop();
    assert!(manager.is_stopped());
}

#[tokio::test]
async fn test_driver_without_quorum_uses_local() {
    let mut conf = JobConf::new();
    conf.set(keys::ACCESS_ID, "team-a");

    let factory = FakeFactory::new();
    let manager = DelegatingManager::for_driver(&mut conf, &factory).await.unwrap();

    assert_eq!(manager.backend_kind(), BackendKind::Local);
    assert_eq!(manager.coordinator_count(), 0);
}
