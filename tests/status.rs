mod common;

use std::time::Duration;

use common::{harness, logged_in};
use httpmock::prelude::*;
use postiva_rs::{
    Config, FetchError, Postiva, PublishStatus, SessionStore, StatusWatch, StorageKey,
    MIN_STATUS_POLL_INTERVAL,
};
use serde_json::json;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

async fn mock_status<'a>(server: &'a MockServer, status: &str) -> httpmock::Mock<'a> {
    let status = status.to_string();

    server
        .mock_async(move |when, then| {
            when.method(POST)
                .path("/tiktok/post-status/fetch")
                .header("authorization", "Bearer T1")
                .json_body(json!({"publish_id": "PID1"}));
            then.status(200).json_body(json!({
                "success": true,
                "message": "Status fetched",
                "data": {"status": status, "publish_id": "PID1"}
            }));
        })
        .await
}

#[tokio::test]
async fn check_status_parses_the_status() {
    let server = MockServer::start_async().await;
    let h = logged_in(&server, "T1");
    let fetch = mock_status(&server, "PROCESSING").await;

    let status = h.client.status_poller().check_status("PID1").await.unwrap();

    fetch.assert_async().await;
    assert!(status.success);
    assert_eq!(status.status, PublishStatus::Processing);
    assert_eq!(status.publish_id, "PID1");
    assert_eq!(status.error, None);
}

#[tokio::test]
async fn empty_publish_id_is_not_sent() {
    let server = MockServer::start_async().await;
    let h = logged_in(&server, "T1");
    let fetch = mock_status(&server, "completed").await;

    let error = h.client.status_poller().check_status("").await.unwrap_err();

    assert!(matches!(error, FetchError::InvalidInput(_)));
    assert_eq!(fetch.hits_async().await, 0);
}

#[tokio::test]
async fn check_status_requires_login() {
    let server = MockServer::start_async().await;
    let h = harness(&server);

    let error = h.client.status_poller().check_status("PID1").await.unwrap_err();

    assert!(matches!(error, FetchError::NotLoggedIn));
}

#[tokio::test]
async fn failed_status_check_uses_fallback_message() {
    let server = MockServer::start_async().await;
    let h = logged_in(&server, "T1");

    server
        .mock_async(|when, then| {
            when.method(POST).path("/tiktok/post-status/fetch");
            then.status(500);
        })
        .await;

    let error = h.client.status_poller().check_status("PID1").await.unwrap_err();

    assert!(matches!(error, FetchError::Rejected { status: 500, .. }));
    assert_eq!(error.to_string(), "HTTP error! status: 500");
}

#[tokio::test]
async fn watch_keeps_polling_after_terminal_status() {
    let server = MockServer::start_async().await;
    let h = logged_in(&server, "T1");
    let fetch = mock_status(&server, "completed").await;

    let mut watch = StatusWatch::with_interval(h.client.status_poller(), Duration::from_millis(50));
    let mut updates = watch.start("PID1");

    for _ in 0..3 {
        let status = timeout(WAIT, updates.recv()).await.unwrap().unwrap().unwrap();
        assert_eq!(status.status, PublishStatus::Completed);
        assert!(status.status.is_terminal());
    }

    assert!(watch.is_running());
    assert!(fetch.hits_async().await >= 3);

    assert!(watch.stop());
    assert!(!watch.is_running());
    assert!(!watch.stop());

    while timeout(WAIT, updates.recv()).await.unwrap().is_some() {}
}

#[tokio::test]
async fn zero_interval_is_raised_to_the_minimum() {
    let server = MockServer::start_async().await;
    let h = logged_in(&server, "T1");
    mock_status(&server, "processing").await;

    let mut watch = StatusWatch::with_interval(h.client.status_poller(), Duration::ZERO);
    assert_eq!(watch.interval(), MIN_STATUS_POLL_INTERVAL);

    let mut updates = watch.start("PID1");

    let status = timeout(WAIT, updates.recv()).await.unwrap().unwrap().unwrap();
    assert_eq!(status.status, PublishStatus::Processing);
    assert!(watch.is_running());
}

#[tokio::test]
async fn restarting_replaces_the_running_timer() {
    let server = MockServer::start_async().await;
    let h = logged_in(&server, "T1");
    mock_status(&server, "processing").await;

    let mut watch = StatusWatch::with_interval(h.client.status_poller(), Duration::from_millis(50));
    let mut first = watch.start("PID1");
    let mut second = watch.start("PID1");

    assert!(timeout(WAIT, first.recv()).await.unwrap().is_none());

    let status = timeout(WAIT, second.recv()).await.unwrap().unwrap().unwrap();
    assert_eq!(status.status, PublishStatus::Processing);
}

#[tokio::test]
async fn toggle_starts_then_stops() {
    let server = MockServer::start_async().await;
    let h = logged_in(&server, "T1");

    let mut watch = StatusWatch::new(h.client.status_poller());
    assert!(!watch.is_running());

    let updates = watch.toggle("PID1");
    assert!(updates.is_some());
    assert!(watch.is_running());

    assert!(watch.toggle("PID1").is_none());
    assert!(!watch.is_running());
}

#[tokio::test]
async fn dropping_the_watch_stops_polling() {
    let server = MockServer::start_async().await;
    let h = logged_in(&server, "T1");
    let fetch = mock_status(&server, "processing").await;

    let mut watch = StatusWatch::with_interval(h.client.status_poller(), Duration::from_millis(50));
    let mut updates = watch.start("PID1");
    drop(watch);

    assert!(timeout(WAIT, updates.recv()).await.unwrap().is_none());
    assert_eq!(fetch.hits_async().await, 0);
}

#[tokio::test]
async fn configured_interval_drives_the_client_watch() {
    let server = MockServer::start_async().await;
    mock_status(&server, "pending").await;

    let client = Postiva::from_config(&Config {
        api_base_url: server.base_url(),
        status_poll_interval: Duration::from_millis(50),
        ..Config::default()
    })
    .unwrap();
    client.store().set(StorageKey::AuthToken, "T1");

    let mut watch = client.status_watch();
    let mut updates = watch.start("PID1");

    let status = timeout(WAIT, updates.recv()).await.unwrap().unwrap().unwrap();
    assert_eq!(status.status, PublishStatus::Pending);
}
