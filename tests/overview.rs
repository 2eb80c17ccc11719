mod common;

use common::{harness, logged_in};
use httpmock::prelude::*;
use postiva_rs::FetchError;
use serde_json::{json, Value};

fn video(id: &str) -> Value {
    json!({
        "id": id,
        "create_time": 1_735_689_600,
        "cover_image_url": "https://p16.tiktokcdn.com/cover.jpeg",
        "share_url": format!("https://www.tiktok.com/@alice/video/{id}"),
        "video_description": "Lake",
        "duration": 15,
        "height": 1920,
        "width": 1080,
        "title": "Lake",
        "embed_html": "<blockquote></blockquote>",
        "embed_link": "https://www.tiktok.com/embed/v2/1",
        "like_count": 12,
        "comment_count": 3,
        "share_count": 1,
        "view_count": 240
    })
}

#[tokio::test]
async fn profile_comes_from_nested_payload() {
    let server = MockServer::start_async().await;
    let h = logged_in(&server, "T1");

    let profile = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/tiktok/user-profile/")
                .query_param("refresh", "true")
                .header("authorization", "Bearer T1");
            then.status(200).json_body(json!({
                "success": true,
                "message": "Profile fetched",
                "data": {
                    "success": true,
                    "message": "",
                    "source": "tiktok_api",
                    "last_updated": "2025-01-02T03:04:05.000123",
                    "data": {
                        "open_id": "o1",
                        "display_name": "Alice",
                        "username": "alice",
                        "is_verified": true,
                        "follower_count": 1200,
                        "video_count": 4
                    }
                }
            }));
        })
        .await;

    let mut overview = h.client.overview();
    let user = overview.fetch_profile(true).await.unwrap();

    profile.assert_async().await;
    assert_eq!(user.display_name, "Alice");
    assert_eq!(user.follower_count, 1200);
    assert_eq!(overview.state().profile.as_ref(), Some(&user));
    assert_eq!(
        overview.state().last_updated.unwrap().to_rfc3339(),
        "2025-01-02T03:04:05.000123+00:00"
    );
    assert!(!overview.state().is_loading);
}

#[tokio::test]
async fn videos_builder_sends_count_and_refresh() {
    let server = MockServer::start_async().await;
    let h = logged_in(&server, "T1");

    let videos = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/tiktok/user-videos/")
                .query_param("max_count", "5")
                .query_param("refresh", "false");
            then.status(200).json_body(json!({
                "success": true,
                "message": "Videos fetched",
                "data": {
                    "videos": [video("7"), video("8")],
                    "total_count": 14,
                    "cursor": 1_735_689_600_000_i64,
                    "has_more": true
                }
            }));
        })
        .await;

    let mut overview = h.client.overview();
    let page = overview.fetch_videos().max_count(5).call().await.unwrap();

    videos.assert_async().await;
    assert_eq!(page.videos.len(), 2);
    assert_eq!(page.videos[0].view_count, 240);
    assert!(page.videos[0].created_at().is_some());

    let state = overview.state();
    assert_eq!(state.videos, page.videos);
    assert_eq!(state.total_videos, 14);
    assert!(state.has_more_videos);
}

#[tokio::test]
async fn videos_accept_null_attributes() {
    let server = MockServer::start_async().await;
    let h = logged_in(&server, "T1");

    let mut untitled = video("7");
    untitled["title"] = Value::Null;
    untitled["embed_html"] = Value::Null;
    untitled["like_count"] = Value::Null;

    server
        .mock_async(move |when, then| {
            when.method(GET).path("/tiktok/user-videos/");
            then.status(200).json_body(json!({
                "success": true,
                "message": null,
                "data": {
                    "videos": [untitled],
                    "total_count": 1,
                    "cursor": null,
                    "has_more": false
                }
            }));
        })
        .await;

    let mut overview = h.client.overview();
    let page = overview.fetch_videos().call().await.unwrap();

    let video = &page.videos[0];
    assert_eq!(video.id, "7");
    assert_eq!(video.title, "");
    assert_eq!(video.embed_html, "");
    assert_eq!(video.like_count, 0);
    assert_eq!(video.view_count, 240);
    assert_eq!(page.cursor, 0);
}

#[tokio::test]
async fn overview_applies_each_result_and_returns_the_error() {
    let server = MockServer::start_async().await;
    let h = logged_in(&server, "T1");

    server
        .mock_async(|when, then| {
            when.method(GET).path("/tiktok/user-profile/");
            then.status(404)
                .json_body(json!({"success": false, "message": "TikTok account not connected"}));
        })
        .await;

    let videos = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/tiktok/user-videos/")
                .query_param("max_count", "20");
            then.status(200).json_body(json!({
                "success": true,
                "message": "",
                "data": {"videos": [video("7")], "total_count": 1, "cursor": 0, "has_more": false}
            }));
        })
        .await;

    let mut overview = h.client.overview();
    let error = overview.fetch_overview(false).await.unwrap_err();

    videos.assert_async().await;
    assert!(matches!(
        &error,
        FetchError::Rejected { status: 404, message } if message == "TikTok account not connected"
    ));

    let state = overview.state();
    assert_eq!(state.videos.len(), 1);
    assert!(state.profile.is_none());
    assert_eq!(state.error.as_deref(), Some("TikTok account not connected"));

    overview.reset();
    assert!(overview.state().videos.is_empty());
}

#[tokio::test]
async fn unsuccessful_envelope_is_an_error() {
    let server = MockServer::start_async().await;
    let h = logged_in(&server, "T1");

    server
        .mock_async(|when, then| {
            when.method(GET).path("/tiktok/user-videos/");
            then.status(200)
                .json_body(json!({"success": false, "message": "Token expired, reconnect TikTok"}));
        })
        .await;

    let mut overview = h.client.overview();
    let error = overview.fetch_videos().call().await.unwrap_err();

    assert!(matches!(error, FetchError::Unsuccessful(_)));
    assert_eq!(
        overview.state().error.as_deref(),
        Some("Token expired, reconnect TikTok")
    );

    overview.clear_error();
    assert!(overview.state().error.is_none());
}

#[tokio::test]
async fn overview_requires_login() {
    let server = MockServer::start_async().await;
    let h = harness(&server);

    let mut overview = h.client.overview();

    assert!(matches!(
        overview.fetch_profile(false).await,
        Err(FetchError::NotLoggedIn)
    ));
}

#[tokio::test]
async fn video_detail_takes_the_first_video() {
    let server = MockServer::start_async().await;
    let h = logged_in(&server, "T1");

    let query = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/tiktok/video-query/")
                .query_param("video_ids", "7")
                .query_param("force_refresh", "true");
            then.status(200).json_body(json!({
                "success": true,
                "message": "",
                "data": {
                    "videos": [video("7")],
                    "total_count": 1,
                    "requested_count": 1,
                    "found_in_db": 0,
                    "missing_from_db": 1
                }
            }));
        })
        .await;

    let mut detail = h.client.video_detail();
    let video = detail.fetch("7", true).await.unwrap();

    query.assert_async().await;
    assert_eq!(video.id, "7");
    assert_eq!(detail.state().video.as_ref(), Some(&video));
    assert!(detail.state().last_updated.is_some());
}

#[tokio::test]
async fn missing_video_clears_the_previous_one() {
    let server = MockServer::start_async().await;
    let h = logged_in(&server, "T1");

    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/tiktok/video-query/")
                .query_param("video_ids", "7");
            then.status(200).json_body(json!({
                "success": true,
                "message": "",
                "data": {"videos": [video("7")], "total_count": 1}
            }));
        })
        .await;

    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/tiktok/video-query/")
                .query_param("video_ids", "404");
            then.status(200).json_body(json!({
                "success": true,
                "message": "",
                "data": {"videos": [], "total_count": 0}
            }));
        })
        .await;

    let mut detail = h.client.video_detail();
    detail.fetch("7", false).await.unwrap();

    let error = detail.fetch("404", false).await.unwrap_err();

    assert!(matches!(error, FetchError::NotFound));
    assert!(detail.state().video.is_none());
    assert_eq!(detail.state().error.as_deref(), Some("Video not found"));
}
