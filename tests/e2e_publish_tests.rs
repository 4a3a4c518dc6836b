//! End-to-end tests for the scheduled publishing trigger
//!
//! Covers:
//! - Publishing due songs with each accepted credential
//! - Community posts and follower notifications written per release
//! - Rejected triggers leaving the database untouched
//! - CORS handling of the trigger endpoint

mod common;

use chrono::{Duration, Utc};
use common::*;
use greenbox_server::music::ReleaseStore;
use greenbox_server::notifications::{NotificationStore, NotificationType};
use greenbox_server::publishing::TriggerSecrets;
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn test_publishes_due_song_with_post_and_notifications() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let now = Utc::now();
    seed_song(&server.store, "song-due", "Opening Track", Some(now - Duration::minutes(5)));
    seed_song(&server.store, "song-future", "Later Track", Some(now + Duration::hours(2)));
    seed_song(&server.store, "song-draft", "Draft Track", None);

    let response = client.publish_scheduled(Some(CRON_SECRET)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["count"], 1);
    assert_eq!(body["message"], "Published 1 song(s)");
    assert_eq!(body["published"], serde_json::json!(["song-due"]));

    let song = server.store.get_song("song-due").unwrap().unwrap();
    assert!(song.is_published);
    assert!(!song.is_scheduled);
    assert!(song.published_at.is_some());

    let future = server.store.get_song("song-future").unwrap().unwrap();
    assert!(!future.is_published);
    assert!(future.is_scheduled);
    let draft = server.store.get_song("song-draft").unwrap().unwrap();
    assert!(draft.is_draft);
    assert!(!draft.is_published);

    let posts = server.store.get_artist_posts(ARTIST_ID).unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].song_id.as_deref(), Some("song-due"));
    assert_eq!(posts[0].content, "New release: Opening Track");

    for follower in [FOLLOWER_1_ID, FOLLOWER_2_ID] {
        let notifications = server.store.get_user_notifications(follower).unwrap();
        assert_eq!(notifications.len(), 1);
        let notification = &notifications[0];
        assert_eq!(notification.notification_type, NotificationType::NewRelease);
        assert!(!notification.is_read);
        assert_eq!(notification.link.as_deref(), Some("/songs/song-due"));
        assert_eq!(notification.metadata["song_id"], "song-due");
        assert_eq!(notification.metadata["artist_name"], ARTIST_STAGE_NAME);
    }
    assert!(server
        .store
        .get_user_notifications(ARTIST_OWNER_ID)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_second_run_publishes_nothing() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    seed_song(
        &server.store,
        "song-due",
        "Opening Track",
        Some(Utc::now() - Duration::minutes(1)),
    );

    let first: Value = client
        .publish_scheduled(Some(CRON_SECRET))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(first["count"], 1);

    let response = client.publish_scheduled(Some(CRON_SECRET)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let second: Value = response.json().await.unwrap();
    assert_eq!(second["count"], 0);
    assert_eq!(second["message"], "No songs to publish");
    assert!(second.get("published").is_none());

    assert_eq!(server.store.get_artist_posts(ARTIST_ID).unwrap().len(), 1);
    assert_eq!(
        server.store.get_user_notifications(FOLLOWER_1_ID).unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_publishes_several_songs_in_one_run() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let now = Utc::now();
    seed_song(&server.store, "song-a", "A", Some(now - Duration::hours(2)));
    seed_song(&server.store, "song-b", "B", Some(now - Duration::hours(1)));
    seed_follower(&server.store, "user-late-follower");

    let body: Value = client
        .publish_scheduled(Some(SERVICE_ROLE_KEY))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], 2);
    assert_eq!(body["message"], "Published 2 song(s)");

    assert_eq!(
        server
            .store
            .get_user_notifications("user-late-follower")
            .unwrap()
            .len(),
        2
    );
    assert_eq!(server.store.get_unread_count(FOLLOWER_2_ID).unwrap(), 2);
}

#[tokio::test]
async fn test_accepts_anon_key_as_fallback() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.publish_scheduled(Some(ANON_KEY)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_rejected_trigger_writes_nothing() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    seed_song(
        &server.store,
        "song-due",
        "Opening Track",
        Some(Utc::now() - Duration::minutes(1)),
    );

    let missing = client.publish_scheduled(None).await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    let body: Value = missing.json().await.unwrap();
    assert_eq!(body["error"], "Unauthorized");

    let wrong = client.publish_scheduled(Some("not-a-secret")).await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let malformed = client
        .publish_scheduled_with_header(&format!("Basic {}", CRON_SECRET))
        .await;
    assert_eq!(malformed.status(), StatusCode::UNAUTHORIZED);

    let song = server.store.get_song("song-due").unwrap().unwrap();
    assert!(!song.is_published);
    assert!(server.store.get_artist_posts(ARTIST_ID).unwrap().is_empty());
    assert!(server
        .store
        .get_user_notifications(FOLLOWER_1_ID)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_no_configured_secrets_rejects_everything() {
    let server = TestServer::spawn_with_secrets(TriggerSecrets::default()).await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.publish_scheduled(Some("")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let response = client.publish_scheduled(Some(CRON_SECRET)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_versioned_route_publishes() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    seed_song(
        &server.store,
        "song-due",
        "Opening Track",
        Some(Utc::now() - Duration::seconds(1)),
    );

    let response = client
        .publish_scheduled_with_header(&format!("Bearer {}", CRON_SECRET))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(server.store.get_song("song-due").unwrap().unwrap().is_published);
}

#[tokio::test]
async fn test_cors_preflight_and_headers() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client
        .preflight("/functions/v1/publish-scheduled-songs")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
    let allowed = response
        .headers()
        .get("access-control-allow-headers")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_lowercase();
    assert!(allowed.contains("authorization"));

    let response = client
        .client
        .post(format!(
            "{}/functions/v1/publish-scheduled-songs",
            server.base_url
        ))
        .header("Origin", "https://app.greenbox.test")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response
        .headers()
        .contains_key("access-control-allow-origin"));
}
