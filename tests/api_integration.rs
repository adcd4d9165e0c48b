//! Integration tests for the Mtandao backend API.
//!
//! Covers the full HTTP surface: registration/login/session flow, feed
//! creation, likes, comments, messaging, notifications, search, profile
//! editing and media uploads. Each test gets its own data file and upload
//! directory under the system temp dir.

use axum::http::{header, StatusCode};
use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestServer, TestServerBuilder};
use mtandao_backend::{build_router, AppState, Config, Store};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Per-test configuration: unique data file + upload dir, cheap bcrypt cost.
fn test_config() -> Config {
    let scratch: PathBuf = std::env::temp_dir().join(format!("mtandao-test-{}", Uuid::new_v4()));
    Config {
        bind_addr: "127.0.0.1".to_string(),
        port: 0,
        data_file: scratch.join("data_store.json"),
        upload_dir: scratch.join("uploads"),
        max_body_size: 16 * 1024 * 1024,
        bcrypt_cost: 4,
        session_ttl: Duration::from_secs(3600),
    }
}

/// Build a cookie-saving test server over a fresh store.
async fn build_test_server() -> TestServer {
    let config = test_config();
    tokio::fs::create_dir_all(&config.upload_dir).await.unwrap();
    tokio::fs::create_dir_all(config.data_file.parent().unwrap())
        .await
        .unwrap();

    let store = Arc::new(Store::open(&config.data_file).await.unwrap());
    let state = AppState::new(store, Arc::new(config));

    let app = build_router(state);
    let config = TestServerBuilder::new().save_cookies().into_config();
    TestServer::new_with_config(app, config).unwrap()
}

/// Registration payload for a local-category user.
fn register_payload(username: &str) -> Value {
    json!({
        "username": username,
        "name": format!("{username} Test"),
        "email": format!("{username}@example.com"),
        "password": "s3cret",
        "co_password": "s3cret",
        "country": "local",
        "national_id": "1234",
        "province": "Kigali",
        "dob": "1995-05-01",
        "phone": "0788123456"
    })
}

async fn register(server: &TestServer, username: &str) {
    server
        .post("/register")
        .json(&register_payload(username))
        .await
        .assert_status_ok();
}

/// Log in and leave the session cookie on the server's cookie jar.
async fn login(server: &TestServer, username: &str) {
    server
        .post("/login")
        .json(&json!({ "username": username, "password": "s3cret" }))
        .await
        .assert_status_ok();
}

async fn register_and_login(server: &TestServer, username: &str) {
    register(server, username).await;
    login(server, username).await;
}

/// Create a post and return its JSON record.
async fn create_post(server: &TestServer, content: &str) -> Value {
    let response = server
        .post("/api/posts")
        .multipart(MultipartForm::new().add_text("content", content))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json()
}

// =============================================================================
// Health Endpoint Tests
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let server = build_test_server().await;

    let response = server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

// =============================================================================
// Registration Tests
// =============================================================================

#[tokio::test]
async fn test_register_success_then_duplicate_fails() {
    let server = build_test_server().await;

    let response = server
        .post("/register")
        .json(&register_payload("alice"))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);

    // Same username again, even with different case
    let mut payload = register_payload("alice");
    payload["username"] = json!("ALICE");
    let response = server.post("/register").json(&payload).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "User already exists");
}

#[tokio::test]
async fn test_register_mismatched_passwords_creates_nothing() {
    let server = build_test_server().await;

    let mut payload = register_payload("bob");
    payload["co_password"] = json!("different");
    let response = server.post("/register").json(&payload).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["message"], "Passwords do not match");

    // No record was created, so logging in fails
    let response = server
        .post("/login")
        .json(&json!({ "username": "bob", "password": "s3cret" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_missing_required_fields() {
    let server = build_test_server().await;

    let mut payload = register_payload("carol");
    payload["phone"] = json!("");
    let response = server.post("/register").json(&payload).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["message"], "Fill all required fields");
}

#[tokio::test]
async fn test_register_local_requires_national_id_and_province() {
    let server = build_test_server().await;

    let mut payload = register_payload("dan");
    payload["province"] = json!(null);
    let response = server.post("/register").json(&payload).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["message"], "Fill National ID and Province");
}

#[tokio::test]
async fn test_register_foreign_requires_passport_and_country() {
    let server = build_test_server().await;

    let payload = json!({
        "username": "erin",
        "name": "Erin",
        "password": "s3cret",
        "co_password": "s3cret",
        "country": "foreign",
        "passport_no": "P1234567",
        "dob": "1990-02-02",
        "phone": "0788000000"
    });
    let response = server.post("/register").json(&payload).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["message"], "Fill Passport Number and Country Name");

    // With the country name present, registration succeeds
    let mut payload = payload;
    payload["country_name"] = json!("Kenya");
    server.post("/register").json(&payload).await.assert_status_ok();
}

// =============================================================================
// Login & Session Guard Tests
// =============================================================================

#[tokio::test]
async fn test_login_wrong_password_rejected() {
    let server = build_test_server().await;
    register(&server, "alice").await;

    let response = server
        .post("/login")
        .json(&json!({ "username": "alice", "password": "wrong" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Invalid username or password");
}

#[tokio::test]
async fn test_session_persists_across_protected_calls() {
    let server = build_test_server().await;
    register_and_login(&server, "alice").await;

    // Two protected calls on the same saved cookie, no re-authentication
    server.get("/api/profile").await.assert_status_ok();
    let response = server.get("/api/profile").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["username"], "alice");
}

#[tokio::test]
async fn test_api_requires_login() {
    let server = build_test_server().await;

    let response = server.get("/api/posts").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error"], "Login required");
}

#[tokio::test]
async fn test_browser_navigation_redirects_to_login() {
    let server = build_test_server().await;

    let response = server.get("/dashboard").await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/login-page"
    );
}

#[tokio::test]
async fn test_logout_clears_session() {
    let server = build_test_server().await;
    register_and_login(&server, "alice").await;

    server.get("/logout").await.assert_status(StatusCode::SEE_OTHER);

    let response = server.get("/api/profile").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Post & Story Tests
// =============================================================================

#[tokio::test]
async fn test_create_post_empty_content_rejected() {
    let server = build_test_server().await;
    register_and_login(&server, "alice").await;

    let response = server
        .post("/api/posts")
        .multipart(MultipartForm::new().add_text("content", "   "))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "Content is required");
}

#[tokio::test]
async fn test_new_posts_are_prepended() {
    let server = build_test_server().await;
    register_and_login(&server, "alice").await;

    create_post(&server, "first").await;
    create_post(&server, "second").await;

    let response = server.get("/api/posts").await;
    response.assert_status_ok();
    let posts: Value = response.json();
    let posts = posts.as_array().unwrap();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0]["content"], "second");
    assert_eq!(posts[1]["content"], "first");
}

#[tokio::test]
async fn test_post_media_is_uploaded_and_served() {
    let server = build_test_server().await;
    register_and_login(&server, "alice").await;

    let form = MultipartForm::new().add_text("content", "with media").add_part(
        "media",
        Part::bytes(b"fake image bytes".to_vec())
            .file_name("pic.png")
            .mime_type("image/png"),
    );
    let response = server.post("/api/posts").multipart(form).await;
    response.assert_status(StatusCode::CREATED);
    let post: Value = response.json();

    let media = post["media"].as_array().unwrap();
    assert_eq!(media.len(), 1);
    let url = media[0].as_str().unwrap();
    assert!(url.starts_with("/uploads/"));
    assert!(url.ends_with("_pic.png"));

    // Served back byte-for-byte
    let response = server.get(url).await;
    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), b"fake image bytes");
}

#[tokio::test]
async fn test_stories_are_a_separate_collection() {
    let server = build_test_server().await;
    register_and_login(&server, "alice").await;

    let response = server
        .post("/api/stories")
        .multipart(MultipartForm::new().add_text("content", "a story"))
        .await;
    response.assert_status(StatusCode::CREATED);

    let stories: Value = server.get("/api/stories").await.json();
    assert_eq!(stories.as_array().unwrap().len(), 1);

    let posts: Value = server.get("/api/posts").await.json();
    assert!(posts.as_array().unwrap().is_empty());
}

// =============================================================================
// Ad Tests
// =============================================================================

#[tokio::test]
async fn test_create_ad_requires_payment_method() {
    let server = build_test_server().await;
    register_and_login(&server, "alice").await;

    let response = server
        .post("/api/ads")
        .multipart(MultipartForm::new().add_text("content", "buy this"))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "Content and payment method are required");
}

#[tokio::test]
async fn test_create_ad_notifies_author() {
    let server = build_test_server().await;
    register_and_login(&server, "alice").await;

    let form = MultipartForm::new()
        .add_text("content", "buy this")
        .add_text("payment", "mobile money");
    let response = server.post("/api/ads").multipart(form).await;
    response.assert_status(StatusCode::CREATED);
    let ad: Value = response.json();
    assert_eq!(ad["payment_method"], "mobile money");

    let notifications: Value = server.get("/api/notifications").await.json();
    let notifications = notifications.as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(
        notifications[0]["text"],
        "Your ad was posted (payment: mobile money)"
    );
    assert_eq!(notifications[0]["read"], false);
}

// =============================================================================
// Like & Comment Tests
// =============================================================================

#[tokio::test]
async fn test_like_toggle_roundtrip() {
    let server = build_test_server().await;
    register_and_login(&server, "alice").await;
    let post = create_post(&server, "like me").await;
    let id = post["id"].as_str().unwrap();

    let response = server
        .post("/api/like")
        .json(&json!({ "type": "post", "id": id }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["action"], "liked");
    assert_eq!(body["liked_by"], json!(["alice"]));

    // Second toggle returns to the unliked state
    let response = server
        .post("/api/like")
        .json(&json!({ "type": "post", "id": id }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["action"], "unliked");
    assert_eq!(body["liked_by"], json!([]));
}

#[tokio::test]
async fn test_like_notifies_owner_but_not_self() {
    let server = build_test_server().await;
    register_and_login(&server, "bob").await;
    let post = create_post(&server, "bob's post").await;
    let id = post["id"].as_str().unwrap().to_string();

    // Bob liking his own post produces no notification
    server
        .post("/api/like")
        .json(&json!({ "type": "post", "id": id }))
        .await
        .assert_status_ok();

    register_and_login(&server, "alice").await;
    server
        .post("/api/like")
        .json(&json!({ "type": "post", "id": id }))
        .await
        .assert_status_ok();

    login(&server, "bob").await;
    let notifications: Value = server.get("/api/notifications").await.json();
    let notifications = notifications.as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["text"], "alice liked your post");
}

#[tokio::test]
async fn test_like_invalid_type_and_unknown_id() {
    let server = build_test_server().await;
    register_and_login(&server, "alice").await;

    let response = server
        .post("/api/like")
        .json(&json!({ "type": "ad", "id": "whatever" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "Invalid data");

    let response = server
        .post("/api/like")
        .json(&json!({ "type": "story", "id": Uuid::new_v4().to_string() }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"], "story not found");
}

#[tokio::test]
async fn test_comment_appends_and_notifies_owner() {
    let server = build_test_server().await;
    register_and_login(&server, "bob").await;
    let post = create_post(&server, "discuss").await;
    let id = post["id"].as_str().unwrap().to_string();

    register_and_login(&server, "alice").await;
    let response = server
        .post("/api/comment")
        .json(&json!({ "type": "post", "id": id, "comment": "nice one" }))
        .await;
    response.assert_status_ok();
    let comment: Value = response.json();
    assert_eq!(comment["username"], "alice");
    assert_eq!(comment["text"], "nice one");

    let posts: Value = server.get("/api/posts").await.json();
    assert_eq!(posts[0]["comments"][0]["text"], "nice one");

    login(&server, "bob").await;
    let notifications: Value = server.get("/api/notifications").await.json();
    assert_eq!(
        notifications.as_array().unwrap()[0]["text"],
        "alice commented on your post"
    );
}

// =============================================================================
// Message Tests
// =============================================================================

#[tokio::test]
async fn test_message_to_unknown_receiver_fails() {
    let server = build_test_server().await;
    register_and_login(&server, "alice").await;

    let form = MultipartForm::new()
        .add_text("receiver", "nobody")
        .add_text("text", "hello?");
    let response = server.post("/api/messages/").multipart(form).await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"], "Receiver user not found");
}

#[tokio::test]
async fn test_message_requires_text_or_media() {
    let server = build_test_server().await;
    register_and_login(&server, "alice").await;
    register(&server, "bob").await;

    let form = MultipartForm::new().add_text("receiver", "bob");
    let response = server.post("/api/messages/").multipart(form).await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_conversation_visible_to_both_sides_ascending() {
    let server = build_test_server().await;
    register(&server, "bob").await;
    register_and_login(&server, "alice").await;

    for text in ["first", "second"] {
        let form = MultipartForm::new()
            .add_text("receiver", "bob")
            .add_text("text", text);
        server
            .post("/api/messages/")
            .multipart(form)
            .await
            .assert_status(StatusCode::CREATED);
    }

    let conversation: Value = server.get("/api/messages/?with=bob").await.json();
    let msgs = conversation.as_array().unwrap();
    assert_eq!(msgs.len(), 2);
    assert_eq!(msgs[0]["text"], "first");
    assert_eq!(msgs[1]["text"], "second");
    // No attachments collapse to null in the conversation view
    assert!(msgs[0]["media"].is_null());

    // The receiver sees the same conversation, and got a notification
    login(&server, "bob").await;
    let conversation: Value = server.get("/api/messages/?with=alice").await.json();
    assert_eq!(conversation.as_array().unwrap().len(), 2);

    let notifications: Value = server.get("/api/notifications").await.json();
    assert_eq!(
        notifications.as_array().unwrap()[0]["text"],
        "New message from alice"
    );
}

#[tokio::test]
async fn test_partner_list_most_recent_first() {
    let server = build_test_server().await;
    register(&server, "bob").await;
    register(&server, "carol").await;
    register_and_login(&server, "alice").await;

    for receiver in ["bob", "carol"] {
        let form = MultipartForm::new()
            .add_text("receiver", receiver)
            .add_text("text", "hi");
        server
            .post("/api/messages/")
            .multipart(form)
            .await
            .assert_status(StatusCode::CREATED);
    }

    let partners: Value = server.get("/api/messages/").await.json();
    let partners = partners.as_array().unwrap();
    assert_eq!(partners.len(), 2);
    assert_eq!(partners[0]["username"], "carol");
    assert_eq!(partners[1]["username"], "bob");
}

#[tokio::test]
async fn test_start_conversation_flag() {
    let server = build_test_server().await;
    register(&server, "bob").await;
    register_and_login(&server, "alice").await;

    // Unknown partner
    let response = server
        .post("/api/messages/start")
        .json(&json!({ "with": "nobody" }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    // No messages yet: a new conversation would start
    let body: Value = server
        .post("/api/messages/start")
        .json(&json!({ "with": "bob" }))
        .await
        .json();
    assert_eq!(body["started"], true);

    let form = MultipartForm::new()
        .add_text("receiver", "bob")
        .add_text("text", "hello");
    server
        .post("/api/messages/")
        .multipart(form)
        .await
        .assert_status(StatusCode::CREATED);

    let body: Value = server
        .post("/api/messages/start")
        .json(&json!({ "with": "bob" }))
        .await
        .json();
    assert_eq!(body["started"], false);
}

// =============================================================================
// Notification Tests
// =============================================================================

#[tokio::test]
async fn test_mark_notification_read() {
    let server = build_test_server().await;
    register(&server, "bob").await;
    register_and_login(&server, "alice").await;

    let form = MultipartForm::new()
        .add_text("receiver", "bob")
        .add_text("text", "ping");
    server
        .post("/api/messages/")
        .multipart(form)
        .await
        .assert_status(StatusCode::CREATED);

    // Alice does not own bob's notification
    login(&server, "bob").await;
    let notifications: Value = server.get("/api/notifications").await.json();
    let id = notifications.as_array().unwrap()[0]["id"]
        .as_str()
        .unwrap()
        .to_string();

    login(&server, "alice").await;
    server
        .post(&format!("/api/notifications/read/{id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    // The owner can mark it, and the change shows up in later listings
    login(&server, "bob").await;
    let response = server.post(&format!("/api/notifications/read/{id}")).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);

    let notifications: Value = server.get("/api/notifications").await.json();
    assert_eq!(notifications.as_array().unwrap()[0]["read"], true);
}

#[tokio::test]
async fn test_mark_unknown_notification_read() {
    let server = build_test_server().await;
    register_and_login(&server, "alice").await;

    let response = server
        .post(&format!("/api/notifications/read/{}", Uuid::new_v4()))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"], "Notification not found");
}

// =============================================================================
// Search Tests
// =============================================================================

#[tokio::test]
async fn test_search_requires_query() {
    let server = build_test_server().await;
    register_and_login(&server, "alice").await;

    let response = server.get("/api/search").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "Query parameter required");
}

#[tokio::test]
async fn test_search_is_case_insensitive_across_collections() {
    let server = build_test_server().await;
    register_and_login(&server, "alice").await;
    create_post(&server, "Climbing Mount Karisimbi").await;

    let body: Value = server.get("/api/search?q=karisimbi").await.json();
    assert_eq!(body["posts"].as_array().unwrap().len(), 1);
    assert!(body["stories"].as_array().unwrap().is_empty());

    // Username match returns public fields only
    let body: Value = server.get("/api/search?q=ALI").await.json();
    let users = body["users"].as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["username"], "alice");
    assert!(users[0].get("password").is_none());
}

// =============================================================================
// Profile Tests
// =============================================================================

#[tokio::test]
async fn test_profile_strips_password() {
    let server = build_test_server().await;
    register_and_login(&server, "alice").await;

    let response = server.get("/api/profile").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["username"], "alice");
    assert_eq!(body["country"], "local");
    assert_eq!(body["province"], "Kigali");
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn test_profile_edit_updates_only_nonempty_fields() {
    let server = build_test_server().await;
    register_and_login(&server, "alice").await;

    let form = MultipartForm::new()
        .add_text("name", "")
        .add_text("bio", "climber and coder")
        .add_part(
            "profile_pic",
            Part::bytes(b"avatar".to_vec())
                .file_name("me.jpg")
                .mime_type("image/jpeg"),
        );
    let response = server.post("/api/profile/edit").multipart(form).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Profile updated");

    let profile: Value = server.get("/api/profile").await.json();
    // Empty name is ignored, bio and picture are applied
    assert_eq!(profile["name"], "alice Test");
    assert_eq!(profile["bio"], "climber and coder");
    assert!(profile["profile_pic"]
        .as_str()
        .unwrap()
        .starts_with("/uploads/"));
}
