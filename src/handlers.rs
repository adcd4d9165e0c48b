//! HTTP request handlers for the Mtandao backend API.
//!
//! Every handler follows the same contract: load state through the store,
//! validate before mutating, and either fully apply its mutation and save or
//! reject without touching the document. Protected handlers take a
//! [`CurrentUser`] so the session guard runs before any work.

use crate::auth::{self, CurrentUser, LOGIN_PAGE, SESSION_USER_KEY};
use crate::config::Config;
use crate::models::*;
use crate::store::{Store, StoreError};
use crate::uploads::{self, UploadError};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<Store>, config: Arc<Config>) -> Self {
        Self { store, config }
    }
}

// === Health Check ===

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// === Browser Stubs ===
//
// The real frontend templates are out of scope; these placeholders keep the
// original navigation surface (and its redirect semantics) reachable.

/// GET / - Entry point, sends browsers to the login page
pub async fn home() -> Redirect {
    Redirect::to(LOGIN_PAGE)
}

/// GET /login-page
pub async fn login_page() -> Html<&'static str> {
    Html("<!doctype html><title>Mtandao</title><h1>Sign in</h1>")
}

/// GET /register-page
pub async fn register_page() -> Html<&'static str> {
    Html("<!doctype html><title>Mtandao</title><h1>Create account</h1>")
}

/// GET /dashboard - Protected landing page. Unauthenticated browsers are
/// redirected to the login page by the guard.
pub async fn dashboard(State(state): State<AppState>, user: CurrentUser) -> Result<Html<String>, ApiError> {
    let name = state
        .store
        .read(|doc| doc.find_user(&user.username).map(|u| u.name.clone()))
        .await
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Html(format!(
        "<!doctype html><title>Mtandao</title><h1>Welcome, {name}</h1>"
    )))
}

// === Registration & Login ===

/// POST /register - Create a user account
///
/// Validation failures answer 400 with the original human-readable messages.
/// The username uniqueness check is re-run under the store's write lock, so
/// two racing registrations cannot both win.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let username = req.username.trim().to_lowercase();
    let email = req.email.trim().to_lowercase();
    let name = req.name.trim().to_string();

    let required = [
        username.as_str(),
        name.as_str(),
        req.password.as_str(),
        req.co_password.as_str(),
        req.dob.as_str(),
        req.phone.as_str(),
        req.country.as_str(),
    ];
    if required.iter().any(|f| f.trim().is_empty()) {
        return Err(ApiError::rejected("Fill all required fields"));
    }

    if req.password != req.co_password {
        return Err(ApiError::rejected("Passwords do not match"));
    }

    if state
        .store
        .read(|doc| doc.find_user(&username).is_some())
        .await
    {
        return Err(ApiError::rejected("User already exists"));
    }

    let identity = auth::build_identity(&req).map_err(ApiError::rejected)?;

    // Hash outside the lock; bcrypt is deliberately slow
    let password = auth::hash_password(&req.password, state.config.bcrypt_cost).map_err(|e| {
        error!(error = %e, "Password hashing failed");
        ApiError::Internal
    })?;

    let user = User {
        id: Uuid::new_v4(),
        username: username.clone(),
        name,
        email,
        password,
        identity,
        dob: req.dob,
        phone: req.phone,
        bio: String::new(),
        profile_pic: None,
        created_at: Utc::now(),
    };

    state
        .store
        .try_update(|doc| {
            if doc.find_user(&username).is_some() {
                return Err(ApiError::rejected("User already exists"));
            }
            doc.users.push(user);
            Ok(())
        })
        .await?;

    info!(%username, "User registered");

    Ok(Json(AuthResponse {
        success: true,
        message: "User registered successfully!".to_string(),
    }))
}

/// POST /login - Verify credentials and place the identity in the session
pub async fn login(
    State(state): State<AppState>,
    session: tower_sessions::Session,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let username = req.username.trim().to_lowercase();

    let stored_hash = state
        .store
        .read(|doc| doc.find_user(&username).map(|u| u.password.clone()))
        .await;

    match stored_hash {
        Some(hash) if auth::verify_password(&req.password, &hash) => {
            session
                .insert(SESSION_USER_KEY, &username)
                .await
                .map_err(|e| {
                    error!(error = %e, "Failed to write session");
                    ApiError::Internal
                })?;

            info!(%username, "Login successful");

            Ok(Json(AuthResponse {
                success: true,
                message: "Login successful".to_string(),
            }))
        }
        _ => {
            warn!(%username, "Login rejected");
            Err(ApiError::Rejected(
                StatusCode::UNAUTHORIZED,
                "Invalid username or password",
            ))
        }
    }
}

/// GET /logout - Clear the session and go back to the login page
pub async fn logout(session: tower_sessions::Session) -> Redirect {
    session.clear().await;
    Redirect::to(LOGIN_PAGE)
}

// === Posts / Stories ===

/// GET /api/posts - Full post list, most-recent-first
pub async fn list_posts(State(state): State<AppState>, _user: CurrentUser) -> Json<Vec<Post>> {
    Json(state.store.read(|doc| doc.posts.clone()).await)
}

/// POST /api/posts - Create a post (multipart: content + media files)
pub async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    create_feed_item(&state, &user, multipart, ItemKind::Post).await
}

/// GET /api/stories
pub async fn list_stories(State(state): State<AppState>, _user: CurrentUser) -> Json<Vec<Post>> {
    Json(state.store.read(|doc| doc.stories.clone()).await)
}

/// POST /api/stories
pub async fn create_story(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    create_feed_item(&state, &user, multipart, ItemKind::Story).await
}

/// Shared create path for posts and stories: non-empty content, optional
/// media, freshly generated id and UTC timestamp, prepended to its feed.
async fn create_feed_item(
    state: &AppState,
    user: &CurrentUser,
    multipart: Multipart,
    kind: ItemKind,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    let form = uploads::collect_form(multipart, &state.config.upload_dir).await?;

    let content = form.text("content").to_string();
    if content.is_empty() {
        return Err(ApiError::Validation("Content is required".to_string()));
    }

    let item = Post {
        id: Uuid::new_v4(),
        username: user.username.clone(),
        content,
        media: form.urls("media"),
        liked_by: Vec::new(),
        comments: Vec::new(),
        created_at: Utc::now(),
    };

    let created = item.clone();
    state
        .store
        .try_update(|doc| {
            doc.feed_mut(kind).insert(0, item);
            Ok::<_, ApiError>(())
        })
        .await?;

    info!(author = %user.username, %kind, id = %created.id, "Feed item created");

    Ok((StatusCode::CREATED, Json(created)))
}

// === Ads ===

/// GET /api/ads
pub async fn list_ads(State(state): State<AppState>, _user: CurrentUser) -> Json<Vec<Ad>> {
    Json(state.store.read(|doc| doc.ads.clone()).await)
}

/// POST /api/ads - Create an ad (multipart: content, payment, media files)
///
/// Posting an ad notifies its own author with the payment method used.
pub async fn create_ad(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Ad>), ApiError> {
    let form = uploads::collect_form(multipart, &state.config.upload_dir).await?;

    let content = form.text("content").to_string();
    let payment = form.text("payment").to_string();
    if content.is_empty() || payment.is_empty() {
        return Err(ApiError::Validation(
            "Content and payment method are required".to_string(),
        ));
    }

    let ad = Ad {
        id: Uuid::new_v4(),
        username: user.username.clone(),
        content,
        payment_method: payment.clone(),
        media: form.urls("media"),
        created_at: Utc::now(),
    };

    let created = ad.clone();
    state
        .store
        .try_update(|doc| {
            doc.ads.insert(0, ad);
            doc.notify(
                &user.username,
                format!("Your ad was posted (payment: {payment})"),
            );
            Ok::<_, ApiError>(())
        })
        .await?;

    info!(author = %user.username, id = %created.id, "Ad created");

    Ok((StatusCode::CREATED, Json(created)))
}

// === Messages ===

/// POST /api/messages/start - Check whether a conversation already exists
pub async fn start_conversation(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<StartChatRequest>,
) -> Result<Json<StartChatResponse>, ApiError> {
    let partner = req.with.as_deref().unwrap_or("").trim().to_string();

    state
        .store
        .read(|doc| {
            if partner.is_empty() || doc.find_user(&partner).is_none() {
                return Err(ApiError::NotFound("User not found".to_string()));
            }
            let started = !doc
                .messages
                .iter()
                .any(|m| m.between(&user.username, &partner));
            Ok(Json(StartChatResponse {
                success: true,
                started,
            }))
        })
        .await
}

/// GET /api/messages/ - With `?with=<user>`: the ordered conversation;
/// without: distinct partners, most-recent-interaction-first.
pub async fn list_messages(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ConversationQuery>,
) -> Response {
    match query.with.as_deref().filter(|w| !w.is_empty()) {
        Some(partner) => {
            let partner = partner.to_string();
            let conversation = state
                .store
                .read(|doc| {
                    let mut msgs: Vec<&Message> = doc
                        .messages
                        .iter()
                        .filter(|m| m.between(&user.username, &partner))
                        .collect();
                    msgs.sort_by_key(|m| m.created_at);
                    msgs.into_iter()
                        .map(ConversationMessage::from)
                        .collect::<Vec<_>>()
                })
                .await;
            Json(conversation).into_response()
        }
        None => {
            let partners = state
                .store
                .read(|doc| {
                    let mut involving: Vec<&Message> = doc
                        .messages
                        .iter()
                        .filter(|m| m.involves(&user.username))
                        .collect();
                    involving.sort_by_key(|m| std::cmp::Reverse(m.created_at));

                    let mut seen = std::collections::HashSet::new();
                    involving
                        .into_iter()
                        .map(|m| {
                            if m.sender == user.username {
                                m.receiver.clone()
                            } else {
                                m.sender.clone()
                            }
                        })
                        .filter(|partner| seen.insert(partner.clone()))
                        .map(|username| Partner { username })
                        .collect::<Vec<_>>()
                })
                .await;
            Json(partners).into_response()
        }
    }
}

/// POST /api/messages/ - Send a message (multipart: receiver, text, media)
///
/// The receiver reference is validated at write time; unknown receivers are
/// rejected rather than left dangling. The receiver gets a notification.
pub async fn send_message(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let form = uploads::collect_form(multipart, &state.config.upload_dir).await?;

    let receiver = form.text("receiver").to_string();
    let text = form.text("text").to_string();
    let media = form.urls("media");
    if receiver.is_empty() || (text.is_empty() && media.is_empty()) {
        return Err(ApiError::Validation(
            "Receiver and message content/media required".to_string(),
        ));
    }

    let message = Message {
        id: Uuid::new_v4(),
        sender: user.username.clone(),
        receiver: receiver.clone(),
        text,
        media,
        created_at: Utc::now(),
    };

    let created = message.clone();
    state
        .store
        .try_update(|doc| {
            if doc.find_user(&receiver).is_none() {
                return Err(ApiError::NotFound("Receiver user not found".to_string()));
            }
            doc.messages.push(message);
            doc.notify(&receiver, format!("New message from {}", user.username));
            Ok(())
        })
        .await?;

    info!(sender = %user.username, %receiver, id = %created.id, "Message sent");

    Ok((StatusCode::CREATED, Json(created)))
}

// === Notifications ===

/// GET /api/notifications - Caller's notifications, newest-first
pub async fn list_notifications(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Json<Vec<Notification>> {
    let notifications = state
        .store
        .read(|doc| {
            let mut mine: Vec<Notification> = doc
                .notifications
                .iter()
                .filter(|n| n.user == user.username)
                .cloned()
                .collect();
            mine.sort_by_key(|n| std::cmp::Reverse(n.created_at));
            mine
        })
        .await;
    Json(notifications)
}

/// POST /api/notifications/read/:id - Mark one of the caller's
/// notifications read. Unknown ids and other users' notifications both
/// answer 404.
pub async fn mark_notification_read(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<MarkReadResponse>, ApiError> {
    let not_found = || ApiError::NotFound("Notification not found".to_string());
    let id = Uuid::parse_str(&id).map_err(|_| not_found())?;

    state
        .store
        .try_update(|doc| {
            let notification = doc
                .notifications
                .iter_mut()
                .find(|n| n.id == id && n.user == user.username)
                .ok_or_else(not_found)?;
            notification.read = true;
            Ok(Json(MarkReadResponse { success: true }))
        })
        .await
}

// === Likes / Comments ===

/// POST /api/like - Toggle the caller in a post/story liked-by set
///
/// Liking (not unliking) notifies the owner, unless the owner is the caller.
pub async fn toggle_like(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<LikeRequest>,
) -> Result<Json<LikeResponse>, ApiError> {
    let (kind, id) = parse_item_ref(&req.kind, req.id.as_deref())?;

    state
        .store
        .try_update(|doc| {
            let item = doc
                .feed_mut(kind)
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or_else(|| ApiError::NotFound(format!("{kind} not found")))?;

            let action;
            if let Some(pos) = item.liked_by.iter().position(|u| *u == user.username) {
                item.liked_by.remove(pos);
                action = "unliked";
            } else {
                item.liked_by.push(user.username.clone());
                action = "liked";
            }
            let liked_by = item.liked_by.clone();
            let owner = item.username.clone();

            if action == "liked" && owner != user.username {
                doc.notify(&owner, format!("{} liked your {kind}", user.username));
            }

            Ok(Json(LikeResponse { liked_by, action }))
        })
        .await
}

/// POST /api/comment - Append a comment to a post/story
pub async fn add_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CommentRequest>,
) -> Result<Json<Comment>, ApiError> {
    let text = req.comment.trim().to_string();
    if text.is_empty() {
        return Err(ApiError::Validation("Invalid data".to_string()));
    }
    let (kind, id) = parse_item_ref(&req.kind, req.id.as_deref())?;

    let comment = Comment {
        id: Uuid::new_v4(),
        username: user.username.clone(),
        text,
        created_at: Utc::now(),
    };

    let created = comment.clone();
    state
        .store
        .try_update(|doc| {
            let item = doc
                .feed_mut(kind)
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or_else(|| ApiError::NotFound(format!("{kind} not found")))?;

            item.comments.push(comment);
            let owner = item.username.clone();

            if owner != user.username {
                doc.notify(&owner, format!("{} commented on your {kind}", user.username));
            }

            Ok::<(), ApiError>(())
        })
        .await?;

    Ok(Json(created))
}

/// Validate the `{type, id}` pair shared by like and comment requests.
/// A bad type is a 400; an unparseable id can never match and is a 404.
fn parse_item_ref(kind: &str, id: Option<&str>) -> Result<(ItemKind, Uuid), ApiError> {
    let kind = ItemKind::parse(kind)
        .ok_or_else(|| ApiError::Validation("Invalid data".to_string()))?;
    let id = id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Validation("Invalid data".to_string()))?;
    let id = Uuid::parse_str(id).map_err(|_| ApiError::NotFound(format!("{kind} not found")))?;
    Ok((kind, id))
}

// === Search ===

/// GET /api/search?q= - Case-insensitive substring search over post/story/ad
/// content and over user username/name.
pub async fn search(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    let q = query
        .q
        .as_deref()
        .map(str::to_lowercase)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::Validation("Query parameter required".to_string()))?;

    let results = state
        .store
        .read(|doc| {
            let matches = |text: &str| text.to_lowercase().contains(&q);
            SearchResponse {
                posts: doc
                    .posts
                    .iter()
                    .filter(|p| matches(&p.content))
                    .cloned()
                    .collect(),
                stories: doc
                    .stories
                    .iter()
                    .filter(|s| matches(&s.content))
                    .cloned()
                    .collect(),
                ads: doc
                    .ads
                    .iter()
                    .filter(|a| matches(&a.content))
                    .cloned()
                    .collect(),
                users: doc
                    .users
                    .iter()
                    .filter(|u| matches(&u.username) || matches(&u.name))
                    .map(|u| UserMatch {
                        username: u.username.clone(),
                        name: u.name.clone(),
                    })
                    .collect(),
            }
        })
        .await;

    Ok(Json(results))
}

// === Profile ===

/// GET /api/profile - Caller's record with the password hash stripped
pub async fn profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<UserProfile>, ApiError> {
    state
        .store
        .read(|doc| doc.find_user(&user.username).map(UserProfile::from))
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

/// POST /api/profile/edit - Update name/bio/phone (only non-empty fields)
/// and optionally replace the profile picture.
pub async fn edit_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> Result<Json<ProfileEditResponse>, ApiError> {
    let form = uploads::collect_form(multipart, &state.config.upload_dir).await?;

    let name = form.text("name").to_string();
    let bio = form.text("bio").to_string();
    let phone = form.text("phone").to_string();
    let profile_pic = form.first_url("profile_pic").map(str::to_string);

    let updated = state
        .store
        .try_update(|doc| {
            let record = doc
                .find_user_mut(&user.username)
                .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

            if !name.is_empty() {
                record.name = name;
            }
            if !bio.is_empty() {
                record.bio = bio;
            }
            if !phone.is_empty() {
                record.phone = phone;
            }
            if let Some(url) = profile_pic {
                record.profile_pic = Some(url);
            }

            Ok::<UserProfile, ApiError>(UserProfile::from(&*record))
        })
        .await?;

    info!(username = %user.username, "Profile updated");

    Ok(Json(ProfileEditResponse {
        success: true,
        message: "Profile updated".to_string(),
        user: updated,
    }))
}

// === Error Handling ===

/// API error types
#[derive(Debug)]
pub enum ApiError {
    /// Missing or malformed input (400, `{"error": ...}`)
    Validation(String),
    /// Unknown user/item/notification (404, `{"error": ...}`)
    NotFound(String),
    /// Register/login rejection (`{success: false, message}` envelope)
    Rejected(StatusCode, &'static str),
    Internal,
}

impl ApiError {
    /// 400 rejection with the register/login response envelope
    fn rejected(message: &'static str) -> Self {
        Self::Rejected(StatusCode::BAD_REQUEST, message)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        error!(error = %err, "Store failure");
        Self::Internal
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Multipart(e) => Self::Validation(format!("invalid multipart payload: {e}")),
            UploadError::Io(e) => {
                error!(error = %e, "Upload write failed");
                Self::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(message) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse { error: message }),
            )
                .into_response(),
            ApiError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse { error: message }),
            )
                .into_response(),
            ApiError::Rejected(status, message) => (
                status,
                Json(AuthResponse {
                    success: false,
                    message: message.to_string(),
                }),
            )
                .into_response(),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "internal server error".to_string(),
                }),
            )
                .into_response(),
        }
    }
}
