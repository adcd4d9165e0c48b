//! # Mtandao Backend
//!
//! Social-networking backend persisting everything in a single JSON
//! document: users, posts, stories, ads, direct messages, likes, comments,
//! notifications and search, plus media uploads served from a local
//! directory.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐     ┌───────────────┐     ┌──────────────────┐
//! │  Client  │────▶│ Axum handlers │────▶│ Store (RwLock'd  │
//! └──────────┘     │ + session     │     │ JSON document)   │
//!                  │   guard       │     └──────────────────┘
//!                  └───────┬───────┘
//!                          │
//!                   uploads/ (media files)
//! ```
//!
//! Every mutation runs under the store's exclusive lock for the full
//! read-modify-write-persist sequence; the document is saved atomically.
//!
//! ## API Overview
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/health` | GET | Health check |
//! | `/register` | POST | Create an account |
//! | `/login` | POST | Start a session |
//! | `/logout` | GET | Clear the session |
//! | `/api/posts` | GET/POST | List / create posts |
//! | `/api/stories` | GET/POST | List / create stories |
//! | `/api/ads` | GET/POST | List / create ads |
//! | `/api/messages/start` | POST | Check for an existing conversation |
//! | `/api/messages/` | GET/POST | Conversation or partner list / send |
//! | `/api/notifications` | GET | Caller's notifications |
//! | `/api/notifications/read/:id` | POST | Mark one read |
//! | `/api/like` | POST | Toggle a like |
//! | `/api/comment` | POST | Add a comment |
//! | `/api/search` | GET | Search posts/stories/ads/users |
//! | `/api/profile` | GET | Caller's profile |
//! | `/api/profile/edit` | POST | Edit profile |
//! | `/uploads/:filename` | GET | Raw media bytes |

pub mod auth;
pub mod config;
pub mod handlers;
pub mod models;
pub mod store;
pub mod uploads;

pub use config::Config;
pub use handlers::AppState;
pub use store::Store;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    services::ServeDir,
    trace::TraceLayer,
};
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};

/// Build the Axum router with all endpoints and middleware.
pub fn build_router(state: AppState) -> Router {
    // Cookie settings mirror the original app's local-dev session config
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::seconds(
            i64::try_from(state.config.session_ttl.as_secs()).unwrap_or(24 * 3600),
        )));

    Router::new()
        // Health check (unauthenticated)
        .route("/health", get(handlers::health))
        // Browser surface
        .route("/", get(handlers::home))
        .route("/login-page", get(handlers::login_page))
        .route("/register-page", get(handlers::register_page))
        .route("/dashboard", get(handlers::dashboard))
        // Auth
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/logout", get(handlers::logout))
        // API
        .route(
            "/api/posts",
            get(handlers::list_posts).post(handlers::create_post),
        )
        .route(
            "/api/stories",
            get(handlers::list_stories).post(handlers::create_story),
        )
        .route(
            "/api/ads",
            get(handlers::list_ads).post(handlers::create_ad),
        )
        .route("/api/messages/start", post(handlers::start_conversation))
        .route(
            "/api/messages",
            get(handlers::list_messages).post(handlers::send_message),
        )
        .route(
            "/api/messages/",
            get(handlers::list_messages).post(handlers::send_message),
        )
        .route("/api/notifications", get(handlers::list_notifications))
        .route(
            "/api/notifications/read/:id",
            post(handlers::mark_notification_read),
        )
        .route("/api/like", post(handlers::toggle_like))
        .route("/api/comment", post(handlers::add_comment))
        .route("/api/search", get(handlers::search))
        .route("/api/profile", get(handlers::profile))
        .route("/api/profile/edit", post(handlers::edit_profile))
        // Uploaded media, served byte-for-byte
        .nest_service(
            uploads::UPLOADS_ROUTE,
            ServeDir::new(&state.config.upload_dir),
        )
        // Middleware stack (order matters: first added = outermost)
        .layer(DefaultBodyLimit::max(state.config.max_body_size))
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE]),
        )
        .layer(TraceLayer::new_for_http())
        .layer(session_layer)
        .with_state(state)
}
