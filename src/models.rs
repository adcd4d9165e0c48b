//! Data models for the Mtandao backend.
//!
//! The whole database is one [`Document`] with six collections, persisted
//! as a single JSON file. Entity structs mirror that on-disk shape exactly;
//! request/response models live alongside them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Username (lowercased at registration, used as the reference key everywhere)
pub type Username = String;

// ============================================================================
// Persisted document
// ============================================================================

/// The full persisted document: six ordered collections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub posts: Vec<Post>,
    #[serde(default)]
    pub stories: Vec<Post>,
    #[serde(default)]
    pub ads: Vec<Ad>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub notifications: Vec<Notification>,
}

impl Document {
    pub fn find_user(&self, username: &str) -> Option<&User> {
        self.users.iter().find(|u| u.username == username)
    }

    pub fn find_user_mut(&mut self, username: &str) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.username == username)
    }

    /// The posts or stories collection, selected by item kind.
    pub fn feed(&self, kind: ItemKind) -> &Vec<Post> {
        match kind {
            ItemKind::Post => &self.posts,
            ItemKind::Story => &self.stories,
        }
    }

    pub fn feed_mut(&mut self, kind: ItemKind) -> &mut Vec<Post> {
        match kind {
            ItemKind::Post => &mut self.posts,
            ItemKind::Story => &mut self.stories,
        }
    }

    /// Append a notification for `user`.
    pub fn notify(&mut self, user: &str, text: String) {
        self.notifications.push(Notification {
            id: Uuid::new_v4(),
            user: user.to_string(),
            text,
            read: false,
            created_at: Utc::now(),
        });
    }
}

/// Country-category identity, tagged by the `country` field.
///
/// Locals register with a national ID and province; foreigners with a
/// passport number and country name. The tag replaces the original four
/// always-present-but-nullable fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "country", rename_all = "lowercase")]
pub enum Identity {
    Local {
        national_id: String,
        province: String,
    },
    Foreign {
        passport_no: String,
        country_name: String,
    },
}

/// A registered user as persisted (includes the bcrypt password hash).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: Username,
    pub name: String,
    pub email: String,
    /// bcrypt hash, never the plaintext
    pub password: String,
    #[serde(flatten)]
    pub identity: Identity,
    pub dob: String,
    pub phone: String,
    pub bio: String,
    pub profile_pic: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A post or story. Both collections share this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    /// Author username
    pub username: Username,
    pub content: String,
    #[serde(default)]
    pub media: Vec<String>,
    /// Usernames that liked this item, in like order
    #[serde(default)]
    pub liked_by: Vec<Username>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
}

/// Comment embedded in a post or story.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub username: Username,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Paid advertisement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ad {
    pub id: Uuid,
    pub username: Username,
    pub content: String,
    pub payment_method: String,
    #[serde(default)]
    pub media: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Direct message between two users. No read/delivery state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender: Username,
    pub receiver: Username,
    pub text: String,
    #[serde(default)]
    pub media: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Whether this message belongs to the conversation between `a` and `b`.
    pub fn between(&self, a: &str, b: &str) -> bool {
        (self.sender == a && self.receiver == b) || (self.sender == b && self.receiver == a)
    }

    /// Whether `user` is the sender or the receiver.
    pub fn involves(&self, user: &str) -> bool {
        self.sender == user || self.receiver == user
    }
}

/// Notification for a single user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    /// Target username
    pub user: Username,
    pub text: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Likeable/commentable item kind (posts and stories only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Post,
    Story,
}

impl ItemKind {
    /// Parse the wire value (`"post"` / `"story"`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "post" => Some(Self::Post),
            "story" => Some(Self::Story),
            _ => None,
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Post => f.write_str("post"),
            Self::Story => f.write_str("story"),
        }
    }
}

// === API Request/Response Models ===

/// Registration payload. Identity fields stay optional on the wire so
/// validation can answer with the original human-readable messages instead
/// of a deserialization failure.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub co_password: String,
    /// Country category: `"local"` or `"foreign"`
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub dob: String,
    #[serde(default)]
    pub phone: String,
    pub national_id: Option<String>,
    pub province: Option<String>,
    pub passport_no: Option<String>,
    pub country_name: Option<String>,
}

/// Login payload
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Register/login response envelope
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
}

/// Caller-facing user record: the persisted user minus the password hash.
#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: Username,
    pub name: String,
    pub email: String,
    #[serde(flatten)]
    pub identity: Identity,
    pub dob: String,
    pub phone: String,
    pub bio: String,
    pub profile_pic: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            identity: user.identity.clone(),
            dob: user.dob.clone(),
            phone: user.phone.clone(),
            bio: user.bio.clone(),
            profile_pic: user.profile_pic.clone(),
            created_at: user.created_at,
        }
    }
}

/// Profile edit response
#[derive(Debug, Serialize)]
pub struct ProfileEditResponse {
    pub success: bool,
    pub message: String,
    pub user: UserProfile,
}

/// Start-conversation request (`POST /api/messages/start`)
#[derive(Debug, Deserialize)]
pub struct StartChatRequest {
    pub with: Option<String>,
}

/// Start-conversation response
#[derive(Debug, Serialize)]
pub struct StartChatResponse {
    pub success: bool,
    /// True when no message exists yet between the two users
    pub started: bool,
}

/// Query params for `GET /api/messages/`
#[derive(Debug, Deserialize)]
pub struct ConversationQuery {
    pub with: Option<String>,
}

/// Media attachment rendered for the conversation view.
///
/// The frontend contract collapses the list: no attachment serializes as
/// `null`, a single attachment as a bare string, several as a list.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MediaView {
    None,
    One(String),
    Many(Vec<String>),
}

impl From<&[String]> for MediaView {
    fn from(media: &[String]) -> Self {
        match media {
            [] => Self::None,
            [one] => Self::One(one.clone()),
            many => Self::Many(many.to_vec()),
        }
    }
}

/// Message as rendered in a conversation view (media collapsed).
#[derive(Debug, Serialize)]
pub struct ConversationMessage {
    pub id: Uuid,
    pub sender: Username,
    pub receiver: Username,
    pub text: String,
    pub media: MediaView,
    pub created_at: DateTime<Utc>,
}

impl From<&Message> for ConversationMessage {
    fn from(msg: &Message) -> Self {
        Self {
            id: msg.id,
            sender: msg.sender.clone(),
            receiver: msg.receiver.clone(),
            text: msg.text.clone(),
            media: MediaView::from(msg.media.as_slice()),
            created_at: msg.created_at,
        }
    }
}

/// Conversation partner entry (`GET /api/messages/` without `with`)
#[derive(Debug, Serialize)]
pub struct Partner {
    pub username: Username,
}

/// Like request (`POST /api/like`)
#[derive(Debug, Deserialize)]
pub struct LikeRequest {
    /// `"post"` or `"story"`
    #[serde(rename = "type", default)]
    pub kind: String,
    pub id: Option<String>,
}

/// Like response: the updated set plus what happened
#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub liked_by: Vec<Username>,
    pub action: &'static str,
}

/// Comment request (`POST /api/comment`)
#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    /// `"post"` or `"story"`
    #[serde(rename = "type", default)]
    pub kind: String,
    pub id: Option<String>,
    #[serde(default)]
    pub comment: String,
}

/// Search query params
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

/// Matched user in search results (public fields only)
#[derive(Debug, Serialize)]
pub struct UserMatch {
    pub username: Username,
    pub name: String,
}

/// Search response across all collections
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub posts: Vec<Post>,
    pub stories: Vec<Post>,
    pub ads: Vec<Ad>,
    pub users: Vec<UserMatch>,
}

/// Notification mark-read response
#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub success: bool,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
