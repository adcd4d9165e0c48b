//! Session-backed authentication for the Mtandao backend.
//!
//! Every protected route extracts a [`CurrentUser`] from the cookie-backed
//! session. When no identity is present, API-style requests (paths under
//! `/api/` or JSON bodies) get a 401 JSON error while browser navigations
//! are redirected to the login page, matching the original guard.
//!
//! Passwords are stored only as bcrypt hashes; plaintext never touches the
//! document.

use crate::models::{ErrorResponse, Identity, RegisterRequest};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use tower_sessions::Session;

/// Session key holding the logged-in username
pub const SESSION_USER_KEY: &str = "username";

/// Path browsers are sent to when not logged in
pub const LOGIN_PAGE: &str = "/login-page";

/// The authenticated caller, resolved from the session cookie.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub username: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|_| AuthError::Session)?;

        let username: Option<String> = session
            .get(SESSION_USER_KEY)
            .await
            .map_err(|_| AuthError::Session)?;

        match username {
            Some(username) => Ok(Self { username }),
            None => Err(AuthError::LoginRequired {
                api: is_api_request(parts),
            }),
        }
    }
}

/// API-style requests get JSON errors; everything else is a browser
/// navigation and gets a redirect.
fn is_api_request(parts: &Parts) -> bool {
    if parts.uri.path().starts_with("/api/") {
        return true;
    }
    parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

/// Authentication error
#[derive(Debug)]
pub enum AuthError {
    /// No identity in the session
    LoginRequired {
        /// Whether the request is API-style (JSON error) or a navigation
        /// (redirect to the login page)
        api: bool,
    },
    /// Session layer failure
    Session,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::LoginRequired { api: true } => (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Login required".to_string(),
                }),
            )
                .into_response(),
            AuthError::LoginRequired { api: false } => Redirect::to(LOGIN_PAGE).into_response(),
            AuthError::Session => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "session failure".to_string(),
                }),
            )
                .into_response(),
        }
    }
}

/// Hash a plaintext password with bcrypt.
pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, cost)
}

/// Verify a plaintext password against a stored bcrypt hash.
/// A malformed stored hash counts as a failed verification.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Validate the country-category fields of a registration and build the
/// identity union. Messages match the original validation responses.
pub fn build_identity(req: &RegisterRequest) -> Result<Identity, &'static str> {
    let field = |f: &Option<String>| {
        f.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    match req.country.as_str() {
        "local" => match (field(&req.national_id), field(&req.province)) {
            (Some(national_id), Some(province)) => Ok(Identity::Local {
                national_id,
                province,
            }),
            _ => Err("Fill National ID and Province"),
        },
        "foreign" => match (field(&req.passport_no), field(&req.country_name)) {
            (Some(passport_no), Some(country_name)) => Ok(Identity::Foreign {
                passport_no,
                country_name,
            }),
            _ => Err("Fill Passport Number and Country Name"),
        },
        _ => Err("Fill all required fields"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_request(country: &str) -> RegisterRequest {
        RegisterRequest {
            username: "alice".to_string(),
            name: "Alice".to_string(),
            email: String::new(),
            password: "pw".to_string(),
            co_password: "pw".to_string(),
            country: country.to_string(),
            dob: "1990-01-01".to_string(),
            phone: "0788".to_string(),
            national_id: None,
            province: None,
            passport_no: None,
            country_name: None,
        }
    }

    #[test]
    fn password_roundtrip() {
        let hash = hash_password("s3cret", 4).unwrap();
        assert_ne!(hash, "s3cret");
        assert!(verify_password("s3cret", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn verify_rejects_malformed_hash() {
        assert!(!verify_password("anything", "not-a-bcrypt-hash"));
    }

    #[test]
    fn local_identity_requires_national_id_and_province() {
        let mut req = register_request("local");
        assert_eq!(build_identity(&req), Err("Fill National ID and Province"));

        req.national_id = Some("1234".to_string());
        req.province = Some("Kigali".to_string());
        assert!(matches!(
            build_identity(&req),
            Ok(Identity::Local { .. })
        ));
    }

    #[test]
    fn foreign_identity_requires_passport_and_country() {
        let mut req = register_request("foreign");
        req.passport_no = Some("P123".to_string());
        assert_eq!(
            build_identity(&req),
            Err("Fill Passport Number and Country Name")
        );

        req.country_name = Some("Kenya".to_string());
        assert!(matches!(build_identity(&req), Ok(Identity::Foreign { .. })));
    }

    #[test]
    fn unknown_country_category_is_rejected() {
        let req = register_request("martian");
        assert_eq!(build_identity(&req), Err("Fill all required fields"));
    }
}
