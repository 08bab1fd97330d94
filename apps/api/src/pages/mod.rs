//! Pages: each composes platform calls into a JSON view.
//!
//! Every page except `auth` sends unauthenticated visitors to
//! `/auth?next=<page>` and expects them back afterwards.

pub mod auth;
pub mod home;
pub mod resume;
pub mod upload;

use std::convert::Infallible;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::errors::AppError;
use crate::platform::Platform;

pub const SESSION_COOKIE: &str = "session";

/// The caller's session token, from `Authorization: Bearer <token>` or the
/// `session` cookie. Absent when neither is present.
#[derive(Debug, Clone, Default)]
pub struct SessionToken(pub Option<String>);

impl SessionToken {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for SessionToken {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let bearer = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim);

        let cookie = || {
            parts
                .headers
                .get_all(header::COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .flat_map(|v| v.split(';'))
                .filter_map(|pair| pair.trim().split_once('='))
                .find(|(name, _)| *name == SESSION_COOKIE)
                .map(|(_, value)| value.trim())
        };

        let token = bearer
            .or_else(cookie)
            .filter(|t| !t.is_empty())
            .map(String::from);
        Ok(Self(token))
    }
}

/// Page guard: redirects to the auth page, which returns the visitor to `next`.
pub async fn require_auth(
    platform: &Platform,
    session: &SessionToken,
    next: &str,
) -> Result<(), AppError> {
    if platform.auth.is_authenticated(session.as_deref()).await? {
        Ok(())
    } else {
        Err(AppError::AuthRequired {
            next: next.to_string(),
        })
    }
}

/// API guard: plain 401, no redirect.
pub async fn require_api_auth(platform: &Platform, session: &SessionToken) -> Result<(), AppError> {
    if platform.auth.is_authenticated(session.as_deref()).await? {
        Ok(())
    } else {
        Err(AppError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> SessionToken {
        let (mut parts, _) = request.into_parts();
        SessionToken::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_bearer_token() {
        let request = Request::builder()
            .header("authorization", "Bearer abc123")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_session_cookie() {
        let request = Request::builder()
            .header("cookie", "theme=dark; session=tok; other=1")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_missing_token() {
        let request = Request::builder()
            .header("authorization", "Bearer ")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await.as_deref(), None);
    }

    #[tokio::test]
    async fn test_guard_redirects_anonymous_visitor() {
        let platform = Platform::in_memory();
        let err = require_auth(&platform, &SessionToken(None), "/upload")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthRequired { next } if next == "/upload"));
    }

    #[tokio::test]
    async fn test_guard_passes_signed_in_visitor() {
        let platform = Platform::in_memory();
        let session = platform.auth.sign_in().await.unwrap();
        let token = SessionToken(Some(session.token));
        assert!(require_auth(&platform, &token, "/").await.is_ok());
        assert!(require_api_auth(&platform, &token).await.is_ok());
    }
}
