use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::AppError;
use crate::pages::{SessionToken, SESSION_COOKIE};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AuthQuery {
    pub next: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthAction {
    SignIn,
    SignOut,
}

#[derive(Debug, Serialize)]
pub struct AuthView {
    pub heading: &'static str,
    pub authenticated: bool,
    pub action: AuthAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub token: String,
    pub signed_in_at: DateTime<Utc>,
}

/// Only same-site paths are followed after sign-in. Characters that cannot
/// appear in a `Location` header are percent-encoded.
fn local_path(next: Option<String>) -> Option<String> {
    let next = next.filter(|n| n.starts_with('/') && !n.starts_with("//") && !n.contains('\\'))?;
    Some(
        next.chars()
            .map(|c| {
                if c.is_ascii_graphic() {
                    c.to_string()
                } else {
                    urlencoding::encode(c.encode_utf8(&mut [0; 4])).into_owned()
                }
            })
            .collect(),
    )
}

/// GET /auth?next=
pub async fn handle_auth_page(
    State(state): State<AppState>,
    session: SessionToken,
    Query(query): Query<AuthQuery>,
) -> Result<Response, AppError> {
    let authenticated = state
        .platform
        .auth
        .is_authenticated(session.as_deref())
        .await?;
    let next = local_path(query.next);

    if authenticated {
        if let Some(next) = &next {
            return Ok(Redirect::to(next).into_response());
        }
    }

    Ok(Json(AuthView {
        heading: "Log In to Continue Your Job Journey",
        authenticated,
        action: if authenticated {
            AuthAction::SignOut
        } else {
            AuthAction::SignIn
        },
        next,
    })
    .into_response())
}

/// POST /auth/sign-in
pub async fn handle_sign_in(State(state): State<AppState>) -> Result<Response, AppError> {
    let session = state.platform.auth.sign_in().await?;
    let cookie = format!(
        "{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax",
        session.token
    );
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(SignInResponse {
            token: session.token,
            signed_in_at: session.signed_in_at,
        }),
    )
        .into_response())
}

/// POST /auth/sign-out
pub async fn handle_sign_out(
    State(state): State<AppState>,
    session: SessionToken,
) -> Result<Response, AppError> {
    let token = session.0.ok_or(AppError::Unauthorized)?;
    state.platform.auth.sign_out(&token).await?;
    let released = state.object_urls.revoke_owned_by(&token);
    if released > 0 {
        debug!("Released {released} object URLs on sign-out");
    }
    let cleared = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cleared)]).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_path_only() {
        assert_eq!(local_path(Some("/upload".into())), Some("/upload".into()));
        assert_eq!(local_path(Some("//evil.example".into())), None);
        assert_eq!(local_path(Some("https://evil.example".into())), None);
        assert_eq!(local_path(Some("/\\evil".into())), None);
        assert_eq!(local_path(None), None);
    }

    #[test]
    fn test_local_path_encodes_header_unsafe_characters() {
        assert_eq!(
            local_path(Some("/resume/a\nb".into())),
            Some("/resume/a%0Ab".into())
        );
        assert_eq!(
            local_path(Some("/resume/é 1".into())),
            Some("/resume/%C3%A9%201".into())
        );
    }
}
