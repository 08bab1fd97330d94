use axum::{
    extract::{Path, State},
    Json,
};

use crate::errors::AppError;
use crate::models::resume::{resume_key, Resume};
use crate::pages::{require_auth, SessionToken};
use crate::platform::PlatformError;
use crate::state::AppState;

/// GET /resume/:id
pub async fn handle_resume(
    State(state): State<AppState>,
    session: SessionToken,
    Path(id): Path<String>,
) -> Result<Json<Resume>, AppError> {
    require_auth(&state.platform, &session, &format!("/resume/{id}")).await?;

    let stored = state
        .platform
        .kv
        .get(&resume_key(&id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))?;

    let resume: Resume = serde_json::from_str(&stored).map_err(PlatformError::from)?;
    Ok(Json(resume))
}
