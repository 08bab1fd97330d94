use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use crate::errors::AppError;
use crate::pages::upload::{select_resume, UploadForm};
use crate::pages::{require_api_auth, SessionToken};
use crate::pdf::Conversion;
use crate::state::AppState;
use crate::uploader;

/// POST /api/v1/convert
///
/// Renders page one of the posted PDF. Failures come back as a `Conversion`
/// with an `error` field, never as an error status; only a missing or
/// non-conforming file is a 400.
pub async fn handle_convert(
    State(state): State<AppState>,
    session: SessionToken,
    multipart: Multipart,
) -> Result<Json<Conversion>, AppError> {
    require_api_auth(&state.platform, &session).await?;

    let form = UploadForm::read(multipart).await?;
    let file = select_resume(form.files).ok_or_else(|| {
        AppError::Validation(format!("Upload a single PDF resume, {}", uploader::prompt()))
    })?;

    Ok(Json(state.rasterizer.render_for(&file, session.as_deref()).await))
}

/// GET /blob/:id
///
/// Objects created by another session are reported as missing.
pub async fn handle_get_blob(
    State(state): State<AppState>,
    session: SessionToken,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    require_api_auth(&state.platform, &session).await?;

    let resource = state
        .object_urls
        .get(id, session.as_deref())
        .ok_or_else(|| AppError::NotFound(format!("Object {id} not found")))?;
    Ok(([(header::CONTENT_TYPE, resource.mime)], resource.bytes).into_response())
}

/// DELETE /blob/:id
pub async fn handle_revoke_blob(
    State(state): State<AppState>,
    session: SessionToken,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_api_auth(&state.platform, &session).await?;

    if state.object_urls.revoke_as(&id.to_string(), session.as_deref()) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Object {id} not found")))
    }
}

/// GET /files/*path
pub async fn handle_get_file(
    State(state): State<AppState>,
    session: SessionToken,
    Path(path): Path<String>,
) -> Result<Response, AppError> {
    require_api_auth(&state.platform, &session).await?;

    let bytes = state
        .platform
        .fs
        .read(&path)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("File {path} not found")))?;
    Ok(([(header::CONTENT_TYPE, content_type_for(&path))], bytes).into_response())
}

fn content_type_for(path: &str) -> &'static str {
    let extension = path.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}
