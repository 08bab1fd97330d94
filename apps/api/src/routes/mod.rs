pub mod assets;
pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::pages::{auth, home, resume, upload};
use crate::state::AppState;
use crate::uploader::MAX_FILE_SIZE;

/// Largest accepted request body: one maximum-size PDF plus the form fields.
const MAX_BODY_SIZE: usize = MAX_FILE_SIZE + 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Pages
        .route("/", get(home::handle_home))
        .route("/auth", get(auth::handle_auth_page))
        .route("/auth/sign-in", post(auth::handle_sign_in))
        .route("/auth/sign-out", post(auth::handle_sign_out))
        .route(
            "/upload",
            get(upload::handle_upload_page).post(upload::handle_upload),
        )
        .route("/resume/:id", get(resume::handle_resume))
        // Resources
        .route("/api/v1/convert", post(assets::handle_convert))
        .route(
            "/blob/:id",
            get(assets::handle_get_blob).delete(assets::handle_revoke_blob),
        )
        .route("/files/*path", get(assets::handle_get_file))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}
