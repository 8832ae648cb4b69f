pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::auth::handlers as auth;
use crate::session::handlers as sessions;
use crate::state::AppState;
use crate::upload::handlers as uploads;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_request_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        // Sessions
        .route("/api/v1/sessions", post(sessions::handle_create_session))
        .route("/api/v1/sessions/:id", get(sessions::handle_get_session))
        // Identity
        .route("/api/v1/sessions/:id/sign-in", post(auth::handle_sign_in))
        .route("/api/v1/sessions/:id/sign-out", post(auth::handle_sign_out))
        // Documents
        .route(
            "/api/v1/sessions/:id/selections/:kind",
            post(uploads::handle_select_files),
        )
        .route("/api/v1/sessions/:id/uploads", post(uploads::handle_upload_all))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
