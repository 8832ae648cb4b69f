use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::Identity;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    /// Google ID token obtained by the client's sign-in flow.
    pub id_token: String,
}

/// POST /api/v1/sessions/:id/sign-in
pub async fn handle_sign_in(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<Identity>, AppError> {
    let session = state.sessions.get(id).await?;

    // A failed sign-in leaves the session exactly as it was.
    let identity = state.identity.sign_in(&req.id_token).await.map_err(|e| {
        warn!("Sign-in failed for session {id}: {e}");
        AppError::Auth(e)
    })?;

    session.lock().await.sign_in(identity.clone());
    info!("User {} signed in on session {id}", identity.uid);
    Ok(Json(identity))
}

/// POST /api/v1/sessions/:id/sign-out
///
/// Clears the session. Transfers already in flight keep running.
pub async fn handle_sign_out(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let session = state.sessions.get(id).await?;

    let previous = {
        let mut guard = session.lock().await;
        let previous = guard.identity().cloned();
        guard.reset();
        previous
    };

    if let Some(identity) = previous {
        state.identity.sign_out(&identity).await;
        info!("User {} signed out of session {id}", identity.uid);
    }
    Ok(StatusCode::NO_CONTENT)
}
