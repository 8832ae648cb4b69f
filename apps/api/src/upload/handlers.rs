use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::document::{is_accepted_document, DocumentKind, SelectedFile, ACCEPTED_EXTENSIONS};
use crate::session::SessionView;
use crate::state::AppState;
use crate::upload::paths::base_name;
use crate::upload::UploadReport;

/// Multipart field carrying the chosen documents.
const FILES_FIELD: &str = "files";

#[derive(Debug, Serialize)]
pub struct SelectionResponse {
    /// Older files pushed out of the selection by the per-kind cap.
    pub dropped: Vec<String>,
    pub session: SessionView,
}

/// POST /api/v1/sessions/:id/selections/:kind
pub async fn handle_select_files(
    State(state): State<AppState>,
    Path((id, kind)): Path<(Uuid, DocumentKind)>,
    mut multipart: Multipart,
) -> Result<Json<SelectionResponse>, AppError> {
    let session = state.sessions.get(id).await?;

    // Read the whole request before touching the session so a bad file
    // leaves the previous selection intact.
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some(FILES_FIELD) {
            debug!("Ignoring multipart field {:?}", field.name());
            continue;
        }
        let Some(raw_name) = field.file_name() else {
            continue;
        };
        let name = base_name(raw_name).to_string();
        if !is_accepted_document(&name) {
            return Err(AppError::Validation(format!(
                "'{name}' is not an accepted {} (allowed: {})",
                kind.label(),
                ACCEPTED_EXTENSIONS.join(", ")
            )));
        }
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read '{name}': {e}")))?;
        files.push(SelectedFile::new(name, content_type, data));
    }

    let mut guard = session.lock().await;
    let count = files.len();
    let dropped = guard.select_files(kind, files);
    info!(
        "Session {id} selected {count} {} file(s), {} dropped by the cap",
        kind.label(),
        dropped.len()
    );

    Ok(Json(SelectionResponse {
        dropped,
        session: guard.view(),
    }))
}

/// POST /api/v1/sessions/:id/uploads
///
/// Holds the request open until every transfer settles.
pub async fn handle_upload_all(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UploadReport>, AppError> {
    let session = state.sessions.get(id).await?;
    let report = state.coordinator.upload_all(&session).await?;
    Ok(Json(report))
}
