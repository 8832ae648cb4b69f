//! Upload coordinator: uploads every selected resume and cover letter of a
//! session concurrently and records per-file progress back into the session.
//!
//! Each file's progress is written at the index it had when the upload
//! started, so concurrent transfers never touch each other's slots. The
//! aggregate succeeds only if every file succeeds. Completed siblings of a
//! failed file stay in storage.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::errors::AppError;
use crate::models::document::{DocumentKind, SelectedFile};
use crate::session::{SharedSession, UploadTicket};
use crate::storage::{progress_percent, ObjectStore, StorageError, UploadEvent};
use crate::upload::paths::destination_path;

#[derive(Debug, Clone, Serialize)]
pub struct UploadedDocument {
    pub name: String,
    pub path: String,
    pub url: String,
}

/// Durable references for one successful `upload_all`, in selection order.
#[derive(Debug, Serialize)]
pub struct UploadReport {
    pub resumes: Vec<UploadedDocument>,
    pub cover_letters: Vec<UploadedDocument>,
    pub completed_at: DateTime<Utc>,
}

struct PlannedUpload {
    kind: DocumentKind,
    index: usize,
    file: SelectedFile,
    path: String,
}

#[derive(Clone)]
pub struct UploadCoordinator {
    store: Arc<dyn ObjectStore>,
}

impl UploadCoordinator {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Uploads all selected documents of `session` and waits for every
    /// transfer to settle.
    ///
    /// The transfers run on their own task, so the session returns to idle
    /// even if the caller stops waiting.
    pub async fn upload_all(&self, session: &SharedSession) -> Result<UploadReport, AppError> {
        let (ticket, plan) = {
            let mut guard = session.lock().await;
            let session_id = guard.id();

            let identity = match guard.identity() {
                Some(identity) => identity.clone(),
                None => {
                    warn!("Session {session_id} tried to upload without signing in");
                    return Err(AppError::NotSignedIn);
                }
            };
            if guard.selection(DocumentKind::Resume).is_empty()
                || guard.selection(DocumentKind::CoverLetter).is_empty()
            {
                warn!("Session {session_id} tried to upload with an empty selection");
                return Err(AppError::NothingToUpload);
            }
            if guard.is_uploading() {
                return Err(AppError::UploadInProgress);
            }

            let ticket = guard.begin_upload();
            let mut plan = Vec::new();
            for kind in [DocumentKind::Resume, DocumentKind::CoverLetter] {
                for (index, file) in guard.selection(kind).files().iter().enumerate() {
                    plan.push(PlannedUpload {
                        kind,
                        index,
                        path: destination_path(&identity, kind, &file.name),
                        file: file.clone(),
                    });
                }
            }

            info!(
                "Session {session_id}: uploading {} documents for user {}",
                plan.len(),
                identity.uid
            );
            (ticket, plan)
        };

        let run = tokio::spawn({
            let coordinator = self.clone();
            let session = session.clone();
            async move { coordinator.run(&session, ticket, plan).await }
        });

        run.await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Upload task failed: {e}")))?
    }

    async fn run(
        &self,
        session: &SharedSession,
        ticket: UploadTicket,
        plan: Vec<PlannedUpload>,
    ) -> Result<UploadReport, AppError> {
        let results = join_all(
            plan.iter()
                .map(|planned| self.upload_one(session, ticket, planned)),
        )
        .await;

        session.lock().await.finish_upload(ticket);

        let mut report = UploadReport {
            resumes: Vec::new(),
            cover_letters: Vec::new(),
            completed_at: Utc::now(),
        };
        let mut failures = Vec::new();

        for (planned, result) in plan.into_iter().zip(results) {
            match result {
                Ok(url) => {
                    let document = UploadedDocument {
                        name: planned.file.name,
                        path: planned.path,
                        url,
                    };
                    match planned.kind {
                        DocumentKind::Resume => report.resumes.push(document),
                        DocumentKind::CoverLetter => report.cover_letters.push(document),
                    }
                }
                Err(e) => {
                    error!("Upload of {} {} failed: {e}", planned.kind.label(), planned.file.name);
                    failures.push((planned.file.name, e));
                }
            }
        }

        if let Some((name, first)) = failures.first() {
            let completed = report.resumes.len() + report.cover_letters.len();
            if completed > 0 {
                warn!("{completed} documents were stored before the upload failed; they are left in place");
            }
            return Err(AppError::Storage(format!(
                "Upload failed for '{name}' ({} of {} documents failed): {first}",
                failures.len(),
                failures.len() + completed
            )));
        }

        info!(
            "Uploaded {} resumes and {} cover letters",
            report.resumes.len(),
            report.cover_letters.len()
        );
        Ok(report)
    }

    async fn upload_one(
        &self,
        session: &SharedSession,
        ticket: UploadTicket,
        planned: &PlannedUpload,
    ) -> Result<String, StorageError> {
        debug!("Starting upload of {} to {}", planned.file.name, planned.path);
        let mut events = self.store.begin_upload(&planned.path, planned.file.clone());

        while let Some(event) = events.next().await {
            match event {
                UploadEvent::Progress {
                    bytes_transferred,
                    total_bytes,
                } => {
                    let percent = progress_percent(bytes_transferred, total_bytes);
                    debug!("{}: {percent}%", planned.path);
                    session
                        .lock()
                        .await
                        .record_progress(ticket, planned.kind, planned.index, percent);
                }
                UploadEvent::Completed { path } => {
                    return self.store.resolve_download_reference(&path).await;
                }
                UploadEvent::Failed(e) => return Err(e),
            }
        }

        Err(StorageError::Interrupted(planned.path.clone()))
    }
}
