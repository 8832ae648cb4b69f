//! Per-client session state: signed-in identity, selected documents and their
//! upload progress.
//!
//! A `Session` is passed explicitly to the upload coordinator and the HTTP
//! handlers; there is no ambient global state. Mutation goes through the
//! methods below so that each selection's progress vector stays aligned with
//! its file list.

pub mod handlers;
pub mod store;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::document::{DocumentKind, SelectedFile};
use crate::models::user::Identity;

pub use store::{SessionStore, SharedSession};

/// Maximum number of documents per kind held by a session.
pub const MAX_SELECTION: usize = 3;

/// Files chosen for one document kind, with per-file progress aligned by index.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    files: Vec<SelectedFile>,
    progress: Vec<f64>,
    /// Bumped whenever the file list changes or an upload begins.
    generation: u64,
}

impl Selection {
    /// Appends `new_files`, keeps the most recent `MAX_SELECTION` entries and
    /// zeroes progress. Returns the names of the files pushed out by the cap.
    pub fn append(&mut self, new_files: Vec<SelectedFile>) -> Vec<String> {
        self.files.extend(new_files);
        let excess = self.files.len().saturating_sub(MAX_SELECTION);
        let dropped = self.files.drain(..excess).map(|f| f.name).collect();
        self.restart();
        dropped
    }

    pub fn files(&self) -> &[SelectedFile] {
        &self.files
    }

    pub fn progress(&self) -> &[f64] {
        &self.progress
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Zeroes progress and invalidates writes from earlier uploads.
    fn restart(&mut self) {
        self.progress = vec![0.0; self.files.len()];
        self.generation += 1;
    }

    fn set_progress(&mut self, index: usize, percent: f64) -> bool {
        match self.progress.get_mut(index) {
            Some(slot) => {
                *slot = percent;
                true
            }
            None => false,
        }
    }

    fn clear(&mut self) {
        self.files.clear();
        self.restart();
    }
}

/// Identifies one `upload_all` run. Progress writes are ignored once the
/// selection they target has changed; settling a stale run leaves a newer
/// one active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadTicket {
    run: u64,
    resumes: u64,
    cover_letters: u64,
}

impl UploadTicket {
    fn generation(&self, kind: DocumentKind) -> u64 {
        match kind {
            DocumentKind::Resume => self.resumes,
            DocumentKind::CoverLetter => self.cover_letters,
        }
    }
}

#[derive(Debug)]
pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    identity: Option<Identity>,
    resumes: Selection,
    cover_letters: Selection,
    upload_runs: u64,
    active_upload: Option<u64>,
}

impl Session {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            identity: None,
            resumes: Selection::default(),
            cover_letters: Selection::default(),
            upload_runs: 0,
            active_upload: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn sign_in(&mut self, identity: Identity) {
        self.identity = Some(identity);
    }

    /// Sign-out: back to an empty, signed-out session. In-flight transfers keep
    /// running but can no longer write into this session.
    pub fn reset(&mut self) {
        self.identity = None;
        self.resumes.clear();
        self.cover_letters.clear();
        self.active_upload = None;
    }

    pub fn selection(&self, kind: DocumentKind) -> &Selection {
        match kind {
            DocumentKind::Resume => &self.resumes,
            DocumentKind::CoverLetter => &self.cover_letters,
        }
    }

    fn selection_mut(&mut self, kind: DocumentKind) -> &mut Selection {
        match kind {
            DocumentKind::Resume => &mut self.resumes,
            DocumentKind::CoverLetter => &mut self.cover_letters,
        }
    }

    /// Appends to the selection of `kind`; returns names dropped by the cap.
    pub fn select_files(&mut self, kind: DocumentKind, new_files: Vec<SelectedFile>) -> Vec<String> {
        self.selection_mut(kind).append(new_files)
    }

    pub fn is_uploading(&self) -> bool {
        self.active_upload.is_some()
    }

    /// Marks the session as uploading and zeroes both progress vectors.
    pub fn begin_upload(&mut self) -> UploadTicket {
        self.upload_runs += 1;
        self.resumes.restart();
        self.cover_letters.restart();
        self.active_upload = Some(self.upload_runs);
        UploadTicket {
            run: self.upload_runs,
            resumes: self.resumes.generation,
            cover_letters: self.cover_letters.generation,
        }
    }

    /// Writes `percent` at `index` of the `kind` progress vector. Returns false
    /// when that selection changed since the ticket was issued.
    pub fn record_progress(
        &mut self,
        ticket: UploadTicket,
        kind: DocumentKind,
        index: usize,
        percent: f64,
    ) -> bool {
        let selection = self.selection_mut(kind);
        if ticket.generation(kind) != selection.generation {
            return false;
        }
        selection.set_progress(index, percent)
    }

    /// Returns the session to idle if `ticket` is still the active upload.
    pub fn finish_upload(&mut self, ticket: UploadTicket) {
        if self.active_upload == Some(ticket.run) {
            self.active_upload = None;
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id,
            created_at: self.created_at,
            identity: self.identity.clone(),
            resumes: selection_view(&self.resumes),
            cover_letters: selection_view(&self.cover_letters),
            uploading: self.is_uploading(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SelectedFileView {
    pub name: String,
    pub size: u64,
    pub progress: f64,
}

/// What clients poll to render pickers and progress bars.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub identity: Option<Identity>,
    pub resumes: Vec<SelectedFileView>,
    pub cover_letters: Vec<SelectedFileView>,
    pub uploading: bool,
}

fn selection_view(selection: &Selection) -> Vec<SelectedFileView> {
    selection
        .files()
        .iter()
        .zip(selection.progress())
        .map(|(file, progress)| SelectedFileView {
            name: file.name.clone(),
            size: file.size(),
            progress: *progress,
        })
        .collect()
}
