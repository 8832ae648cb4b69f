//! Object storage seam.
//!
//! An upload is started with `ObjectStore::begin_upload` and observed through
//! the returned `UploadHandle`, a stream of `UploadEvent`s: any number of
//! `Progress` events followed by exactly one terminal `Completed` or `Failed`.
//! Callers never see a transport SDK; `S3ObjectStore` is the production backend.

pub mod s3;

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::models::document::SelectedFile;

pub use s3::S3ObjectStore;

/// Events buffered per upload before the transport waits for the consumer.
const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("Upload of '{path}' failed: {message}")]
    Transfer { path: String, message: String },

    #[error("Upload of '{0}' ended without reporting a result")]
    Interrupted(String),

    #[error("Could not resolve a download URL for '{path}': {message}")]
    Reference { path: String, message: String },
}

#[derive(Debug, Clone)]
pub enum UploadEvent {
    Progress {
        bytes_transferred: u64,
        total_bytes: u64,
    },
    Completed {
        path: String,
    },
    Failed(StorageError),
}

/// Receiving side of one upload.
pub struct UploadHandle {
    events: mpsc::Receiver<UploadEvent>,
}

impl UploadHandle {
    /// Creates a connected reporter/handle pair. Backends keep the reporter and
    /// return the handle.
    pub fn channel() -> (UploadReporter, UploadHandle) {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        (UploadReporter { tx }, UploadHandle { events: rx })
    }
}

impl Stream for UploadHandle {
    type Item = UploadEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<UploadEvent>> {
        self.events.poll_recv(cx)
    }
}

/// Sending side of one upload. Sends after the handle is dropped are discarded.
#[derive(Clone)]
pub struct UploadReporter {
    tx: mpsc::Sender<UploadEvent>,
}

impl UploadReporter {
    pub async fn progress(&self, bytes_transferred: u64, total_bytes: u64) {
        let _ = self
            .tx
            .send(UploadEvent::Progress {
                bytes_transferred,
                total_bytes,
            })
            .await;
    }

    pub async fn complete(self, path: String) {
        let _ = self.tx.send(UploadEvent::Completed { path }).await;
    }

    pub async fn fail(self, error: StorageError) {
        let _ = self.tx.send(UploadEvent::Failed(error)).await;
    }
}

/// Destination for uploaded documents.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Starts transferring `file` to `path` and returns immediately.
    fn begin_upload(&self, path: &str, file: SelectedFile) -> UploadHandle;

    /// Returns a retrievable URL for an object previously stored at `path`.
    async fn resolve_download_reference(&self, path: &str) -> Result<String, StorageError>;
}

/// Percentage of `total` transferred, clamped to [0, 100] and rounded to two
/// decimals. An empty file counts as fully transferred.
pub fn progress_percent(bytes_transferred: u64, total_bytes: u64) -> f64 {
    if total_bytes == 0 {
        return 100.0;
    }
    let ratio = bytes_transferred.min(total_bytes) as f64 / total_bytes as f64;
    (ratio * 100.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_progress_percent_rounds_to_two_decimals() {
        assert_eq!(progress_percent(1, 3), 33.33);
        assert_eq!(progress_percent(2, 3), 66.67);
        assert_eq!(progress_percent(50, 200), 25.0);
    }

    #[test]
    fn test_progress_percent_bounds() {
        assert_eq!(progress_percent(0, 10), 0.0);
        assert_eq!(progress_percent(10, 10), 100.0);
        assert_eq!(progress_percent(15, 10), 100.0);
        assert_eq!(progress_percent(0, 0), 100.0);
    }

    #[tokio::test]
    async fn test_handle_streams_events_in_order_then_ends() {
        let (reporter, mut handle) = UploadHandle::channel();
        tokio::spawn(async move {
            reporter.progress(5, 10).await;
            reporter.complete("resumes/u1/a.pdf".to_string()).await;
        });

        match handle.next().await {
            Some(UploadEvent::Progress {
                bytes_transferred,
                total_bytes,
            }) => assert_eq!((bytes_transferred, total_bytes), (5, 10)),
            other => panic!("Expected progress, got: {:?}", other),
        }
        match handle.next().await {
            Some(UploadEvent::Completed { path }) => assert_eq!(path, "resumes/u1/a.pdf"),
            other => panic!("Expected completion, got: {:?}", other),
        }
        assert!(handle.next().await.is_none());
    }

    #[tokio::test]
    async fn test_reporter_tolerates_dropped_handle() {
        let (reporter, handle) = UploadHandle::channel();
        drop(handle);
        reporter.progress(1, 2).await;
        reporter.fail(StorageError::Interrupted("x".into())).await;
    }
}
