//! In-process fakes for the identity and storage seams.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;

use crate::auth::{AuthError, IdentityProvider};
use crate::config::Config;
use crate::models::document::SelectedFile;
use crate::models::user::Identity;
use crate::storage::{ObjectStore, StorageError, UploadHandle, UploadReporter};

pub const VALID_TOKEN: &str = "valid-token";

pub fn identity(uid: &str) -> Identity {
    Identity {
        uid: uid.to_string(),
        display_name: Some("Ada Lovelace".to_string()),
        email: Some("ada@example.com".to_string()),
        avatar_url: None,
        signed_in_at: Utc::now(),
    }
}

pub fn document(name: &str, size: usize) -> SelectedFile {
    SelectedFile::new(name, None, Bytes::from(vec![b'x'; size]))
}

pub fn test_config() -> Config {
    Config {
        google_client_id: "test-client".to_string(),
        s3_bucket: "botfolio-test".to_string(),
        s3_endpoint: None,
        aws_region: "us-east-1".to_string(),
        aws_access_key_id: "test".to_string(),
        aws_secret_access_key: "test".to_string(),
        public_base_url: None,
        download_url_ttl_secs: 60,
        max_request_bytes: 1024 * 1024,
        session_idle_ttl_secs: 60,
        port: 0,
        rust_log: "debug".to_string(),
    }
}

/// Accepts `VALID_TOKEN` as user "u1" and rejects everything else.
#[derive(Default)]
pub struct FakeIdentityProvider {
    pub sign_outs: Mutex<Vec<String>>,
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn sign_in(&self, credential: &str) -> Result<Identity, AuthError> {
        if credential == VALID_TOKEN {
            Ok(identity("u1"))
        } else {
            Err(AuthError::Rejected {
                status: 400,
                message: "Invalid Value".to_string(),
            })
        }
    }

    async fn sign_out(&self, identity: &Identity) {
        self.sign_outs.lock().unwrap().push(identity.uid.clone());
    }
}

/// Completes every upload after reporting half and full progress, except the
/// paths listed in `failing`, which fail after the half-way event.
#[derive(Default)]
pub struct ScriptedStore {
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedStore {
    pub fn failing(paths: &[&str]) -> Self {
        Self {
            failing: paths.iter().map(|p| p.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for ScriptedStore {
    fn begin_upload(&self, path: &str, file: SelectedFile) -> UploadHandle {
        self.calls.lock().unwrap().push(path.to_string());
        let (reporter, handle) = UploadHandle::channel();
        let fail = self.failing.contains(path);
        let path = path.to_string();
        tokio::spawn(async move {
            let total = file.size();
            reporter.progress(total / 2, total).await;
            if fail {
                reporter
                    .fail(StorageError::Transfer {
                        path,
                        message: "simulated network failure".to_string(),
                    })
                    .await;
            } else {
                reporter.progress(total, total).await;
                reporter.complete(path).await;
            }
        });
        handle
    }

    async fn resolve_download_reference(&self, path: &str) -> Result<String, StorageError> {
        Ok(format!("https://storage.test/{path}"))
    }
}

/// Hands each upload's reporter to the test, which drives events by path.
#[derive(Default)]
pub struct ManualStore {
    reporters: Mutex<HashMap<String, UploadReporter>>,
}

impl ManualStore {
    pub fn started(&self) -> usize {
        self.reporters.lock().unwrap().len()
    }

    pub fn reporter(&self, path: &str) -> UploadReporter {
        self.reporters
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_else(|| panic!("no upload started for {path}"))
    }

    /// Drops the stored reporter so the handle ends once `reporter` is used up.
    pub fn take(&self, path: &str) -> UploadReporter {
        self.reporters
            .lock()
            .unwrap()
            .remove(path)
            .unwrap_or_else(|| panic!("no upload started for {path}"))
    }
}

#[async_trait]
impl ObjectStore for ManualStore {
    fn begin_upload(&self, path: &str, _file: SelectedFile) -> UploadHandle {
        let (reporter, handle) = UploadHandle::channel();
        self.reporters
            .lock()
            .unwrap()
            .insert(path.to_string(), reporter);
        handle
    }

    async fn resolve_download_reference(&self, path: &str) -> Result<String, StorageError> {
        Ok(format!("https://storage.test/{path}"))
    }
}
