use std::ops::Range;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use tracing::{debug, info, warn};

use super::{ObjectStore, StorageError, UploadHandle, UploadReporter};
use crate::config::Config;
use crate::models::document::SelectedFile;

/// Multipart part size. Files up to one part go through a single PutObject.
pub const PART_SIZE: usize = 8 * 1024 * 1024;

/// S3 / MinIO backed document store.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: Option<String>,
    url_ttl: Duration,
}

impl S3ObjectStore {
    /// Builds a client configured for MinIO (custom endpoint, path-style) or AWS.
    pub async fn from_config(config: &Config) -> Self {
        let credentials = Credentials::new(
            &config.aws_access_key_id,
            &config.aws_secret_access_key,
            None,
            None,
            "botfolio-static",
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.aws_region.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint) = &config.s3_endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.s3_endpoint.is_some())
            .build();

        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.s3_bucket.clone(),
            public_base_url: config.public_base_url.clone(),
            url_ttl: Duration::from_secs(config.download_url_ttl_secs),
        }
    }

    async fn transfer(
        &self,
        path: &str,
        file: &SelectedFile,
        reporter: &UploadReporter,
    ) -> Result<(), StorageError> {
        let total = file.size();
        reporter.progress(0, total).await;

        if file.data.len() <= PART_SIZE {
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(path)
                .content_type(&file.content_type)
                .body(ByteStream::from(file.data.clone()))
                .send()
                .await
                .map_err(|e| transfer_error(path, e))?;
            reporter.progress(total, total).await;
            return Ok(());
        }

        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(path)
            .content_type(&file.content_type)
            .send()
            .await
            .map_err(|e| transfer_error(path, e))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| StorageError::Transfer {
                path: path.to_string(),
                message: "S3 returned no multipart upload id".to_string(),
            })?
            .to_string();

        let result = match self.upload_parts(path, &upload_id, file, reporter).await {
            Ok(parts) => self
                .client
                .complete_multipart_upload()
                .bucket(&self.bucket)
                .key(path)
                .upload_id(&upload_id)
                .multipart_upload(
                    CompletedMultipartUpload::builder()
                        .set_parts(Some(parts))
                        .build(),
                )
                .send()
                .await
                .map(|_| ())
                .map_err(|e| transfer_error(path, e)),
            Err(e) => Err(e),
        };

        if result.is_err() {
            self.abort_multipart(path, &upload_id).await;
        }
        result
    }

    async fn upload_parts(
        &self,
        path: &str,
        upload_id: &str,
        file: &SelectedFile,
        reporter: &UploadReporter,
    ) -> Result<Vec<CompletedPart>, StorageError> {
        let total = file.size();
        let mut transferred: u64 = 0;
        let mut parts = Vec::new();

        for (index, range) in plan_parts(file.data.len()).into_iter().enumerate() {
            let part_number = (index + 1) as i32;
            let chunk = file.data.slice(range);
            let chunk_len = chunk.len() as u64;

            let uploaded = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(path)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(chunk))
                .send()
                .await
                .map_err(|e| transfer_error(path, e))?;

            parts.push(
                CompletedPart::builder()
                    .set_e_tag(uploaded.e_tag().map(str::to_string))
                    .part_number(part_number)
                    .build(),
            );

            transferred += chunk_len;
            debug!("Uploaded part {part_number} of {path} ({transferred}/{total} bytes)");
            reporter.progress(transferred, total).await;
        }

        Ok(parts)
    }

    async fn abort_multipart(&self, path: &str, upload_id: &str) {
        if let Err(e) = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(path)
            .upload_id(upload_id)
            .send()
            .await
        {
            warn!(
                "Failed to abort multipart upload {upload_id} for {path}: {}",
                DisplayErrorContext(e)
            );
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn begin_upload(&self, path: &str, file: SelectedFile) -> UploadHandle {
        let (reporter, handle) = UploadHandle::channel();
        let store = self.clone();
        let path = path.to_string();

        tokio::spawn(async move {
            match store.transfer(&path, &file, &reporter).await {
                Ok(()) => {
                    info!(
                        "Uploaded {} bytes to s3://{}/{}",
                        file.size(),
                        store.bucket,
                        path
                    );
                    reporter.complete(path).await;
                }
                Err(e) => reporter.fail(e).await,
            }
        });

        handle
    }

    async fn resolve_download_reference(&self, path: &str) -> Result<String, StorageError> {
        if let Some(base) = &self.public_base_url {
            return Ok(format!("{base}/{}", encode_key(path)));
        }

        let presigning =
            PresigningConfig::expires_in(self.url_ttl).map_err(|e| StorageError::Reference {
                path: path.to_string(),
                message: e.to_string(),
            })?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Reference {
                path: path.to_string(),
                message: DisplayErrorContext(e).to_string(),
            })?;
        Ok(request.uri().to_string())
    }
}

fn transfer_error<E: std::error::Error>(path: &str, err: E) -> StorageError {
    StorageError::Transfer {
        path: path.to_string(),
        message: DisplayErrorContext(err).to_string(),
    }
}

/// Splits `len` bytes into consecutive `PART_SIZE` ranges; the last may be short.
fn plan_parts(len: usize) -> Vec<Range<usize>> {
    (0..len)
        .step_by(PART_SIZE)
        .map(|start| start..(start + PART_SIZE).min(len))
        .collect()
}

/// Percent-encodes an object key for use in a URL path, keeping `/` separators.
fn encode_key(path: &str) -> String {
    path.split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/")
}
