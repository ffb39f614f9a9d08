//! AWS SDK implementation of the object-store traits.
//!
//! The session handshake hands out short-lived credentials for an
//! S3-compatible store; each session gets its own client. SDK-level retries
//! are disabled so that retry policy lives entirely in the worker pacers,
//! which retry every store error uniformly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;

use crate::error::TransferError;
use crate::traits::{ObjectStoreClient, ObjectStoreFactory, PartRecord, UploadSession};

/// Region placeholder; the endpoint override is authoritative for routing
/// but the SDK still requires a region to sign with.
const SESSION_REGION: &str = "us-east-1";

/// ObjectStoreClient implementation using the AWS SDK for Rust.
pub struct S3ObjectStore {
    s3_client: S3Client,
}

impl S3ObjectStore {
    /// Build a client from session credentials.
    ///
    /// # Arguments
    /// * `session` - Credential bundle from the upload-session handshake
    /// * `response_header_timeout` - Per-attempt timeout while waiting on
    ///   the store's response headers
    pub async fn connect(
        session: &UploadSession,
        response_header_timeout: Duration,
    ) -> Result<Self, TransferError> {
        let credentials = Credentials::new(
            &session.access_key,
            &session.secret_key,
            Some(session.security_token.clone()),
            None,
            "linkbox-upload-session",
        );

        let endpoint: String = if session.endpoint.starts_with("http") {
            session.endpoint.clone()
        } else {
            format!("https://{}", session.endpoint)
        };

        let timeout: TimeoutConfig = TimeoutConfig::builder()
            .operation_attempt_timeout(response_header_timeout)
            .build();

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(SESSION_REGION))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .retry_config(RetryConfig::disabled())
            .timeout_config(timeout)
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        Ok(Self {
            s3_client: S3Client::from_conf(s3_config),
        })
    }
}

#[async_trait]
impl ObjectStoreClient for S3ObjectStore {
    async fn initiate_multipart(&self, bucket: &str, key: &str) -> Result<String, TransferError> {
        let output = self
            .s3_client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| TransferError::Store {
                message: format!("failed to initiate multipart upload: {e}"),
            })?;

        output
            .upload_id()
            .map(|id| id.to_string())
            .ok_or_else(|| TransferError::Store {
                message: "store returned no upload id".to_string(),
            })
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        content_md5: Option<String>,
        body: Bytes,
    ) -> Result<String, TransferError> {
        let output = self
            .s3_client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .set_content_md5(content_md5)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| TransferError::Store {
                message: e.to_string(),
            })?;

        output
            .e_tag()
            .map(|etag| etag.to_string())
            .ok_or_else(|| TransferError::Store {
                message: format!("store returned no etag for part {part_number}"),
            })
    }

    async fn complete_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<PartRecord>,
    ) -> Result<(), TransferError> {
        let completed_parts: Vec<CompletedPart> = parts
            .iter()
            .map(|part| {
                CompletedPart::builder()
                    .part_number(part.part_number)
                    .e_tag(&part.etag)
                    .build()
            })
            .collect();

        let upload = CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();

        self.s3_client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(upload)
            .send()
            .await
            .map_err(|e| TransferError::Store {
                message: format!("failed to complete multipart upload: {e}"),
            })?;

        Ok(())
    }
}

/// Factory producing a fresh [`S3ObjectStore`] per upload session.
pub struct S3StoreFactory {
    response_header_timeout: Duration,
}

impl S3StoreFactory {
    pub fn new(response_header_timeout: Duration) -> Self {
        Self {
            response_header_timeout,
        }
    }
}

#[async_trait]
impl ObjectStoreFactory for S3StoreFactory {
    async fn connect(
        &self,
        session: &UploadSession,
    ) -> Result<Arc<dyn ObjectStoreClient>, TransferError> {
        let store: S3ObjectStore =
            S3ObjectStore::connect(session, self.response_header_timeout).await?;
        Ok(Arc::new(store))
    }
}
