//! Object-store traits backing the multipart upload path.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransferError;

/// Credentials and target issued by the upload-session handshake.
///
/// Lifetime: one upload attempt. The session names the S3-compatible
/// endpoint, a bucket, and the object key ("pool path") the parts land at.
#[derive(Debug, Clone)]
pub struct UploadSession {
    pub access_key: String,
    pub secret_key: String,
    pub security_token: String,
    /// Object-store endpoint host or URL.
    pub endpoint: String,
    pub bucket: String,
    /// Object key assigned to receive the parts.
    pub pool_path: String,
}

/// One completed part of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartRecord {
    /// 1-based, contiguous part number.
    pub part_number: i32,
    /// ETag returned by the object store for the part.
    pub etag: String,
    /// Part size in bytes.
    pub size: u64,
}

/// Low-level multipart operations against an S3-compatible object store.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    /// Open a multipart upload; returns the upload ID.
    async fn initiate_multipart(&self, bucket: &str, key: &str) -> Result<String, TransferError>;

    /// Upload one part; returns its ETag. `content_md5` is the base64
    /// digest for store-side integrity verification when enabled.
    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        content_md5: Option<String>,
        body: Bytes,
    ) -> Result<String, TransferError>;

    /// Assemble the object. `parts` must be in strictly increasing
    /// part-number order.
    async fn complete_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<PartRecord>,
    ) -> Result<(), TransferError>;
}

/// Builds an [`ObjectStoreClient`] for a freshly issued upload session.
///
/// A new client is constructed per session because every session carries its
/// own short-lived credential triple.
#[async_trait]
pub trait ObjectStoreFactory: Send + Sync {
    async fn connect(
        &self,
        session: &UploadSession,
    ) -> Result<Arc<dyn ObjectStoreClient>, TransferError>;
}
