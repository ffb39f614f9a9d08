//! The remote-interaction trait implemented by the REST client.
//!
//! Splitting the surface into a trait keeps the path/identity logic and the
//! transfer engines independent of HTTP plumbing; integration tests drive
//! them against an in-memory remote instead.

use async_trait::async_trait;

use linkbox_common::ByteReader;

use crate::error::ApiError;
use crate::types::{
    BindResponse, CommonResponse, FileSearchResponse, FolderCreateResponse, LoginResponse,
    UploadSessionResponse, UploadUrlResponse,
};

/// An inclusive byte range for ranged downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Number of bytes covered by the range.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

/// Authenticated access to the Linkbox control plane and data plane.
///
/// Control-plane methods decode the full envelope and leave status
/// interpretation to the caller (1501 is success for some operations and
/// not others; 600 carries meaning on the upload handshakes). Transport
/// retries for control-plane calls happen inside the implementation, under
/// its control pacer. The data-plane pair (`upload_signed`, `download`) is
/// single-attempt; callers wrap it in their worker pacers.
#[async_trait]
pub trait Remote: Send + Sync {
    /// Page through the search endpoint. `name` may be empty for an
    /// unfiltered listing; when set, the server matches it as a substring
    /// across all directories.
    async fn file_search(
        &self,
        name: &str,
        pid: i64,
        page_no: u32,
        page_size: u32,
    ) -> Result<FileSearchResponse, ApiError>;

    /// Create a directory under `pid`.
    async fn folder_create(&self, name: &str, pid: i64) -> Result<FolderCreateResponse, ApiError>;

    /// Delete a directory (and its contents).
    async fn folder_delete(&self, dir_id: i64) -> Result<CommonResponse, ApiError>;

    /// Rename a directory in place.
    async fn folder_rename(&self, dir_id: i64, name: &str) -> Result<CommonResponse, ApiError>;

    /// Move a directory to a new parent.
    async fn folder_move(&self, dir_id: i64, new_pid: i64) -> Result<CommonResponse, ApiError>;

    /// Rename a file in place.
    async fn file_rename(&self, item_id: &str, name: &str) -> Result<CommonResponse, ApiError>;

    /// Move a file to a new parent.
    async fn file_move(&self, item_id: &str, new_pid: i64) -> Result<CommonResponse, ApiError>;

    /// Delete a file.
    async fn file_delete(&self, item_id: &str) -> Result<CommonResponse, ApiError>;

    /// Single-PUT handshake: exchange the prefix digest and size for a
    /// signed upload URL, or learn the content is already present.
    async fn upload_url(&self, prefix_md5: &str, size: u64) -> Result<UploadUrlResponse, ApiError>;

    /// Bind single-PUT content to a name under a directory.
    async fn bind_upload(
        &self,
        prefix_md5: &str,
        size: u64,
        pid: i64,
        name: &str,
    ) -> Result<BindResponse, ApiError>;

    /// Multipart handshake: exchange the vgroup key for object-store
    /// credentials, or learn the content is already present.
    async fn upload_session(&self, vgroup: &str) -> Result<UploadSessionResponse, ApiError>;

    /// Bind multipart content (by vgroup) to a name under a directory.
    async fn create_item(
        &self,
        vgroup: &str,
        pid: i64,
        name: &str,
    ) -> Result<BindResponse, ApiError>;

    /// Authenticate with email and password; yields the account token and
    /// quota numbers.
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError>;

    /// Install the account token used by the upload-session endpoints.
    /// Implementations without token state may ignore this.
    fn set_account_token(&self, _token: Option<String>) {}

    /// PUT a byte stream to a signed upload URL. Single attempt: the body
    /// stream cannot be rewound for a retry.
    async fn upload_signed(
        &self,
        url: &str,
        size: u64,
        body: ByteReader,
    ) -> Result<(), ApiError>;

    /// GET a signed URL, optionally with a byte range. Single attempt;
    /// errors carry a retryability classification for the caller's pacer.
    async fn download(&self, url: &str, range: Option<ByteRange>) -> Result<ByteReader, ApiError>;
}
