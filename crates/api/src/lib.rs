//! Control-plane wire types and REST client for the Linkbox backend.
//!
//! The remote's native API is neither POSIX nor S3 shaped: a flat numeric-ID
//! namespace queried through a paginated search endpoint, with GET-based
//! mutation endpoints returning a `{status, msg, data}` envelope. This crate
//! owns the wire types, the error classification, and the [`Remote`] trait
//! boundary that the rest of the backend programs against; [`RestClient`] is
//! the production implementation.

mod client;
mod error;
mod remote;
pub mod types;

pub use client::{RestClient, DEFAULT_BASE_URL};
pub use error::{retryable_http_status, ApiError};
pub use remote::{ByteRange, Remote};
pub use types::{
    check_status, check_status_idempotent, BindResponse, CommonResponse, Entity,
    FileSearchResponse, FolderCreateResponse, LoginResponse, UploadSessionData,
    UploadSessionResponse, UploadUrlResponse, STATUS_ALREADY_EXISTS, STATUS_CONTENT_PRESENT,
    STATUS_OK,
};
