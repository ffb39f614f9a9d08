//! Concurrent transfer engine for the Linkbox backend.
//!
//! Two independent halves:
//!
//! - **Upload**: multipart transfer to an S3-compatible object store reached
//!   through session-handshake credentials. [`MultipartUploader`] schedules
//!   part uploads under a ticket-bounded concurrency with per-worker pacers
//!   and a hard memory budget; [`S3StoreFactory`] connects a fresh SDK
//!   client per session.
//! - **Download**: [`plan_ranges`] splits a byte range across workers and
//!   [`MultiReader`] concatenates their streams back in order. The fetching
//!   itself stays with the caller, which owns the signed URL and the
//!   download pacers.

mod download;
mod error;
mod reader;
mod s3;
mod traits;
mod upload;

pub use download::{plan_ranges, RangePart, MIN_DOWNLOAD_PART_SIZE};
pub use error::TransferError;
pub use reader::MultiReader;
pub use s3::{S3ObjectStore, S3StoreFactory};
pub use traits::{ObjectStoreClient, ObjectStoreFactory, PartRecord, UploadSession};
pub use upload::{
    MultipartConfig, MultipartUploader, DEFAULT_MAX_BUFFER_SIZE, DEFAULT_PART_SIZE, MAX_PART_SIZE,
    MAX_UPLOAD_PARTS, MIN_PART_SIZE, TX_PACER_POOL_SCALE,
};
