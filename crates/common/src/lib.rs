//! Shared utilities for the Linkbox backend crates.
//!
//! This crate provides the pieces every other crate leans on:
//! - Adaptive-backoff pacers and pacer pools for rate limiting
//! - Remote-path split/join helpers
//! - The prefix-MD5 digest and vgroup deduplication key
//! - The filename-codec seam for the external encoding policy

pub mod codec;
pub mod hash;
pub mod pacer;
pub mod path_utils;

/// A boxed asynchronous byte stream, the common currency for download
/// readers and upload bodies.
pub type ByteReader = Box<dyn tokio::io::AsyncRead + Send + Unpin>;

// Re-export commonly used items at crate root
pub use codec::{IdentityCodec, NameCodec};
pub use hash::{md5_hex, read_prefix, vgroup_key, PREFIX_DIGEST_LEN};
pub use pacer::{Attempt, Pacer, PacerPool};
pub use path_utils::{is_within, join_remote, split_dir_and_name, trim_root};
