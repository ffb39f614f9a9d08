//! Digest helpers for the deduplication handshake.
//!
//! The remote identifies content by the MD5 of its first 10 MiB together
//! with the total size; this pair forms the "vgroup" key sent to the upload
//! handshakes.

use md5::{Digest, Md5};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Number of bytes hashed for the deduplication digest (10 MiB).
pub const PREFIX_DIGEST_LEN: u64 = 10 * 1024 * 1024;

/// Compute the MD5 of a byte slice as a lowercase hex string.
pub fn md5_hex(data: &[u8]) -> String {
    let digest = Md5::digest(data);
    format!("{:x}", digest)
}

/// Build the remote's deduplication key from a prefix digest and total size.
///
/// # Arguments
/// * `prefix_md5` - Hex MD5 of the first 10 MiB of content
/// * `size` - Total content size in bytes
pub fn vgroup_key(prefix_md5: &str, size: u64) -> String {
    format!("{}_{}", prefix_md5, size)
}

/// Read up to `limit` bytes from the start of `input` into memory.
///
/// Short files yield fewer bytes without error; the caller keeps the buffer
/// and chains it back in front of the remaining stream so the input is
/// consumed exactly once.
///
/// # Errors
/// Returns the underlying I/O error if the read fails.
pub async fn read_prefix<R>(input: &mut R, limit: u64) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buffer: Vec<u8> = Vec::new();
    input.take(limit).read_to_end(&mut buffer).await?;
    Ok(buffer)
}
