//! Multipart upload scheduling.
//!
//! The input stream is read sequentially, one part-sized window at a time;
//! each window is handed to a spawned worker that uploads it under its own
//! pacer. A semaphore ticket is acquired before the window is read, so
//! ticket acquisition reserves both a worker slot and the part's buffer:
//! total memory in flight stays below `part_size × effective_concurrency`.
//!
//! A part that fails after its retry budget marks the whole upload failed;
//! no further parts are scheduled, but all outstanding workers drain before
//! the error is reported.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use base64::prelude::{Engine as _, BASE64_STANDARD};
use bytes::Bytes;
use md5::{Digest, Md5};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use linkbox_common::pacer::Attempt;
use linkbox_common::{Pacer, PacerPool};

use crate::error::TransferError;
use crate::traits::{ObjectStoreClient, PartRecord, UploadSession};

/// Default part size (6 MiB).
pub const DEFAULT_PART_SIZE: u64 = 6 * 1024 * 1024;
/// Smallest allowed part size for all but the last part (100 KiB).
pub const MIN_PART_SIZE: u64 = 100 * 1024;
/// Largest allowed part size (5 GiB).
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;
/// Hard cap on parts per upload.
pub const MAX_UPLOAD_PARTS: u64 = 10_000;
/// Default cap on buffered part memory per transfer (200 MiB).
pub const DEFAULT_MAX_BUFFER_SIZE: u64 = 200 * 1024 * 1024;
/// Upload pacer pools are scaled above the worker count so concurrent parts
/// rarely share a pacer's backoff state.
pub const TX_PACER_POOL_SCALE: usize = 3;

/// Tuning for the multipart upload path. Immutable per filesystem.
#[derive(Debug, Clone)]
pub struct MultipartConfig {
    /// Bytes per part (the last part may be short).
    pub part_size: u64,
    /// Target worker count.
    pub concurrency: usize,
    /// Cap on `part_size × workers` memory.
    pub max_buffer_size: u64,
    /// Compute a per-part Content-MD5 for store-side verification.
    pub integrity: bool,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            part_size: DEFAULT_PART_SIZE,
            concurrency: 32,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            integrity: false,
        }
    }
}

impl MultipartConfig {
    /// Check the part size against the store's documented bounds.
    pub fn validate(&self) -> Result<(), TransferError> {
        if self.part_size < MIN_PART_SIZE || self.part_size > MAX_PART_SIZE {
            return Err(TransferError::InvalidConfig {
                message: format!(
                    "part size {} outside {}..={}",
                    self.part_size, MIN_PART_SIZE, MAX_PART_SIZE
                ),
            });
        }
        Ok(())
    }

    /// Worker count after the memory cap is applied, floored at one.
    pub fn effective_concurrency(&self) -> usize {
        let by_memory: usize = (self.max_buffer_size / self.part_size).max(1) as usize;
        self.concurrency.min(by_memory).max(1)
    }
}

/// Schedules part uploads for one multipart transfer.
pub struct MultipartUploader<C: ObjectStoreClient + ?Sized> {
    store: Arc<C>,
    pacers: Arc<PacerPool>,
    config: MultipartConfig,
}

impl<C: ObjectStoreClient + ?Sized + 'static> MultipartUploader<C> {
    /// Create an uploader over a connected store client.
    ///
    /// # Arguments
    /// * `store` - Object-store client for the session
    /// * `pacers` - Shared upload pacer pool
    /// * `config` - Part size, concurrency, memory cap, integrity mode
    pub fn new(store: Arc<C>, pacers: Arc<PacerPool>, config: MultipartConfig) -> Self {
        Self {
            store,
            pacers,
            config,
        }
    }

    /// Upload exactly `size` bytes from `input` to the session's pool path.
    ///
    /// Part numbers are assigned before workers start; parts may finish in
    /// any order and are assembled in strict part-number order by the final
    /// Complete call.
    pub async fn upload<R>(
        &self,
        input: &mut R,
        size: u64,
        session: &UploadSession,
    ) -> Result<(), TransferError>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        self.config.validate()?;

        let part_size: u64 = self.config.part_size;
        let part_count: u64 = size.div_ceil(part_size);
        if part_count > MAX_UPLOAD_PARTS {
            return Err(TransferError::TooManyParts {
                count: part_count,
                max: MAX_UPLOAD_PARTS,
            });
        }

        let concurrency: usize = self.config.effective_concurrency();
        let upload_id: String = self
            .store
            .initiate_multipart(&session.bucket, &session.pool_path)
            .await?;

        let tickets: Arc<Semaphore> = Arc::new(Semaphore::new(concurrency));
        let failed: Arc<AtomicBool> = Arc::new(AtomicBool::new(false));
        let mut workers: JoinSet<Result<PartRecord, TransferError>> = JoinSet::new();
        let mut first_error: Option<TransferError> = None;

        for part_number in 1..=part_count {
            if failed.load(Ordering::SeqCst) {
                break;
            }

            // The ticket reserves both the worker slot and the part buffer.
            let permit = match Arc::clone(&tickets).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let offset: u64 = (part_number - 1) * part_size;
            let want: usize = part_size.min(size - offset) as usize;
            let body: Bytes = match read_part(input, want).await {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!(part_number, error = %e, "failed to prepare part");
                    failed.store(true, Ordering::SeqCst);
                    first_error = Some(e);
                    drop(permit);
                    break;
                }
            };

            let store: Arc<C> = Arc::clone(&self.store);
            let pacer: Arc<Pacer> = self.pacers.get(part_number as usize);
            let bucket: String = session.bucket.clone();
            let key: String = session.pool_path.clone();
            let upload_id: String = upload_id.clone();
            let integrity: bool = self.config.integrity;
            let failed: Arc<AtomicBool> = Arc::clone(&failed);

            workers.spawn(async move {
                let result: Result<PartRecord, TransferError> = upload_one_part(
                    store,
                    pacer,
                    &bucket,
                    &key,
                    &upload_id,
                    part_number as i32,
                    integrity,
                    body,
                )
                .await;
                if result.is_err() {
                    failed.store(true, Ordering::SeqCst);
                }
                drop(permit);
                result
            });
        }

        // Drain every outstanding worker before reporting anything.
        let mut parts: Vec<PartRecord> = Vec::with_capacity(part_count as usize);
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(part)) => parts.push(part),
                Ok(Err(e)) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(TransferError::Store {
                            message: format!("upload worker failed: {e}"),
                        });
                    }
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        parts.sort_by_key(|part| part.part_number);
        self.store
            .complete_multipart(&session.bucket, &session.pool_path, &upload_id, parts)
            .await
    }
}

/// Read exactly `want` bytes from the sequential input.
async fn read_part<R>(input: &mut R, want: usize) -> Result<Bytes, TransferError>
where
    R: AsyncRead + Unpin + Send + ?Sized,
{
    let mut buffer: Vec<u8> = vec![0u8; want];
    input
        .read_exact(&mut buffer)
        .await
        .map_err(|e| TransferError::Read {
            message: e.to_string(),
        })?;
    Ok(Bytes::from(buffer))
}

/// Upload a single prepared part under its pacer.
#[allow(clippy::too_many_arguments)]
async fn upload_one_part<C>(
    store: Arc<C>,
    pacer: Arc<Pacer>,
    bucket: &str,
    key: &str,
    upload_id: &str,
    part_number: i32,
    integrity: bool,
    body: Bytes,
) -> Result<PartRecord, TransferError>
where
    C: ObjectStoreClient + ?Sized,
{
    let content_md5: Option<String> =
        integrity.then(|| BASE64_STANDARD.encode(Md5::digest(&body)));
    let size: u64 = body.len() as u64;

    let result: Result<String, TransferError> = pacer
        .call(|| {
            let store: Arc<C> = Arc::clone(&store);
            let body: Bytes = body.clone();
            let content_md5: Option<String> = content_md5.clone();
            async move {
                match store
                    .upload_part(bucket, key, upload_id, part_number, content_md5, body)
                    .await
                {
                    Ok(etag) => Attempt::Done(etag),
                    // The store's error surface is not classified; every
                    // failure retries until the worker budget runs out.
                    Err(e) => Attempt::Retry(e),
                }
            }
        })
        .await;

    match result {
        Ok(etag) => Ok(PartRecord {
            part_number,
            etag,
            size,
        }),
        Err(e) => {
            tracing::warn!(part_number, error = %e, "part upload failed");
            Err(TransferError::Part {
                part_number,
                message: e.to_string(),
            })
        }
    }
}
