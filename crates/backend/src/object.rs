//! File object handles: stat metadata, reads, and the two upload paths.
//!
//! An [`Object`] borrows its filesystem handle; it never outlives it and
//! draws credentials, pacers, and the directory cache from it. Reads go
//! straight at the signed URL (the REST path buffers single streams and
//! would defeat parallel ranges). Writes pick between the single-PUT and
//! multipart paths and end with a reconcile so the returned handle reflects
//! what the server actually stored.

use std::time::{SystemTime, UNIX_EPOCH};

use tokio::io::{AsyncRead, AsyncReadExt};

use linkbox_api::types::{check_status, STATUS_CONTENT_PRESENT, STATUS_OK};
use linkbox_api::{ApiError, ByteRange, Entity};
use linkbox_common::pacer::Attempt;
use linkbox_common::{
    md5_hex, read_prefix, split_dir_and_name, vgroup_key, ByteReader, Pacer, PREFIX_DIGEST_LEN,
};
use linkbox_storage::{
    plan_ranges, MultiReader, MultipartConfig, MultipartUploader, ObjectStoreClient, RangePart,
    TransferError, UploadSession, MIN_DOWNLOAD_PART_SIZE, MIN_PART_SIZE,
};

use crate::error::Error;
use crate::fs::LinkboxFs;
use crate::reconcile;

/// A remote file that has been stat'd or is about to be written.
pub struct Object<'fs> {
    fs: &'fs LinkboxFs,
    remote: String,
    size: u64,
    ctime: i64,
    kind: String,
    sub_type: String,
    url: String,
    id: i64,
    pid: i64,
    item_id: String,
    is_dir: bool,
}

impl<'fs> Object<'fs> {
    /// Handle for a path that is about to be written.
    pub(crate) fn pending(fs: &'fs LinkboxFs, remote: String) -> Self {
        Self {
            fs,
            remote,
            size: 0,
            ctime: 0,
            kind: String::new(),
            sub_type: String::new(),
            url: String::new(),
            id: 0,
            pid: 0,
            item_id: String::new(),
            is_dir: false,
        }
    }

    /// Handle populated from a search record.
    pub(crate) fn from_entity(fs: &'fs LinkboxFs, remote: String, entity: &Entity) -> Self {
        let mut object: Object<'fs> = Self::pending(fs, remote);
        object.set_from_entity(entity);
        object
    }

    fn set_from_entity(&mut self, entity: &Entity) {
        self.size = entity.size.max(0) as u64;
        self.ctime = entity.ctime;
        self.kind = entity.kind.clone();
        self.sub_type = entity.sub_type.clone();
        self.url = entity.url.clone();
        self.id = entity.id;
        self.pid = entity.pid;
        self.item_id = entity.item_id.clone();
        self.is_dir = entity.is_dir();
    }

    /// Path relative to the filesystem root.
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Creation timestamp, seconds since epoch. The remote rejects
    /// client-set times, so this is the only time there is.
    pub fn mod_time(&self) -> i64 {
        self.ctime
    }

    /// Stable numeric ID from listings.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// String handle used for file-scoped mutations.
    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    /// Parent directory's numeric ID.
    pub fn parent_id(&self) -> i64 {
        self.pid
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    /// MIME type derived from the remote's type/subtype tags, when known.
    pub fn mime_type(&self) -> Option<String> {
        mime_type_of(&self.kind, &self.sub_type)
    }

    /// Open the object for reading, optionally restricted to a byte range.
    ///
    /// Range requests wide enough for the configured concurrency are split
    /// across parallel workers and stitched back by a composite reader;
    /// everything else is a single GET against the signed URL.
    pub async fn open(&self, range: Option<ByteRange>) -> Result<ByteReader, Error> {
        let url: String = self.download_url().await?;

        let Some(range) = range else {
            return Ok(self.fs.remote_api().download(&url, None).await?);
        };

        let concurrency: usize = self.fs.options().multipart_rx_concurrency;
        let plan: Option<Vec<RangePart>> = if concurrency > 0 {
            plan_ranges(range.start, range.end, concurrency, MIN_DOWNLOAD_PART_SIZE)
        } else {
            None
        };
        let Some(parts) = plan else {
            return Ok(self.fs.remote_api().download(&url, Some(range)).await?);
        };

        let fetches = parts.iter().enumerate().map(|(index, part)| {
            let pacer: std::sync::Arc<Pacer> = self.fs.rx_pacers().get(index);
            let url: &str = &url;
            let part: RangePart = *part;
            async move {
                pacer
                    .call(|| async move {
                        let range = ByteRange::new(part.start, part.end);
                        match self.fs.remote_api().download(url, Some(range)).await {
                            Ok(reader) => Attempt::Done(reader),
                            Err(e) if e.is_retryable() => Attempt::Retry(e),
                            Err(e) => Attempt::Fatal(e),
                        }
                    })
                    .await
            }
        });
        let results: Vec<Result<ByteReader, ApiError>> =
            futures::future::join_all(fetches).await;

        let total: usize = results.len();
        let mut readers: Vec<ByteReader> = Vec::with_capacity(total);
        let mut failed: usize = 0;
        for result in results {
            match result {
                Ok(reader) => readers.push(reader),
                Err(e) => {
                    failed += 1;
                    tracing::warn!(remote = %self.remote, error = %e, "range download failed");
                }
            }
        }
        if failed > 0 {
            // Dropping `readers` here closes every stream that did succeed.
            return Err(Error::Transfer(TransferError::PartialDownload {
                failed,
                total,
            }));
        }

        Ok(Box::new(MultiReader::new(readers)))
    }

    /// Resolve a usable signed URL; list responses may have omitted it.
    async fn download_url(&self) -> Result<String, Error> {
        if !self.url.is_empty() {
            return Ok(self.url.clone());
        }
        let (_, leaf) = split_dir_and_name(&self.remote);
        let entity: Entity = self
            .fs
            .walker()
            .find_entry(self.pid, leaf)
            .await?
            .ok_or_else(|| Error::ObjectNotFound {
                path: self.remote.clone(),
            })?;
        Ok(entity.url)
    }

    /// Replace this object's content with `size` bytes from `input`.
    ///
    /// An existing destination is deleted first; duplicate upload is not an
    /// error. The input is consumed exactly once: its first 10 MiB is
    /// buffered for the digest handshake before any transfer begins.
    pub async fn update<R>(&mut self, input: R, size: u64) -> Result<(), Error>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        if size == 0 {
            return Err(Error::CantUploadEmpty);
        }

        self.remove_existing().await;

        let mut input = input;
        let prefix: Vec<u8> = read_prefix(&mut input, PREFIX_DIGEST_LEN)
            .await
            .map_err(|e| Error::Read {
                message: e.to_string(),
            })?;
        let prefix_md5: String = md5_hex(&prefix);

        if self.fs.multipart_enabled() && size >= MIN_PART_SIZE {
            self.multipart_upload(prefix, &prefix_md5, input, size).await
        } else {
            self.single_put_upload(prefix, &prefix_md5, input, size).await
        }
    }

    /// Delete whatever currently lives at this path, best effort.
    async fn remove_existing(&mut self) {
        if !self.item_id.is_empty() {
            tracing::debug!(remote = %self.remote, "removing existing file before upload");
            if let Err(e) = self.remove().await {
                tracing::warn!(remote = %self.remote, error = %e, "failed to remove existing file");
            }
            self.item_id.clear();
        } else if let Ok(existing) = self.fs.new_object(&self.remote).await {
            tracing::debug!(remote = %self.remote, "removing existing file before upload");
            if let Err(e) = existing.remove().await {
                tracing::warn!(remote = %self.remote, error = %e, "failed to remove existing file");
            }
        }
    }

    /// Single-PUT path: digest handshake, raw PUT to the signed URL, bind.
    async fn single_put_upload<R>(
        &mut self,
        prefix: Vec<u8>,
        prefix_md5: &str,
        rest: R,
        size: u64,
    ) -> Result<(), Error>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let handshake = self.fs.remote_api().upload_url(prefix_md5, size).await?;
        match handshake.status {
            STATUS_OK => {
                let body: ByteReader = Box::new(std::io::Cursor::new(prefix).chain(rest));
                self.fs
                    .remote_api()
                    .upload_signed(&handshake.data.sign_url, size, body)
                    .await?;
            }
            STATUS_CONTENT_PRESENT => {
                tracing::debug!(remote = %self.remote, "content already present, skipping transfer");
            }
            status => {
                return Err(Error::Api(ApiError::Status {
                    status,
                    msg: handshake.msg,
                }))
            }
        }

        let (leaf, pid) = self
            .fs
            .dir_cache()
            .find_path(self.fs, &self.remote, true)
            .await?;
        let wire: String = self.fs.options().encoding.from_standard_name(&leaf);
        let bind = self
            .fs
            .remote_api()
            .bind_upload(prefix_md5, size, pid, &wire)
            .await?;
        check_status(bind.status, &bind.msg)?;

        self.finish_upload(pid, &leaf, size, &bind.data.item_id).await
    }

    /// Multipart path: session handshake, parallel parts to the object
    /// store, bind by vgroup.
    async fn multipart_upload<R>(
        &mut self,
        prefix: Vec<u8>,
        prefix_md5: &str,
        rest: R,
        size: u64,
    ) -> Result<(), Error>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let vgroup: String = vgroup_key(prefix_md5, size);
        let handshake = self.fs.remote_api().upload_session(&vgroup).await?;
        match handshake.status {
            STATUS_OK => {
                let data = handshake.data;
                let session = UploadSession {
                    access_key: data.access_key,
                    secret_key: data.secret_key,
                    security_token: data.security_token,
                    endpoint: data.server,
                    bucket: data.bucket,
                    pool_path: data.pool_path,
                };
                let store: std::sync::Arc<dyn ObjectStoreClient> =
                    self.fs.store_factory().connect(&session).await?;

                let options = self.fs.options();
                let config = MultipartConfig {
                    part_size: options.multipart_tx_part_size,
                    concurrency: options.multipart_tx_concurrency,
                    max_buffer_size: options.multipart_tx_max_buffer_size,
                    integrity: options.multipart_tx_integrity,
                };
                let uploader: MultipartUploader<dyn ObjectStoreClient> =
                    MultipartUploader::new(store, self.fs.tx_pacers(), config);

                let mut input = std::io::Cursor::new(prefix).chain(rest);
                uploader.upload(&mut input, size, &session).await?;
            }
            STATUS_CONTENT_PRESENT => {
                tracing::debug!(remote = %self.remote, "content already present, skipping transfer");
            }
            status => {
                return Err(Error::Api(ApiError::Status {
                    status,
                    msg: handshake.msg,
                }))
            }
        }

        let (leaf, pid) = self
            .fs
            .dir_cache()
            .find_path(self.fs, &self.remote, true)
            .await?;
        let wire: String = self.fs.options().encoding.from_standard_name(&leaf);
        let bind = self
            .fs
            .remote_api()
            .create_item(&vgroup, pid, &wire)
            .await?;
        check_status(bind.status, &bind.msg)?;

        self.finish_upload(pid, &leaf, size, &bind.data.item_id).await
    }

    /// Confirm the bound entity is visible and copy its record; when the
    /// search keeps lagging but the bind response named an item, synthesize
    /// the record locally so the upload still returns a usable handle.
    async fn finish_upload(
        &mut self,
        pid: i64,
        leaf: &str,
        size: u64,
        item_id: &str,
    ) -> Result<(), Error> {
        match reconcile::wait_for_entity(&self.fs.walker(), pid, leaf).await {
            Ok(entity) => {
                self.set_from_entity(&entity);
                Ok(())
            }
            Err(Error::ObjectNotFound { .. }) if !item_id.is_empty() => {
                tracing::debug!(remote = %self.remote, "synthesizing record from bind response");
                self.size = size;
                self.ctime = now_epoch_secs();
                self.kind = "file".to_string();
                self.sub_type.clear();
                self.url.clear();
                self.id = 0;
                self.pid = pid;
                self.item_id = item_id.to_string();
                self.is_dir = false;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Delete this object, then wait until the search stops reporting it.
    pub async fn remove(&self) -> Result<(), Error> {
        let response = self.fs.remote_api().file_delete(&self.item_id).await?;
        check_status(response.status, &response.msg)?;

        let (_, leaf) = split_dir_and_name(&self.remote);
        reconcile::wait_for_removal(self.fs.control_pacer(), &self.fs.walker(), self.pid, leaf)
            .await;
        Ok(())
    }
}

/// The remote's type tags rendered as a MIME type, when both are known.
fn mime_type_of(kind: &str, sub_type: &str) -> Option<String> {
    if kind.is_empty() || sub_type.is_empty() {
        return None;
    }
    let kind: &str = if kind == "doc" { "text" } else { kind };
    let sub: &str = if sub_type == "txt" { "plain" } else { sub_type };
    Some(format!("{kind}/{sub}"))
}

fn now_epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}
