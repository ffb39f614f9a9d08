//! The filesystem handle and its directory-level operations.
//!
//! `LinkboxFs` owns the directory cache, the remote client, and the pacer
//! pools. Objects hold a back-reference to their filesystem and never
//! outlive it. All remote interaction goes through the [`Remote`] trait so
//! the operation logic can be driven against an in-memory remote in tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use linkbox_api::types::{check_status, STATUS_ALREADY_EXISTS, STATUS_OK};
use linkbox_api::{check_status_idempotent, ApiError, Remote, RestClient};
use linkbox_common::{join_remote, trim_root, Pacer, PacerPool};
use linkbox_storage::{ObjectStoreFactory, S3StoreFactory, TX_PACER_POOL_SCALE};

use crate::dircache::{DirCache, DirSource};
use crate::error::Error;
use crate::object::Object;
use crate::options::Options;
use crate::reconcile;
use crate::walker::Walker;

/// Quota numbers reported by [`LinkboxFs::about`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub total: i64,
    pub used: i64,
    pub free: i64,
}

/// A directory returned by [`LinkboxFs::list`].
#[derive(Debug, Clone)]
pub struct DirRef {
    /// Path relative to the filesystem root.
    pub remote: String,
    pub id: i64,
    pub parent_id: i64,
    /// Creation timestamp, seconds since epoch.
    pub ctime: i64,
}

/// One listing entry: a subdirectory or a file handle.
pub enum Entry<'fs> {
    Dir(DirRef),
    File(Object<'fs>),
}

/// Handle to a Linkbox remote rooted at a configured path.
pub struct LinkboxFs {
    root: String,
    opt: Options,
    remote: Arc<dyn Remote>,
    store_factory: Arc<dyn ObjectStoreFactory>,
    dir_cache: DirCache,
    /// Control pacer for post-mutation visibility loops.
    pacer: Pacer,
    tx_pacers: Arc<PacerPool>,
    rx_pacers: Arc<PacerPool>,
    multipart_enabled: bool,
}

impl LinkboxFs {
    /// Connect to the production endpoints.
    ///
    /// # Arguments
    /// * `root` - Path under the account root this handle operates beneath
    /// * `options` - Backend configuration
    pub async fn connect(root: &str, options: Options) -> Result<Self, Error> {
        options.validate()?;
        let client: RestClient = RestClient::new(&options.token, &options.user_agent)?;
        let factory = S3StoreFactory::new(Duration::from_secs(
            options.multipart_response_header_timeout,
        ));
        Self::with_remote(root, options, Arc::new(client), Arc::new(factory)).await
    }

    /// Build a filesystem over explicit remote and store implementations.
    pub async fn with_remote(
        root: &str,
        options: Options,
        remote: Arc<dyn Remote>,
        store_factory: Arc<dyn ObjectStoreFactory>,
    ) -> Result<Self, Error> {
        options.validate()?;
        let root: String = trim_root(root).to_string();

        // The account token is the prerequisite for multipart uploads; when
        // it cannot be obtained, fall back to the single-PUT upload mode.
        let mut multipart_enabled: bool = options.multipart_tx_concurrency > 0;
        if multipart_enabled {
            match Self::account_login(remote.as_ref(), &options).await {
                Some(token) => remote.set_account_token(Some(token)),
                None => multipart_enabled = false,
            }
        }

        let tx_pacers = Arc::new(PacerPool::workers(
            options.multipart_tx_concurrency * TX_PACER_POOL_SCALE,
        ));
        let rx_pacers = Arc::new(PacerPool::workers(options.multipart_rx_concurrency));

        Ok(Self {
            dir_cache: DirCache::new(root.clone()),
            root,
            opt: options,
            remote,
            store_factory,
            pacer: Pacer::control(),
            tx_pacers,
            rx_pacers,
            multipart_enabled,
        })
    }

    async fn account_login(remote: &dyn Remote, options: &Options) -> Option<String> {
        if !options.has_account() {
            return None;
        }
        let email: &str = options.email.as_deref().unwrap_or_default();
        let password: &str = options.password.as_deref().unwrap_or_default();
        match remote.login(email, password).await {
            Ok(response) if response.status == STATUS_OK && !response.data.token.is_empty() => {
                Some(response.data.token)
            }
            Ok(response) => {
                tracing::warn!(
                    status = response.status,
                    "account login refused, multipart uploads disabled"
                );
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "account login failed, multipart uploads disabled");
                None
            }
        }
    }

    /// Configured root path, trimmed of slashes.
    pub fn root(&self) -> &str {
        &self.root
    }

    pub(crate) fn options(&self) -> &Options {
        &self.opt
    }

    pub(crate) fn remote_api(&self) -> &dyn Remote {
        self.remote.as_ref()
    }

    pub(crate) fn store_factory(&self) -> &dyn ObjectStoreFactory {
        self.store_factory.as_ref()
    }

    pub(crate) fn control_pacer(&self) -> &Pacer {
        &self.pacer
    }

    pub(crate) fn tx_pacers(&self) -> Arc<PacerPool> {
        Arc::clone(&self.tx_pacers)
    }

    pub(crate) fn rx_pacers(&self) -> &PacerPool {
        &self.rx_pacers
    }

    pub(crate) fn multipart_enabled(&self) -> bool {
        self.multipart_enabled
    }

    pub(crate) fn walker(&self) -> Walker<'_> {
        Walker::new(self.remote.as_ref(), self.opt.encoding.as_ref())
    }

    pub(crate) fn dir_cache(&self) -> &DirCache {
        &self.dir_cache
    }

    /// Drop all cached directory IDs.
    pub fn reset_dir_cache(&self) {
        self.dir_cache.reset();
    }

    /// List the entries directly under `dir`.
    ///
    /// # Errors
    /// `DirNotFound` when `dir` does not resolve.
    pub async fn list(&self, dir: &str) -> Result<Vec<Entry<'_>>, Error> {
        let dir_id: i64 = self.dir_cache.find_dir(self, dir, false).await?;
        let entities = self.walker().list_dir(dir_id).await?;

        let mut entries: Vec<Entry<'_>> = Vec::with_capacity(entities.len());
        for entity in entities {
            let name: String = self.opt.encoding.to_standard_name(&entity.name);
            let remote: String = join_remote(dir, &name);
            if entity.is_dir() {
                // Cache the ID for later path resolutions.
                self.dir_cache.put(&remote, entity.id);
                entries.push(Entry::Dir(DirRef {
                    remote,
                    id: entity.id,
                    parent_id: entity.pid,
                    ctime: entity.ctime,
                }));
            } else {
                entries.push(Entry::File(Object::from_entity(self, remote, &entity)));
            }
        }
        Ok(entries)
    }

    /// Stat the file at `remote`.
    ///
    /// # Errors
    /// `ObjectNotFound` when nothing is there, `IsDir` when a directory is.
    pub async fn new_object(&self, remote: &str) -> Result<Object<'_>, Error> {
        let (leaf, parent_id) = match self.dir_cache.find_path(self, remote, false).await {
            Ok(found) => found,
            Err(Error::DirNotFound { .. }) => {
                return Err(Error::ObjectNotFound {
                    path: remote.to_string(),
                })
            }
            Err(e) => return Err(e),
        };

        let entity = self
            .walker()
            .find_entry(parent_id, &leaf)
            .await?
            .ok_or_else(|| Error::ObjectNotFound {
                path: remote.to_string(),
            })?;

        if entity.is_dir() {
            return Err(Error::IsDir {
                path: remote.to_string(),
            });
        }
        Ok(Object::from_entity(self, remote.to_string(), &entity))
    }

    /// Upload `size` bytes from `input` to `remote`, creating parent
    /// directories as needed.
    ///
    /// # Errors
    /// `CantUploadEmpty` for zero-length input; transfer errors otherwise.
    pub async fn put<R>(&self, input: R, remote: &str, size: u64) -> Result<Object<'_>, Error>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let mut object: Object<'_> = Object::pending(self, remote.to_string());
        object.update(input, size).await?;
        Ok(object)
    }

    /// Create `dir` and any missing parents. Idempotent.
    pub async fn mkdir(&self, dir: &str) -> Result<(), Error> {
        self.dir_cache.find_dir(self, dir, true).await?;
        Ok(())
    }

    /// Remove `dir` if it is empty.
    ///
    /// # Errors
    /// `DirectoryNotEmpty` when it has entries, `DirNotFound` when absent.
    pub async fn rmdir(&self, dir: &str) -> Result<(), Error> {
        self.purge_check(dir, true).await
    }

    /// Remove `dir` and everything inside it.
    pub async fn purge(&self, dir: &str) -> Result<(), Error> {
        self.purge_check(dir, false).await
    }

    async fn purge_check(&self, dir: &str, check: bool) -> Result<(), Error> {
        if check {
            let entries: Vec<Entry<'_>> = self.list(dir).await?;
            if !entries.is_empty() {
                return Err(Error::DirectoryNotEmpty {
                    path: dir.to_string(),
                });
            }
        }

        let dir_id: i64 = self.dir_cache.find_dir(self, dir, false).await?;
        let response = self.remote.folder_delete(dir_id).await?;
        check_status(response.status, &response.msg)?;

        self.dir_cache.flush_dir(dir);
        Ok(())
    }

    /// Account quota. Requires email and password.
    pub async fn about(&self) -> Result<Usage, Error> {
        if !self.opt.has_account() {
            return Err(Error::Auth {
                message: "email and password are required".to_string(),
            });
        }
        let email: &str = self.opt.email.as_deref().unwrap_or_default();
        let password: &str = self.opt.password.as_deref().unwrap_or_default();

        let response = self.remote.login(email, password).await?;
        if response.status != STATUS_OK {
            return Err(Error::Auth {
                message: response.msg,
            });
        }

        let total: i64 = response.data.user_info.size_cap;
        let used: i64 = response.data.user_info.size_curr.max(0);
        Ok(Usage {
            total,
            used,
            free: total - used,
        })
    }

    /// Server-side move of a file to `dst`, synthesizing move-with-rename
    /// through a temporary name when both the parent and the leaf change.
    ///
    /// # Errors
    /// `CantMove` on any step failure; partial state may remain.
    pub async fn move_file(&self, src: &Object<'_>, dst: &str) -> Result<Object<'_>, Error> {
        if src.is_dir() {
            return Err(Error::CantMove {
                message: "source is a directory".to_string(),
            });
        }

        let (src_leaf, src_pid) = self
            .dir_cache
            .find_path(self, src.remote(), false)
            .await
            .map_err(|e| Error::CantMove {
                message: format!("resolving source: {e}"),
            })?;
        let (dst_leaf, dst_pid) = self
            .dir_cache
            .find_path(self, dst, true)
            .await
            .map_err(|e| Error::CantMove {
                message: format!("resolving destination: {e}"),
            })?;

        let item_id: &str = src.item_id();
        let step = |e: Error| Error::CantMove {
            message: e.to_string(),
        };

        if src_pid == dst_pid {
            if dst_leaf != src_leaf {
                self.file_rename_checked(item_id, &dst_leaf).await.map_err(step)?;
            }
        } else if dst_leaf == src_leaf {
            self.file_move_checked(item_id, dst_pid).await.map_err(step)?;
        } else {
            // Both parent and leaf change: rename to a free temporary name,
            // move across, rename to the final leaf.
            let temp: String = self
                .pick_temp_leaf(&dst_leaf, src_pid, dst_pid)
                .await
                .map_err(step)?;
            self.file_rename_checked(item_id, &temp).await.map_err(step)?;
            self.file_move_checked(item_id, dst_pid).await.map_err(step)?;
            self.file_rename_checked(item_id, &dst_leaf).await.map_err(step)?;
        }

        let entity = reconcile::wait_for_entity(&self.walker(), dst_pid, &dst_leaf)
            .await
            .map_err(|e| Error::CantMove {
                message: format!("verifying destination: {e}"),
            })?;
        Ok(Object::from_entity(self, dst.to_string(), &entity))
    }

    /// Server-side move of the directory at `src_remote` to `dst_remote`.
    ///
    /// # Errors
    /// `DirExists` when the destination already resolves; `CantDirMove` on
    /// any step failure.
    pub async fn dir_move(&self, src_remote: &str, dst_remote: &str) -> Result<(), Error> {
        match self.dir_cache.find_dir(self, dst_remote, false).await {
            Ok(_) => {
                return Err(Error::DirExists {
                    path: dst_remote.to_string(),
                })
            }
            Err(Error::DirNotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        let step = |e: Error| Error::CantDirMove {
            message: e.to_string(),
        };

        let src_id: i64 = self
            .dir_cache
            .find_dir(self, src_remote, false)
            .await
            .map_err(step)?;
        let (src_leaf, src_pid) = self
            .dir_cache
            .find_path(self, src_remote, false)
            .await
            .map_err(step)?;
        let (dst_leaf, dst_pid) = self
            .dir_cache
            .find_path(self, dst_remote, true)
            .await
            .map_err(step)?;

        // The subtree's paths are about to change; drop stale bindings.
        self.dir_cache.flush_dir(src_remote);

        if src_pid == dst_pid {
            if dst_leaf != src_leaf {
                self.folder_rename_checked(src_id, &dst_leaf).await.map_err(step)?;
            }
        } else if dst_leaf == src_leaf {
            self.folder_move_checked(src_id, dst_pid).await.map_err(step)?;
        } else {
            let temp: String = self
                .pick_temp_leaf(&dst_leaf, src_pid, dst_pid)
                .await
                .map_err(step)?;
            self.folder_rename_checked(src_id, &temp).await.map_err(step)?;
            self.folder_move_checked(src_id, dst_pid).await.map_err(step)?;
            self.folder_rename_checked(src_id, &dst_leaf).await.map_err(step)?;
        }

        reconcile::wait_for_entity(&self.walker(), dst_pid, &dst_leaf)
            .await
            .map_err(|e| Error::CantDirMove {
                message: format!("verifying destination: {e}"),
            })?;
        Ok(())
    }

    /// Find a leaf name with no entry under either parent, probing
    /// numbered suffixes.
    async fn pick_temp_leaf(&self, base: &str, pid_a: i64, pid_b: i64) -> Result<String, Error> {
        let walker: Walker<'_> = self.walker();
        for suffix in 0..100u32 {
            let candidate: String = format!("{base}__{suffix}");
            if walker.find_entry(pid_a, &candidate).await?.is_none()
                && walker.find_entry(pid_b, &candidate).await?.is_none()
            {
                return Ok(candidate);
            }
        }
        Err(Error::CantMove {
            message: format!("no free temporary name for {base}"),
        })
    }

    pub(crate) async fn file_rename_checked(&self, item_id: &str, name: &str) -> Result<(), Error> {
        let wire: String = self.opt.encoding.from_standard_name(name);
        let response = self.remote.file_rename(item_id, &wire).await?;
        check_status_idempotent(response.status, &response.msg)?;
        Ok(())
    }

    pub(crate) async fn file_move_checked(&self, item_id: &str, new_pid: i64) -> Result<(), Error> {
        let response = self.remote.file_move(item_id, new_pid).await?;
        check_status_idempotent(response.status, &response.msg)?;
        Ok(())
    }

    async fn folder_rename_checked(&self, dir_id: i64, name: &str) -> Result<(), Error> {
        let wire: String = self.opt.encoding.from_standard_name(name);
        let response = self.remote.folder_rename(dir_id, &wire).await?;
        check_status(response.status, &response.msg)?;
        Ok(())
    }

    async fn folder_move_checked(&self, dir_id: i64, new_pid: i64) -> Result<(), Error> {
        let response = self.remote.folder_move(dir_id, new_pid).await?;
        check_status(response.status, &response.msg)?;
        Ok(())
    }
}

#[async_trait]
impl DirSource for LinkboxFs {
    async fn find_leaf(&self, parent_id: i64, leaf: &str) -> Result<Option<i64>, Error> {
        let mut found: Option<i64> = None;
        self.walker()
            .walk(parent_id, leaf, |entity| {
                if entity.is_dir() && self.opt.encoding.to_standard_name(&entity.name) == leaf {
                    found = Some(entity.id);
                    true
                } else {
                    false
                }
            })
            .await?;
        Ok(found)
    }

    async fn create_dir(&self, parent_id: i64, leaf: &str) -> Result<i64, Error> {
        let wire: String = self.opt.encoding.from_standard_name(leaf);
        let response = self.remote.folder_create(&wire, parent_id).await?;

        if response.status == STATUS_ALREADY_EXISTS {
            // Lost a race or an idempotent repeat: resolve the existing
            // directory instead of failing.
            return match self.find_leaf(parent_id, leaf).await? {
                Some(id) => Ok(id),
                None => Err(Error::DirNotFound {
                    path: leaf.to_string(),
                }),
            };
        }
        check_status(response.status, &response.msg)?;

        if response.data.dir_id == 0 {
            return Err(Error::Api(ApiError::Decode {
                message: "folder_create returned 0 for the new directory id".to_string(),
            }));
        }
        Ok(response.data.dir_id)
    }
}
