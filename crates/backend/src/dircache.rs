//! Mapping between textual paths and the remote's numeric directory IDs.
//!
//! The remote has no path API at all; every component of every path must be
//! resolved through search, so the results are cached. Entries are only
//! populated from authoritative responses (a create's returned ID, or an
//! entry observed in a search) and a miss never fabricates an ID. Mutations
//! that delete or relocate a directory flush the affected subtree.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use linkbox_common::{is_within, join_remote, split_dir_and_name};

use crate::error::Error;

/// Sentinel ID of the remote's root directory.
pub const ROOT_DIR_ID: i64 = 0;

/// Leaf lookup and creation, supplied by the filesystem.
#[async_trait]
pub trait DirSource: Send + Sync {
    /// Find the directory named `leaf` directly under `parent_id`.
    async fn find_leaf(&self, parent_id: i64, leaf: &str) -> Result<Option<i64>, Error>;

    /// Create a directory named `leaf` under `parent_id`; returns its ID.
    async fn create_dir(&self, parent_id: i64, leaf: &str) -> Result<i64, Error>;
}

/// Path-to-ID cache for one filesystem handle.
///
/// Keys are absolute remote paths (the configured root is prepended to
/// every relative path before lookup); the empty path is pinned to
/// [`ROOT_DIR_ID`].
pub struct DirCache {
    root: String,
    paths: Mutex<HashMap<String, i64>>,
}

impl DirCache {
    /// Create a cache for a filesystem rooted at `root` (already trimmed of
    /// slashes; empty for the account root).
    pub fn new(root: impl Into<String>) -> Self {
        let mut paths: HashMap<String, i64> = HashMap::new();
        paths.insert(String::new(), ROOT_DIR_ID);
        Self {
            root: root.into(),
            paths: Mutex::new(paths),
        }
    }

    fn absolute(&self, rel: &str) -> String {
        join_remote(&self.root, rel)
    }

    /// Cached ID for a relative path, if any.
    pub fn get(&self, rel: &str) -> Option<i64> {
        self.paths.lock().unwrap().get(&self.absolute(rel)).copied()
    }

    /// Record an authoritative path-to-ID binding.
    pub fn put(&self, rel: &str, id: i64) {
        self.paths.lock().unwrap().insert(self.absolute(rel), id);
    }

    /// Drop the entry at `rel` and everything beneath it. The root binding
    /// is always restored.
    pub fn flush_dir(&self, rel: &str) {
        let target: String = self.absolute(rel);
        let mut paths = self.paths.lock().unwrap();
        paths.retain(|path, _| !is_within(&target, path));
        paths.insert(String::new(), ROOT_DIR_ID);
    }

    /// Drop everything and re-bind the root to the sentinel ID.
    pub fn reset(&self) {
        let mut paths = self.paths.lock().unwrap();
        paths.clear();
        paths.insert(String::new(), ROOT_DIR_ID);
    }

    /// Resolve a relative directory path to its ID, walking down from the
    /// deepest cached ancestor. Missing components are created only when
    /// `create` is set.
    pub async fn find_dir(
        &self,
        source: &dyn DirSource,
        rel: &str,
        create: bool,
    ) -> Result<i64, Error> {
        let target: String = self.absolute(rel);
        if target.is_empty() {
            return Ok(ROOT_DIR_ID);
        }

        let mut current_id: i64 = ROOT_DIR_ID;
        let mut current_path: String = String::new();

        for component in target.split('/') {
            let next_path: String = join_remote(&current_path, component);
            let cached: Option<i64> = {
                self.paths.lock().unwrap().get(&next_path).copied()
            };
            let id: i64 = match cached {
                Some(id) => id,
                None => match source.find_leaf(current_id, component).await? {
                    Some(id) => {
                        self.paths.lock().unwrap().insert(next_path.clone(), id);
                        id
                    }
                    None if create => {
                        let id: i64 = source.create_dir(current_id, component).await?;
                        self.paths.lock().unwrap().insert(next_path.clone(), id);
                        id
                    }
                    None => {
                        return Err(Error::DirNotFound {
                            path: rel.to_string(),
                        })
                    }
                },
            };
            current_id = id;
            current_path = next_path;
        }

        Ok(current_id)
    }

    /// Split a potential child path into `(leaf, parent_id)`, resolving the
    /// parent chain and creating it when `create_parents` is set.
    pub async fn find_path(
        &self,
        source: &dyn DirSource,
        rel: &str,
        create_parents: bool,
    ) -> Result<(String, i64), Error> {
        let (dir, leaf) = split_dir_and_name(rel);
        if leaf.is_empty() {
            return Err(Error::ObjectNotFound {
                path: rel.to_string(),
            });
        }
        let parent_id: i64 = self.find_dir(source, dir, create_parents).await?;
        Ok((leaf.to_string(), parent_id))
    }
}
