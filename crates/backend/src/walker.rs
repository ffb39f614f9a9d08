//! Paginated traversal of the search endpoint.
//!
//! The search endpoint is the only way to enumerate a directory, and it
//! cannot be trusted on two counts: a name filter is matched as a substring
//! across *all* directories, and names outside a small safe charset make
//! the server silently fall back to an unfiltered listing. The walker
//! re-filters every page by parent ID client-side and drops the filter
//! entirely for unsafe names.

use linkbox_api::types::check_status;
use linkbox_api::{Entity, Remote};
use linkbox_common::NameCodec;

use crate::error::Error;

/// Page size the endpoint is known to serve reliably.
pub const MAX_ENTRIES_PER_PAGE: u32 = 1024;
/// Hard cap on pages walked, guarding against a looping server.
pub const MAX_SEARCH_PAGES: u32 = 100_000;

/// Whether a name can be passed to the server as a search filter.
///
/// Anything outside `[a-zA-Z0-9_ .]` triggers the server-side fallback to
/// an unfiltered listing, so such names are not worth sending.
pub fn search_safe(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ' ' || c == '.')
}

/// Borrowed view over the remote and name codec for search traversal.
pub struct Walker<'a> {
    remote: &'a dyn Remote,
    codec: &'a dyn NameCodec,
}

impl<'a> Walker<'a> {
    pub fn new(remote: &'a dyn Remote, codec: &'a dyn NameCodec) -> Self {
        Self { remote, codec }
    }

    /// Visit entries under `parent_id`, narrowing server-side with
    /// `name_filter` when it is safe to send. `visit` returns `true` to
    /// stop early; the walk reports whether it did.
    ///
    /// Pagination ends when a page comes back short of
    /// [`MAX_ENTRIES_PER_PAGE`]; running past [`MAX_SEARCH_PAGES`] is an
    /// error.
    pub async fn walk<F>(
        &self,
        parent_id: i64,
        name_filter: &str,
        mut visit: F,
    ) -> Result<bool, Error>
    where
        F: FnMut(&Entity) -> bool,
    {
        // The search endpoint dislikes surrounding whitespace.
        let trimmed: &str = name_filter.trim();
        let filter: &str = if search_safe(trimmed) { trimmed } else { "" };

        let mut page_no: u32 = 0;
        loop {
            page_no += 1;
            let response = self
                .remote
                .file_search(filter, parent_id, page_no, MAX_ENTRIES_PER_PAGE)
                .await?;
            check_status(response.status, &response.msg)?;

            let page_len: usize = response.data.entities.len();
            for entity in &response.data.entities {
                // With a filter the server matches across every directory.
                if entity.pid != parent_id {
                    continue;
                }
                if visit(entity) {
                    return Ok(true);
                }
            }

            if page_len < MAX_ENTRIES_PER_PAGE as usize {
                return Ok(false);
            }
            if page_no > MAX_SEARCH_PAGES {
                return Err(Error::TooManyResults);
            }
        }
    }

    /// Find the entry named `leaf` (decoded form) under `parent_id`.
    pub async fn find_entry(&self, parent_id: i64, leaf: &str) -> Result<Option<Entity>, Error> {
        let mut found: Option<Entity> = None;
        self.walk(parent_id, leaf, |entity| {
            if self.codec.to_standard_name(&entity.name) == leaf {
                found = Some(entity.clone());
                true
            } else {
                false
            }
        })
        .await?;
        Ok(found)
    }

    /// Collect every entry directly under `parent_id`.
    pub async fn list_dir(&self, parent_id: i64) -> Result<Vec<Entity>, Error> {
        let mut entries: Vec<Entity> = Vec::new();
        self.walk(parent_id, "", |entity| {
            entries.push(entity.clone());
            false
        })
        .await?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_safe_charset() {
        assert!(search_safe("plain_name 1.txt"));
        assert!(search_safe("UPPER.lower.123"));
        assert!(!search_safe(""));
        assert!(!search_safe("weird%name!.bin"));
        assert!(!search_safe("café.txt"));
        assert!(!search_safe("semi;colon"));
        assert!(!search_safe("slash/name"));
    }
}
