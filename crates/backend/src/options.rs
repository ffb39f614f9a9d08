//! Backend configuration, fixed at construction.

use std::fmt;
use std::sync::Arc;

use linkbox_common::{IdentityCodec, NameCodec};
use linkbox_storage::{MAX_PART_SIZE, MIN_PART_SIZE};

use crate::error::Error;

/// Default worker count for multipart uploads.
pub const DEFAULT_TX_CONCURRENCY: usize = 32;
/// Default worker count for parallel downloads.
pub const DEFAULT_RX_CONCURRENCY: usize = 16;
/// Default wait for object-store response headers, seconds.
pub const DEFAULT_RESPONSE_HEADER_TIMEOUT_SECS: u64 = 90;
/// User agent the remote's own clients present.
pub const DEFAULT_USER_AGENT: &str = "okhttp/4.9.3";

/// Configuration for a [`LinkboxFs`](crate::LinkboxFs). Immutable once the
/// filesystem handle is constructed.
#[derive(Clone)]
pub struct Options {
    /// Required API token for the open endpoints.
    pub token: String,
    /// Optional account email; with `password`, enables multipart uploads
    /// and quota reporting.
    pub email: Option<String>,
    /// Optional account password (already revealed by the credential store).
    pub password: Option<String>,
    /// Filename translation policy; defaults to passthrough.
    pub encoding: Arc<dyn NameCodec>,
    /// Multipart upload worker target; 0 disables multipart uploads.
    pub multipart_tx_concurrency: usize,
    /// Bytes per upload part.
    pub multipart_tx_part_size: u64,
    /// Cap on buffered part memory; worker count is reduced to fit.
    pub multipart_tx_max_buffer_size: u64,
    /// Compute per-part content digests for store-side verification.
    pub multipart_tx_integrity: bool,
    /// Parallel download workers per read; 0 disables parallel reads.
    pub multipart_rx_concurrency: usize,
    /// Seconds to wait for part-upload response headers.
    pub multipart_response_header_timeout: u64,
    /// User agent for all HTTP traffic.
    pub user_agent: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            token: String::new(),
            email: None,
            password: None,
            encoding: Arc::new(IdentityCodec),
            multipart_tx_concurrency: DEFAULT_TX_CONCURRENCY,
            multipart_tx_part_size: linkbox_storage::DEFAULT_PART_SIZE,
            multipart_tx_max_buffer_size: linkbox_storage::DEFAULT_MAX_BUFFER_SIZE,
            multipart_tx_integrity: false,
            multipart_rx_concurrency: DEFAULT_RX_CONCURRENCY,
            multipart_response_header_timeout: DEFAULT_RESPONSE_HEADER_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Options {
    /// Options carrying just the required token, defaults elsewhere.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Default::default()
        }
    }

    /// Check configured values against hard bounds.
    pub fn validate(&self) -> Result<(), Error> {
        if self.token.is_empty() {
            return Err(Error::InvalidConfig {
                message: "token is required".to_string(),
            });
        }
        if self.multipart_tx_part_size < MIN_PART_SIZE
            || self.multipart_tx_part_size > MAX_PART_SIZE
        {
            return Err(Error::InvalidConfig {
                message: format!(
                    "multipart_tx_part_size {} outside {}..={}",
                    self.multipart_tx_part_size, MIN_PART_SIZE, MAX_PART_SIZE
                ),
            });
        }
        Ok(())
    }

    /// Whether account credentials are configured.
    pub fn has_account(&self) -> bool {
        matches!((&self.email, &self.password), (Some(e), Some(p)) if !e.is_empty() && !p.is_empty())
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("token", &"<redacted>")
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("multipart_tx_concurrency", &self.multipart_tx_concurrency)
            .field("multipart_tx_part_size", &self.multipart_tx_part_size)
            .field(
                "multipart_tx_max_buffer_size",
                &self.multipart_tx_max_buffer_size,
            )
            .field("multipart_tx_integrity", &self.multipart_tx_integrity)
            .field("multipart_rx_concurrency", &self.multipart_rx_concurrency)
            .field(
                "multipart_response_header_timeout",
                &self.multipart_response_header_timeout,
            )
            .field("user_agent", &self.user_agent)
            .finish()
    }
}
