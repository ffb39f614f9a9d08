//! Linkbox cloud-storage backend.
//!
//! Exposes a generic object-store surface (list, stat, read, write, move,
//! directory operations) over a remote whose native API is neither POSIX
//! nor S3 shaped. Two subsystems carry the weight:
//!
//! - **Path/identity reconciliation**: user paths are translated to the
//!   remote's flat numeric-ID namespace through a cached, search-backed
//!   resolver ([`dircache`], [`walker`]); "move with rename" is synthesized
//!   from the remote's two primitives via temporary names; post-mutation
//!   reads are retried until the eventually-consistent search reflects them
//!   ([`reconcile`]).
//! - **Concurrent transfers**: uploads choose between a single signed-URL
//!   PUT and a credentialed multipart push to the backing object store;
//!   ranged reads fan out across parallel workers. Both live in
//!   `linkbox-storage` and are driven from [`Object`].
//!
//! The entry point is [`LinkboxFs`]; everything remote goes through the
//! [`linkbox_api::Remote`] trait so tests can swap in an in-memory remote.

pub mod dircache;
mod error;
mod fs;
mod object;
mod options;
pub mod reconcile;
pub mod walker;

pub use error::Error;
pub use fs::{DirRef, Entry, LinkboxFs, Usage};
pub use object::Object;
pub use options::{
    Options, DEFAULT_RESPONSE_HEADER_TIMEOUT_SECS, DEFAULT_RX_CONCURRENCY, DEFAULT_TX_CONCURRENCY,
    DEFAULT_USER_AGENT,
};

pub use linkbox_api::ByteRange;
pub use linkbox_common::ByteReader;
