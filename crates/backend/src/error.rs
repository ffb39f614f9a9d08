//! The backend's public error taxonomy.
//!
//! Callers branch on these variants: `DirNotFound` triggers create paths,
//! `ObjectNotFound` distinguishes "make it" from "transport broke",
//! `DirectoryNotEmpty` guards rmdir. Transient transport trouble never
//! reaches this level; the pacers absorb it until their budgets run out.

use thiserror::Error;

use linkbox_api::ApiError;
use linkbox_storage::TransferError;

/// Errors surfaced by backend operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The directory does not exist on the remote.
    #[error("directory not found: {path}")]
    DirNotFound { path: String },

    /// The object does not exist on the remote.
    #[error("object not found: {path}")]
    ObjectNotFound { path: String },

    /// The path names a directory where a file was expected.
    #[error("{path} is a directory")]
    IsDir { path: String },

    /// The destination directory already exists.
    #[error("directory already exists: {path}")]
    DirExists { path: String },

    /// Refusing to remove a directory that still has entries.
    #[error("directory not empty: {path}")]
    DirectoryNotEmpty { path: String },

    /// A move step failed; partial state may remain and the caller retries.
    #[error("cannot move object: {message}")]
    CantMove { message: String },

    /// A directory-move step failed.
    #[error("cannot move directory: {message}")]
    CantDirMove { message: String },

    /// The remote rejects zero-length files.
    #[error("cannot upload zero-length files")]
    CantUploadEmpty,

    /// Login failed or credentials are missing where required.
    #[error("authentication failed: {message}")]
    Auth { message: String },

    /// Pagination ran past the hard page cap.
    #[error("search returned too many results")]
    TooManyResults,

    /// A configured value is out of bounds.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Reading the caller's input stream failed.
    #[error("failed to read input: {message}")]
    Read { message: String },

    /// A mutation succeeded but the remote does not show it yet. Internal
    /// to the reconciliation loops; operations map it before returning.
    #[error("change not yet visible: {path}")]
    NotReflected { path: String },

    /// Control-plane failure, with the remote's message where present.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Data-plane transfer failure.
    #[error(transparent)]
    Transfer(#[from] TransferError),
}
