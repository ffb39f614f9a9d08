//! Error types for transfer operations.

use thiserror::Error;

/// Errors that can occur while moving bytes to or from the object store.
#[derive(Debug, Error, Clone)]
pub enum TransferError {
    /// The object store rejected or failed a call.
    #[error("object store error: {message}")]
    Store { message: String },

    /// Reading the input stream failed or ended early.
    #[error("failed to read source: {message}")]
    Read { message: String },

    /// A part upload failed after its retry budget was exhausted.
    #[error("failed to upload part {part_number}: {message}")]
    Part { part_number: i32, message: String },

    /// The declared size needs more parts than one upload may carry.
    #[error("too many parts: {count} > {max}")]
    TooManyParts { count: u64, max: u64 },

    /// Some download workers failed; the whole read is abandoned.
    #[error("failed to download {failed} of {total} parts")]
    PartialDownload { failed: usize, total: usize },

    /// The transfer configuration is out of bounds.
    #[error("invalid transfer configuration: {message}")]
    InvalidConfig { message: String },
}
