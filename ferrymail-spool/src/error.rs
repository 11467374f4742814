//! Error types for the ferrymail-spool crate.

use std::io;

use thiserror::Error;

/// Errors raised by queue-store operations.
#[derive(Debug, Error)]
pub enum SpoolError {
    /// I/O operation failed (scan, unlink, rename).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A queue path exists but is not a directory.
    #[error("Queue path is not a directory: {0}")]
    NotADirectory(String),
}

/// Specialized `Result` type for queue-store operations.
pub type Result<T> = std::result::Result<T, SpoolError>;
