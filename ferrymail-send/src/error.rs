//! Startup errors fatal to the daemon.

use std::io;

use thiserror::Error;

/// Failures before the main loop can run; the daemon exits 1 on any of
/// these. Once the loop is running, no error crosses a sweep boundary.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Signal handling could not be installed.
    #[error("Could not set up signal handling: {0}")]
    Signals(#[source] io::Error),

    /// The trigger FIFO could not be created or opened.
    #[error("Could not open trigger file: {0}")]
    Trigger(#[source] io::Error),

    /// The queue directory layout is unusable.
    #[error("Queue directory unavailable: {0}")]
    Spool(#[from] ferrymail_spool::SpoolError),
}
