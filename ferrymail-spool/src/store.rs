//! Filesystem-backed outbound queue.
//!
//! Layout under the queue root: `queue/` holds messages awaiting delivery,
//! `failed/` receives bounced messages by rename, and `trigger` is the named
//! pipe external writers pulse to request an immediate rescan. Message
//! content is opaque to this crate; the queueing frontend is expected to
//! deposit complete files atomically.

use std::{
    path::{Path, PathBuf},
    time::SystemTime,
};

use ferrymail_common::queue;
use tokio::fs;

use crate::error::{Result, SpoolError};

/// One entry of the message directory at scan time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    /// Basename within the message directory.
    pub filename: String,
    /// Modification time; the earliest-queued proxy used for expiry.
    pub timestamp: SystemTime,
}

/// Handle on the on-disk queue layout.
#[derive(Debug, Clone)]
pub struct Spool {
    queue_dir: PathBuf,
    failed_dir: PathBuf,
    trigger_path: PathBuf,
}

impl Spool {
    /// Open the queue layout under `root`, creating the message and failed
    /// directories when absent.
    ///
    /// # Errors
    /// If a component exists but is not a directory, or cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let queue_dir = root.join("queue");
        let failed_dir = root.join("failed");
        let trigger_path = root.join("trigger");
        for dir in [&root, &queue_dir, &failed_dir] {
            if dir.try_exists()? {
                if !dir.is_dir() {
                    return Err(SpoolError::NotADirectory(dir.display().to_string()));
                }
            } else {
                std::fs::create_dir_all(dir)?;
            }
        }
        Ok(Self {
            queue_dir,
            failed_dir,
            trigger_path,
        })
    }

    /// Path of the trigger FIFO.
    pub fn trigger_path(&self) -> &Path {
        &self.trigger_path
    }

    /// Path of a message within the queue directory.
    pub fn message_path(&self, name: &str) -> PathBuf {
        self.queue_dir.join(name)
    }

    /// Enumerate regular files in the message directory.
    ///
    /// Entries that cannot be inspected are logged and skipped; non-regular
    /// entries are skipped silently.
    ///
    /// # Errors
    /// If the message directory itself cannot be read.
    pub async fn list_messages(&self) -> Result<Vec<QueuedMessage>> {
        let mut dir = fs::read_dir(&self.queue_dir).await?;
        let mut messages = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let meta = match entry.metadata().await {
                Ok(meta) => meta,
                Err(err) => {
                    queue!(level = WARN, "Could not stat {name}, skipping: {err}");
                    continue;
                }
            };
            if !meta.is_file() {
                continue;
            }
            let timestamp = match meta.modified() {
                Ok(timestamp) => timestamp,
                Err(err) => {
                    queue!(level = WARN, "Could not stat {name}, skipping: {err}");
                    continue;
                }
            };
            messages.push(QueuedMessage {
                filename: name,
                timestamp,
            });
        }
        Ok(messages)
    }

    /// Remove a delivered message.
    ///
    /// # Errors
    /// If the unlink fails; the caller keeps the message in its working set.
    pub async fn unlink_message(&self, name: &str) -> Result<()> {
        fs::remove_file(self.queue_dir.join(name)).await?;
        Ok(())
    }

    /// Rename a message out of the queue into the failed directory.
    ///
    /// # Errors
    /// If the rename fails; the caller keeps the message in its working set.
    pub async fn bounce_message(&self, name: &str) -> Result<()> {
        fs::rename(self.queue_dir.join(name), self.failed_dir.join(name)).await?;
        Ok(())
    }
}
