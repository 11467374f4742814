//! Named-pipe trigger that lets external writers wake the delivery engine
//! without it polling the queue.

use std::{
    io,
    path::{Path, PathBuf},
};

use nix::sys::stat::Mode;
use tokio::net::unix::pipe;

/// Read end of the queue trigger FIFO.
#[derive(Debug)]
pub struct Trigger {
    path: PathBuf,
    receiver: pipe::Receiver,
}

impl Trigger {
    /// Open the trigger FIFO, creating it (mode 0622) when absent.
    ///
    /// The pipe is held open read-write so the kernel never reports EOF when
    /// the last external writer closes its end.
    ///
    /// # Errors
    /// If the FIFO cannot be created or opened; fatal at startup.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if !path.try_exists()? {
            nix::unistd::mkfifo(&path, Mode::from_bits_truncate(0o622))
                .map_err(|errno| io::Error::from_raw_os_error(errno as i32))?;
        }
        let receiver = Self::open_receiver(&path)?;
        Ok(Self { path, receiver })
    }

    fn open_receiver(path: &Path) -> io::Result<pipe::Receiver> {
        pipe::OpenOptions::new().read_write(true).open_receiver(path)
    }

    /// Wait until an external writer pulses the trigger.
    ///
    /// # Errors
    /// If the descriptor fails; fatal to the current engine iteration only.
    pub async fn readable(&mut self) -> io::Result<()> {
        self.receiver.readable().await
    }

    /// Discard pending bytes and rearm for the next pulse, reopening the
    /// FIFO if it ever reports EOF.
    ///
    /// # Errors
    /// If draining or reopening fails.
    pub fn rearm(&mut self) -> io::Result<()> {
        let mut buf = [0u8; 1024];
        loop {
            match self.receiver.try_read(&mut buf) {
                Ok(0) => {
                    self.receiver = Self::open_receiver(&self.path)?;
                    break;
                }
                Ok(_) => {}
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}
