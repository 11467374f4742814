//! The delivery engine: queue sweeps, outcome dispatch, and the idle loop.

use std::{
    path::PathBuf,
    time::{Duration, SystemTime},
};

use ferrymail_common::{config::ConfigDir, delivery, internal, queue};
use ferrymail_spool::{QueuedMessage, Spool};

use crate::{
    backoff::Backoff,
    error::StartupError,
    settings::{self, Remote, Settings},
    signals::SignalMailbox,
    supervisor::{self, Outcome},
    trigger::Trigger,
};

/// The delivery daemon's engine. One `Sender` owns the working set and every
/// event source the main loop blocks on; deliveries run strictly serially.
#[derive(Debug)]
pub struct Sender {
    config: ConfigDir,
    protocol_dir: PathBuf,
    spool: Spool,
    mailbox: SignalMailbox,
    trigger: Trigger,
    backoff: Backoff,
    settings: Settings,
    remotes: Vec<Remote>,
    messages: Vec<QueuedMessage>,
}

impl Sender {
    /// Bring up the engine: the signal mailbox first (no child may be forked
    /// before it is watching), then the queue store and trigger, then the
    /// initial configuration and queue scan.
    ///
    /// # Errors
    /// Any failure here is fatal to the daemon.
    pub async fn start(
        config_dir: impl Into<PathBuf>,
        queue_root: impl Into<PathBuf>,
        protocol_dir: impl Into<PathBuf>,
    ) -> Result<Self, StartupError> {
        let mailbox = SignalMailbox::install().map_err(StartupError::Signals)?;
        let spool = Spool::open(queue_root)?;
        let trigger = Trigger::open(spool.trigger_path()).map_err(StartupError::Trigger)?;
        let config = ConfigDir::new(config_dir);
        let protocol_dir = protocol_dir.into();

        let settings = Settings::load(&config);
        let remotes = match settings::load_remotes(&config, &protocol_dir) {
            Ok(remotes) => remotes,
            Err(err) => {
                internal!(level = ERROR, "Could not load the config: {err}");
                Vec::new()
            }
        };
        let backoff = Backoff::new(settings.pausetime, settings.maxpause);

        let mut sender = Self {
            config,
            protocol_dir,
            spool,
            mailbox,
            trigger,
            backoff,
            settings,
            remotes,
            messages: Vec::new(),
        };
        sender.load_messages().await;
        Ok(sender)
    }

    /// Drive sweeps until one-shot mode ends the loop. This is the daemon's
    /// main loop; it only returns when the configured floor is zero.
    pub async fn run(&mut self) {
        loop {
            self.send_all().await;
            if self.settings.pausetime == 0 {
                break;
            }
            self.do_select().await;
        }
    }

    /// One full pass over (remotes × messages).
    ///
    /// Configuration is reloaded first; a reload without usable remotes
    /// aborts the sweep (the scalar settings still refresh, and the previous
    /// remote list is kept for the next successful reload). Filesystem
    /// effects land before the working set is updated.
    pub async fn send_all(&mut self) {
        let settings = Settings::load(&self.config);
        self.backoff
            .reconfigure(settings.pausetime, settings.maxpause);
        self.settings = settings;
        match settings::load_remotes(&self.config, &self.protocol_dir) {
            Ok(remotes) => self.remotes = remotes,
            Err(err) => {
                internal!(level = ERROR, "Could not load the config: {err}");
                return;
            }
        }
        if self.messages.is_empty() {
            return;
        }

        delivery!(
            "Starting delivery, {} message(s) in queue.",
            self.messages.len()
        );
        let remotes = self.remotes.clone();
        let helohost = self.settings.helohost.clone();
        let sendtimeout = Duration::from_secs(self.settings.sendtimeout);
        let queuelifetime = Duration::from_secs(self.settings.queuelifetime);

        for remote in &remotes {
            let mut index = 0;
            while index < self.messages.len() {
                let outcome = supervisor::send_one(
                    &self.spool,
                    &mut self.mailbox,
                    &self.messages[index],
                    remote,
                    &helohost,
                    sendtimeout,
                )
                .await;
                match outcome {
                    Outcome::Success => {
                        match self
                            .spool
                            .unlink_message(&self.messages[index].filename)
                            .await
                        {
                            Ok(()) => {
                                self.messages.remove(index);
                            }
                            Err(err) => {
                                queue!(level = ERROR, "Can't unlink file: {err}");
                                index += 1;
                            }
                        }
                    }
                    Outcome::Permfail => {
                        if self.bounce(index).await {
                            self.messages.remove(index);
                        } else {
                            index += 1;
                        }
                    }
                    Outcome::Tempfail => {
                        if expired(&self.messages[index], queuelifetime) && self.bounce(index).await
                        {
                            self.messages.remove(index);
                        } else {
                            index += 1;
                        }
                    }
                }
            }
        }
        delivery!(
            "Delivery complete, {} message(s) remain.",
            self.messages.len()
        );
    }

    /// Block on the trigger with the backoff timeout, then rescan if asked.
    ///
    /// A pulse resets the schedule to the floor; a timeout just rescans. A
    /// stray signal ends the wait early, and an alarm observed anywhere is
    /// honored here as a rescan request.
    pub async fn do_select(&mut self) {
        let timeout = self.backoff.next_timeout(self.messages.is_empty());
        let mut reload = false;
        tokio::select! {
            ready = self.trigger.readable() => match ready {
                Ok(()) => {
                    queue!("Trigger pulled.");
                    if let Err(err) = self.trigger.rearm() {
                        queue!(level = ERROR, "Could not rearm the trigger: {err}");
                    }
                    reload = true;
                    self.backoff.reset();
                }
                Err(err) => internal!(level = ERROR, "Internal error in select: {err}"),
            },
            () = tokio::time::sleep(timeout) => reload = true,
            _ = self.mailbox.wait_signal(None) => {}
        }
        if self.mailbox.take_rescan_request() {
            reload = true;
        }
        if reload {
            self.load_messages().await;
        }
    }

    /// Refresh the working set from the message directory. A failed scan
    /// keeps the previous set.
    pub async fn load_messages(&mut self) {
        self.mailbox.take_rescan_request();
        queue!("Rescanning queue.");
        match self.spool.list_messages().await {
            Ok(messages) => self.messages = messages,
            Err(err) => queue!(level = ERROR, "Cannot open queue directory: {err}"),
        }
    }

    async fn bounce(&self, index: usize) -> bool {
        let name = &self.messages[index].filename;
        queue!("Moving message {name} into failed");
        match self.spool.bounce_message(name).await {
            Ok(()) => true,
            Err(err) => {
                queue!(level = ERROR, "Can't rename file: {err}");
                false
            }
        }
    }
}

fn expired(message: &QueuedMessage, queuelifetime: Duration) -> bool {
    SystemTime::now()
        .duration_since(message.timestamp)
        .is_ok_and(|age| age > queuelifetime)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{fs, io::Write, path::Path, time::Instant};

    use tempfile::TempDir;

    fn write_config(dir: &Path, key: &str, value: &str) {
        fs::write(dir.join(key), value).unwrap();
    }

    async fn idle_sender(root: &TempDir, pausetime: &str, maxpause: &str) -> Sender {
        let config_dir = root.path().join("config");
        fs::create_dir_all(&config_dir).unwrap();
        write_config(&config_dir, "remotes", "mx.example.com smtp\n");
        write_config(&config_dir, "pausetime", pausetime);
        write_config(&config_dir, "maxpause", maxpause);
        Sender::start(
            &config_dir,
            root.path().join("spool"),
            root.path().join("protocols"),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn trigger_pulse_resets_backoff_and_rescans() {
        let root = TempDir::new().unwrap();
        let mut sender = idle_sender(&root, "1", "60").await;

        // An idle tick with an empty queue pins the schedule to the ceiling.
        sender.backoff.next_timeout(true);
        assert_eq!(sender.backoff.current(), 60);

        let mut writer = fs::OpenOptions::new()
            .write(true)
            .open(sender.spool.trigger_path())
            .unwrap();
        writer.write_all(b"x").unwrap();
        drop(writer);
        fs::write(root.path().join("spool/queue/m1"), b"body").unwrap();

        // A stray signal from a concurrently running test can steal one
        // wakeup; the pending pulse is honored on the next call.
        let deadline = Instant::now() + Duration::from_secs(10);
        while sender.backoff.current() != sender.backoff.floor() && Instant::now() < deadline {
            sender.do_select().await;
        }
        assert_eq!(sender.backoff.current(), sender.backoff.floor());
        assert_eq!(sender.messages.len(), 1);
        assert_eq!(sender.messages[0].filename, "m1");
    }

    #[tokio::test]
    async fn idle_timeout_rescans_the_queue() {
        let root = TempDir::new().unwrap();
        let mut sender = idle_sender(&root, "1", "1").await;
        fs::write(root.path().join("spool/queue/m1"), b"body").unwrap();

        // The ceiling is one second; the sleep arm fires and forces a rescan.
        // A stray signal from a concurrent test can end one wait early, so
        // allow a few ticks.
        let deadline = Instant::now() + Duration::from_secs(10);
        while sender.messages.is_empty() && Instant::now() < deadline {
            sender.do_select().await;
        }
        assert_eq!(sender.messages.len(), 1);
    }

    #[tokio::test]
    async fn failed_reload_keeps_scalars_but_aborts_the_sweep() {
        let root = TempDir::new().unwrap();
        let mut sender = idle_sender(&root, "1", "60").await;
        fs::write(root.path().join("spool/queue/m1"), b"body").unwrap();
        sender.load_messages().await;

        // Break the remote list and change a scalar; the sweep must abort
        // without touching the queue, while the scalar still refreshes.
        write_config(&root.path().join("config"), "remotes", "# none\n");
        write_config(&root.path().join("config"), "pausetime", "0");
        sender.send_all().await;
        assert_eq!(sender.settings.pausetime, 0);
        assert_eq!(sender.messages.len(), 1);
        assert!(root.path().join("spool/queue/m1").exists());
    }
}
