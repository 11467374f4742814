//! Signal mailbox bridging asynchronous signal delivery into the engine's
//! synchronous control flow.
//!
//! The mailbox owns kernel signal streams for the signals the engine cares
//! about and exposes a single timeout-bounded wait. It is the only place the
//! main task blocks while a helper child is running, and it must be
//! installed before the first child is forked so no exit can be missed.

use std::{io, time::Duration};

use tokio::signal::unix::{signal, Signal, SignalKind};

/// Signals of interest to the delivery engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sig {
    /// A child process changed state.
    Child,
    /// The queue-rescan alarm.
    Alarm,
    /// Hangup; observed and discarded.
    Hangup,
}

/// Result of one [`SignalMailbox::wait_signal`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigEvent {
    /// A registered signal arrived.
    Signal(Sig),
    /// The timeout elapsed with no signal.
    Timeout,
    /// A signal stream ended; the wait cannot continue.
    Error,
}

#[derive(Debug)]
pub struct SignalMailbox {
    sigchld: Signal,
    sigalrm: Signal,
    sighup: Signal,
    rescan_requested: bool,
}

impl SignalMailbox {
    /// Register the signal streams.
    ///
    /// # Errors
    /// If any handler cannot be installed.
    pub fn install() -> io::Result<Self> {
        Ok(Self {
            sigchld: signal(SignalKind::child())?,
            sigalrm: signal(SignalKind::alarm())?,
            sighup: signal(SignalKind::hangup())?,
            rescan_requested: false,
        })
    }

    /// Block until a registered signal arrives or `timeout` elapses; `None`
    /// waits indefinitely.
    ///
    /// An observed alarm latches the rescan request no matter which caller
    /// was waiting; the engine drains it with
    /// [`take_rescan_request`](Self::take_rescan_request).
    pub async fn wait_signal(&mut self, timeout: Option<Duration>) -> SigEvent {
        let event = tokio::select! {
            received = self.sigchld.recv() => Self::event(received, Sig::Child),
            received = self.sigalrm.recv() => Self::event(received, Sig::Alarm),
            received = self.sighup.recv() => Self::event(received, Sig::Hangup),
            () = sleep_or_forever(timeout) => SigEvent::Timeout,
        };
        if event == SigEvent::Signal(Sig::Alarm) {
            self.rescan_requested = true;
        }
        event
    }

    /// Consume the rescan request latched by an observed alarm.
    pub fn take_rescan_request(&mut self) -> bool {
        std::mem::take(&mut self.rescan_requested)
    }

    fn event(received: Option<()>, sig: Sig) -> SigEvent {
        match received {
            Some(()) => SigEvent::Signal(sig),
            None => SigEvent::Error,
        }
    }
}

async fn sleep_or_forever(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use nix::sys::signal::{kill, Signal as NixSignal};
    use nix::unistd::Pid;

    #[tokio::test]
    async fn waiting_with_no_signal_times_out() {
        let mut mailbox = SignalMailbox::install().unwrap();
        let event = mailbox.wait_signal(Some(Duration::from_millis(20))).await;
        assert_eq!(event, SigEvent::Timeout);
        assert!(!mailbox.take_rescan_request());
    }

    #[tokio::test]
    async fn alarm_latches_the_rescan_request() {
        let mut mailbox = SignalMailbox::install().unwrap();
        kill(Pid::this(), NixSignal::SIGALRM).unwrap();
        loop {
            match mailbox.wait_signal(Some(Duration::from_secs(5))).await {
                SigEvent::Signal(Sig::Alarm) => break,
                // Another test's child may exit while we wait.
                SigEvent::Signal(_) => {}
                other => panic!("expected an alarm, got {other:?}"),
            }
        }
        assert!(mailbox.take_rescan_request());
        assert!(!mailbox.take_rescan_request());
    }
}
