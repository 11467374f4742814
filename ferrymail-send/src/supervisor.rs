//! Supervised execution of one protocol helper.
//!
//! The helper contract: argv is the helper path alone; fd 0 carries the
//! remote's options blob terminated by a blank line; fd 3 is the message
//! file, opened read-only; `HELOHOST` names the identity to present. The
//! helper's exit status classifies the attempt (see [`crate::errcodes`]).

use std::{
    fs::File,
    io::{self, Write},
    os::unix::{io::AsRawFd, process::CommandExt},
    process::{Child, Command, ExitStatus, Stdio},
    time::Duration,
};

use ferrymail_common::{delivery, internal};
use ferrymail_spool::{QueuedMessage, Spool};
use nix::{
    sys::signal::{self, Signal},
    unistd::Pid,
};

use crate::{
    errcodes,
    settings::Remote,
    signals::{Sig, SigEvent, SignalMailbox},
};

/// Tri-state result of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The helper exited 0; the message is delivered.
    Success,
    /// The helper reported a permanently failing code; bounce the message.
    Permfail,
    /// Anything else; the message stays queued for another attempt.
    Tempfail,
}

/// Run one delivery attempt for `message` against `remote`.
pub(crate) async fn send_one(
    spool: &Spool,
    mailbox: &mut SignalMailbox,
    message: &QueuedMessage,
    remote: &Remote,
    helohost: &str,
    sendtimeout: Duration,
) -> Outcome {
    let file = match File::open(spool.message_path(&message.filename)) {
        Ok(file) => file,
        Err(err) => {
            delivery!(level = ERROR, "Can't open file '{}': {err}", message.filename);
            return Outcome::Tempfail;
        }
    };

    delivery!(
        "Starting delivery: protocol: {} host: {} file: {}",
        remote.proto,
        remote.host,
        message.filename
    );

    let mut command = Command::new(&remote.program);
    command.stdin(Stdio::piped()).env("HELOHOST", helohost);
    let message_fd = file.as_raw_fd();
    // Runs between fork and exec; the helper reads the message body on fd 3.
    // dup2 clears the close-on-exec flag on the target, but is a no-op when
    // the file already sits on fd 3, so clear the flag by hand there.
    unsafe {
        command.pre_exec(move || {
            if message_fd == 3 {
                let flags = libc::fcntl(3, libc::F_GETFD);
                if flags == -1 || libc::fcntl(3, libc::F_SETFD, flags & !libc::FD_CLOEXEC) == -1 {
                    return Err(io::Error::last_os_error());
                }
            } else if libc::dup2(message_fd, 3) == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            delivery!(level = ERROR, "Could not start {}: {err}", remote.program.display());
            return Outcome::Tempfail;
        }
    };
    drop(file);

    // Best effort; the helper decides how much of the blob it needs.
    if let Some(mut stdin) = child.stdin.take() {
        if stdin.write_all(remote.options.as_bytes()).is_err() {
            delivery!(level = WARN, "Writing options to protocol failed");
        }
    }

    catch_sender(mailbox, &mut child, sendtimeout).await
}

/// Wait for the helper under the send timeout and interpret its exit status.
async fn catch_sender(
    mailbox: &mut SignalMailbox,
    child: &mut Child,
    sendtimeout: Duration,
) -> Outcome {
    loop {
        match mailbox.wait_signal(Some(sendtimeout)).await {
            SigEvent::Timeout => {
                delivery!(level = WARN, "Sending timed out, killing protocol");
                let pid = Pid::from_raw(child.id() as libc::pid_t);
                if let Err(errno) = signal::kill(pid, Signal::SIGTERM) {
                    delivery!(level = ERROR, "Could not signal the protocol helper: {errno}");
                }
                // Consume the child-exit signal raised by the kill, then reap.
                mailbox.wait_signal(None).await;
                if let Err(err) = child.wait() {
                    delivery!(
                        level = ERROR,
                        "Error catching the child process return value: {err}"
                    );
                }
                return Outcome::Tempfail;
            }
            SigEvent::Signal(Sig::Child) => match child.try_wait() {
                Ok(Some(status)) => return interpret_status(status),
                // Some other process's child; keep waiting for ours.
                Ok(None) => {}
                Err(err) => {
                    delivery!(
                        level = ERROR,
                        "Error catching the child process return value: {err}"
                    );
                    return Outcome::Tempfail;
                }
            },
            SigEvent::Signal(_) => {}
            SigEvent::Error => {
                internal!(level = ERROR, "Error waiting for the child signal");
                return Outcome::Tempfail;
            }
        }
    }
}

fn interpret_status(status: ExitStatus) -> Outcome {
    match status.code() {
        Some(0) => {
            delivery!("Sent file.");
            Outcome::Success
        }
        Some(code) => {
            delivery!(level = WARN, "Sending failed: {}", errcodes::errorstr(code));
            if errcodes::is_permanent(code) {
                Outcome::Permfail
            } else {
                Outcome::Tempfail
            }
        }
        None => {
            delivery!(level = WARN, "Sending process crashed or was killed.");
            Outcome::Tempfail
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::os::unix::process::ExitStatusExt;

    fn exited(code: i32) -> ExitStatus {
        ExitStatus::from_raw(code << 8)
    }

    #[test]
    fn exit_zero_is_success() {
        assert_eq!(interpret_status(exited(0)), Outcome::Success);
    }

    #[test]
    fn permanent_flagged_codes_are_permfail() {
        assert_eq!(
            interpret_status(exited(errcodes::ERR_MSG_REFUSED)),
            Outcome::Permfail
        );
        assert_eq!(interpret_status(exited(31)), Outcome::Permfail);
    }

    #[test]
    fn unflagged_codes_are_tempfail() {
        assert_eq!(
            interpret_status(exited(errcodes::ERR_CONN_REFUSED)),
            Outcome::Tempfail
        );
        assert_eq!(interpret_status(exited(75)), Outcome::Tempfail);
    }

    #[test]
    fn a_signaled_helper_is_tempfail() {
        let status = ExitStatus::from_raw(libc::SIGKILL);
        assert_eq!(interpret_status(status), Outcome::Tempfail);
    }
}
