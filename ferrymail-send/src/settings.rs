//! Per-sweep configuration snapshot and the remote-host list.

use std::path::{Path, PathBuf};

use ferrymail_common::{config::ConfigDir, hostname::local_hostname};
use thiserror::Error;

/// Protocol helper used when a remotes line names none.
pub const DEFAULT_PROTO: &str = "smtp";

const fn default_pausetime() -> u64 {
    60
}

const fn default_maxpause() -> u64 {
    24 * 60 * 60
}

const fn default_sendtimeout() -> u64 {
    60 * 60
}

const fn default_queuelifetime() -> u64 {
    7 * 24 * 60 * 60
}

/// Configuration failures that abort the current sweep.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The remotes list resolved to nothing deliverable.
    #[error("No remote hosts listed for delivery")]
    NoRemotes,
}

/// One upstream smarthost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    /// Opaque host string, passed through to the helper.
    pub host: String,
    /// Helper selector; [`DEFAULT_PROTO`] when the line names none.
    pub proto: String,
    /// Resolved helper executable.
    pub program: PathBuf,
    /// Blob fed to the helper on stdin: `host=<host>` plus the configured
    /// options, one per line, terminated by a blank line.
    pub options: String,
}

impl Remote {
    /// Parse one remotes line, shell-word split into `host [proto [opt …]]`.
    /// A `--` prefix on an option is stripped. Returns `None` for lines that
    /// do not split or carry no host.
    pub fn parse(line: &str, protocol_dir: &Path) -> Option<Self> {
        let mut words = shlex::split(line)?.into_iter();
        let host = words.next()?;
        let proto = words.next().unwrap_or_else(|| DEFAULT_PROTO.to_string());
        let mut options = format!("host={host}\n");
        for word in words {
            let option = word.strip_prefix("--").unwrap_or(&word);
            options.push_str(option);
            options.push('\n');
        }
        options.push('\n');
        let program = protocol_dir.join(&proto);
        Some(Self {
            host,
            proto,
            program,
            options,
        })
    }
}

/// Scalar delivery settings, re-read at the start of every sweep.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Value exported to every helper as `HELOHOST`.
    pub helohost: String,
    /// Backoff floor in seconds; 0 selects one-shot mode.
    pub pausetime: u64,
    /// Backoff ceiling in seconds.
    pub maxpause: u64,
    /// Per-child wall-clock limit in seconds.
    pub sendtimeout: u64,
    /// Tempfailed messages older than this many seconds are bounced.
    pub queuelifetime: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            helohost: local_hostname(),
            pausetime: default_pausetime(),
            maxpause: default_maxpause(),
            sendtimeout: default_sendtimeout(),
            queuelifetime: default_queuelifetime(),
        }
    }
}

impl Settings {
    /// Load a fresh snapshot; missing or unparseable keys take defaults.
    pub fn load(config: &ConfigDir) -> Self {
        Self {
            helohost: config.read("helohost").unwrap_or_else(local_hostname),
            pausetime: config.read_int("pausetime").unwrap_or_else(default_pausetime),
            maxpause: config.read_int("maxpause").unwrap_or_else(default_maxpause),
            sendtimeout: config
                .read_int("sendtimeout")
                .unwrap_or_else(default_sendtimeout),
            queuelifetime: config
                .read_int("queuelifetime")
                .unwrap_or_else(default_queuelifetime),
        }
    }
}

/// Load the ordered remote list. Comment lines and lines that do not parse
/// are skipped.
///
/// # Errors
/// When no usable remote is configured; the sweep must not run.
pub fn load_remotes(config: &ConfigDir, protocol_dir: &Path) -> Result<Vec<Remote>, ConfigError> {
    let mut remotes = Vec::new();
    for line in config.read_list("remotes") {
        if line.starts_with('#') {
            continue;
        }
        if let Some(remote) = Remote::parse(&line, protocol_dir) {
            remotes.push(remote);
        }
    }
    if remotes.is_empty() {
        return Err(ConfigError::NoRemotes);
    }
    Ok(remotes)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use tempfile::TempDir;

    fn config_with(entries: &[(&str, &str)]) -> (TempDir, ConfigDir) {
        let dir = TempDir::new().unwrap();
        for (key, value) in entries {
            fs::write(dir.path().join(key), value).unwrap();
        }
        let config = ConfigDir::new(dir.path());
        (dir, config)
    }

    #[test]
    fn remote_defaults_to_smtp() {
        let remote = Remote::parse("mx.example.com", Path::new("/usr/libexec/ferrymail")).unwrap();
        assert_eq!(remote.proto, "smtp");
        assert_eq!(
            remote.program,
            Path::new("/usr/libexec/ferrymail/smtp")
        );
        assert_eq!(remote.options, "host=mx.example.com\n\n");
    }

    #[test]
    fn remote_strips_option_prefixes() {
        let remote = Remote::parse(
            "mx.example.com qmqp --port=628 user=alice",
            Path::new("/helpers"),
        )
        .unwrap();
        assert_eq!(remote.proto, "qmqp");
        assert_eq!(remote.program, Path::new("/helpers/qmqp"));
        assert_eq!(
            remote.options,
            "host=mx.example.com\nport=628\nuser=alice\n\n"
        );
    }

    #[test]
    fn remote_keeps_quoted_words_whole() {
        let remote =
            Remote::parse("mx.example.com smtp \"pass=two words\"", Path::new("/h")).unwrap();
        assert_eq!(remote.options, "host=mx.example.com\npass=two words\n\n");
    }

    #[test]
    fn remotes_skip_comments_and_keep_order() {
        let (_dir, config) = config_with(&[(
            "remotes",
            "# primary first\nmx1.example.com\nmx2.example.com smtp --port=2525\n",
        )]);
        let remotes = load_remotes(&config, Path::new("/h")).unwrap();
        assert_eq!(remotes.len(), 2);
        assert_eq!(remotes[0].host, "mx1.example.com");
        assert_eq!(remotes[1].host, "mx2.example.com");
    }

    #[test]
    fn empty_remotes_is_an_error() {
        let (_dir, config) = config_with(&[("remotes", "# nothing here\n")]);
        assert!(matches!(
            load_remotes(&config, Path::new("/h")),
            Err(ConfigError::NoRemotes)
        ));
    }

    #[test]
    fn settings_take_defaults_for_missing_keys() {
        let (_dir, config) = config_with(&[("pausetime", "5\n")]);
        let settings = Settings::load(&config);
        assert_eq!(settings.pausetime, 5);
        assert_eq!(settings.maxpause, 86400);
        assert_eq!(settings.sendtimeout, 3600);
        assert_eq!(settings.queuelifetime, 604_800);
        assert!(!settings.helohost.is_empty());
    }

    #[test]
    fn configured_helohost_wins_over_discovery() {
        let (_dir, config) = config_with(&[("helohost", "relay.example.org\n")]);
        assert_eq!(Settings::load(&config).helohost, "relay.example.org");
    }
}
