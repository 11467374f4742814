//! Key-per-file configuration store.
//!
//! Every setting lives in its own file under a configuration directory; the
//! delivery engine re-reads the directory at the start of each sweep, so
//! edits take effect without restarting the daemon.

use std::{fs, path::PathBuf};

use crate::internal;

/// Handle on a configuration directory.
#[derive(Debug, Clone)]
pub struct ConfigDir {
    root: PathBuf,
}

impl ConfigDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// First line of `<root>/<key>`, trimmed.
    ///
    /// Returns `None` when the file is missing, unreadable, or empty, so the
    /// caller's default applies.
    pub fn read(&self, key: &str) -> Option<String> {
        let text = fs::read_to_string(self.root.join(key)).ok()?;
        let line = text.lines().next()?.trim();
        if line.is_empty() {
            None
        } else {
            Some(line.to_string())
        }
    }

    /// [`read`](Self::read), parsed as a non-negative integer. An unparseable
    /// value is logged and treated as missing.
    pub fn read_int(&self, key: &str) -> Option<u64> {
        let raw = self.read(key)?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                internal!(level = WARN, "Ignoring unparseable value for {key}: {raw}");
                None
            }
        }
    }

    /// All non-empty lines of `<root>/<key>`, trailing whitespace removed.
    /// A missing file reads as an empty list.
    pub fn read_list(&self, key: &str) -> Vec<String> {
        fs::read_to_string(self.root.join(key)).map_or_else(
            |_| Vec::new(),
            |text| {
                text.lines()
                    .map(|line| line.trim_end().to_string())
                    .filter(|line| !line.is_empty())
                    .collect()
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn read_returns_first_line_trimmed() {
        let (_dir, config) = config_with(&[("helohost", "relay.example.org\nignored\n")]);
        assert_eq!(config.read("helohost").as_deref(), Some("relay.example.org"));
    }

    #[test]
    fn read_missing_or_empty_is_none() {
        let (_dir, config) = config_with(&[("blank", "\n")]);
        assert_eq!(config.read("absent"), None);
        assert_eq!(config.read("blank"), None);
    }

    #[test]
    fn read_int_parses_and_rejects_garbage() {
        let (_dir, config) = config_with(&[("pausetime", "120\n"), ("maxpause", "soon\n")]);
        assert_eq!(config.read_int("pausetime"), Some(120));
        assert_eq!(config.read_int("maxpause"), None);
        assert_eq!(config.read_int("absent"), None);
    }

    #[test]
    fn read_list_skips_blank_lines() {
        let (_dir, config) = config_with(&[("remotes", "one\n\ntwo  \n# three\n")]);
        assert_eq!(config.read_list("remotes"), vec!["one", "two", "# three"]);
        assert!(config.read_list("absent").is_empty());
    }
}
