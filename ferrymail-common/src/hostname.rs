//! Local hostname discovery, used as the `HELOHOST` fallback when the
//! configuration does not name one.

/// Hostname reported by the kernel, or `localhost` when it is unavailable.
pub fn local_hostname() -> String {
    let name = gethostname::gethostname();
    let name = name.to_string_lossy();
    if name.is_empty() {
        "localhost".to_string()
    } else {
        name.into_owned()
    }
}
