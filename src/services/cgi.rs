//! Discovery of CGI executables on the device.
//!
//! Scans each allowlisted directory one level deep for regular files whose
//! name ends in `.cgi` and that carry the owner execute bit. Hidden entries
//! are skipped. Results are sorted within each directory so the listing is
//! stable across calls.

#[cfg(test)]
#[path = "cgi_test.rs"]
mod cgi_test;

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Upper bound on reported CGI paths.
pub const MAX_CGI_ENTRIES: usize = 256;

const OWNER_EXEC: u32 = 0o100;

#[must_use]
pub fn collect(dirs: &[PathBuf], max_entries: usize) -> Vec<String> {
    let mut out = Vec::new();
    for dir in dirs {
        if out.len() >= max_entries {
            break;
        }
        let Ok(entries) = fs::read_dir(dir) else {
            debug!(dir = %dir.display(), "cgi: directory not readable");
            continue;
        };
        let mut found: Vec<String> = entries
            .flatten()
            .filter(|e| is_executable_cgi(&e.path()))
            .map(|e| e.path().to_string_lossy().into_owned())
            .collect();
        found.sort();
        let room = max_entries - out.len();
        out.extend(found.into_iter().take(room));
    }
    out
}

fn is_executable_cgi(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with('.') || !name.ends_with(".cgi") {
        return false;
    }
    // Follows symlinks, like the CGI dispatcher does.
    fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & OWNER_EXEC != 0)
}
