//! Service configuration from environment variables.
//!
//! DESIGN
//! ======
//! Every knob has a typed default so the service starts with no environment
//! at all on a device. Unparseable values fall back to the default rather
//! than aborting startup; the effective values are logged once in `main`.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PORT: u16 = 9000;
const DEFAULT_SAMPLE_MS: u64 = 500;
const DEFAULT_SEND_MS: u64 = 500;
const DEFAULT_MAX_CLIENTS: usize = 10;
const DEFAULT_PROC_ROOT: &str = "/proc";

const DEFAULT_STORAGE_PATHS: &[&str] = &["/", "/mnt/flash", "/usr/lib/persistent", "/var/lib", "/var/cache"];
const DEFAULT_CGI_PATHS: &[&str] = &["/usr/html/axis-cgi", "/usr/html/onvif-cgi", "/usr/bin", "/usr/sbin"];
const DEFAULT_OS_RELEASE_PATHS: &[&str] = &["/etc/os-release", "/usr/lib/os-release"];

/// Upper bound on reported storage entries regardless of configuration.
pub const MAX_STORAGE_PATHS: usize = 8;

/// Smallest accepted sampling or send interval.
const MIN_INTERVAL_MS: u64 = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub sample_interval: Duration,
    pub send_interval: Duration,
    pub max_clients: usize,
    /// Root of the proc filesystem. Overridable so tests can point at fixtures.
    pub proc_root: PathBuf,
    pub storage_paths: Vec<PathBuf>,
    pub cgi_paths: Vec<PathBuf>,
    pub os_release_paths: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            sample_interval: Duration::from_millis(DEFAULT_SAMPLE_MS),
            send_interval: Duration::from_millis(DEFAULT_SEND_MS),
            max_clients: DEFAULT_MAX_CLIENTS,
            proc_root: PathBuf::from(DEFAULT_PROC_ROOT),
            storage_paths: paths(DEFAULT_STORAGE_PATHS),
            cgi_paths: paths(DEFAULT_CGI_PATHS),
            os_release_paths: paths(DEFAULT_OS_RELEASE_PATHS),
        }
    }
}

impl Config {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. `from_env` is this with
    /// `std::env::var`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let mut storage_paths = list_or(lookup("STORAGE_PATHS"), defaults.storage_paths);
        storage_paths.truncate(MAX_STORAGE_PATHS);

        Self {
            port: parse_or(lookup("PORT"), DEFAULT_PORT),
            sample_interval: interval_or(lookup("STATS_SAMPLE_MS"), DEFAULT_SAMPLE_MS),
            send_interval: interval_or(lookup("STATS_SEND_MS"), DEFAULT_SEND_MS),
            max_clients: parse_or(lookup("MAX_WS_CLIENTS"), DEFAULT_MAX_CLIENTS).max(1),
            proc_root: lookup("PROC_ROOT").filter(|v| !v.trim().is_empty()).map_or(defaults.proc_root, PathBuf::from),
            storage_paths,
            cgi_paths: list_or(lookup("CGI_PATHS"), defaults.cgi_paths),
            os_release_paths: list_or(lookup("OS_RELEASE_PATHS"), defaults.os_release_paths),
        }
    }
}

/// Parse a raw value, falling back to `default` when unset or invalid.
fn parse_or<T>(raw: Option<String>, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    raw.and_then(|v| v.trim().parse::<T>().ok()).unwrap_or(default)
}

fn interval_or(raw: Option<String>, default_ms: u64) -> Duration {
    Duration::from_millis(parse_or(raw, default_ms).max(MIN_INTERVAL_MS))
}

/// Comma-separated path list; an unset or all-blank value keeps the default.
fn list_or(raw: Option<String>, default: Vec<PathBuf>) -> Vec<PathBuf> {
    let Some(raw) = raw else {
        return default;
    };
    let parsed: Vec<PathBuf> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect();
    if parsed.is_empty() { default } else { parsed }
}

fn paths(raw: &[&str]) -> Vec<PathBuf> {
    raw.iter().map(PathBuf::from).collect()
}
