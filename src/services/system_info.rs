//! One-shot host identification and libc system constants.

#[cfg(test)]
#[path = "system_info_test.rs"]
mod system_info_test;

use std::ffi::CStr;
use std::fs;
use std::io;
use std::path::PathBuf;

use serde::Serialize;

use crate::protocol::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum SysInfoError {
    #[error("uname: {0}")]
    Uname(io::Error),
}

impl ErrorCode for SysInfoError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Uname(_) => "E_UNAME",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct OsRelease {
    pub name: String,
    pub version: String,
    pub pretty_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemInfo {
    pub kernel_release: String,
    pub kernel_version: String,
    pub machine: String,
    pub hostname: String,
    pub os: OsRelease,
    pub cpu_cores: u32,
}

/// Read kernel identity via `uname(2)` and OS identity from the first
/// readable os-release file in `os_release_paths`.
pub fn read(os_release_paths: &[PathBuf]) -> Result<SystemInfo, SysInfoError> {
    // SAFETY: utsname is plain data; zeroed is a valid value.
    let mut uts: libc::utsname = unsafe { std::mem::zeroed() };
    // SAFETY: uts is a valid, writable utsname.
    if unsafe { libc::uname(&mut uts) } != 0 {
        return Err(SysInfoError::Uname(io::Error::last_os_error()));
    }

    let os = os_release_paths
        .iter()
        .find_map(|path| fs::read_to_string(path).ok())
        .map(|content| parse_os_release(&content))
        .unwrap_or_default();

    Ok(SystemInfo {
        kernel_release: c_field(&uts.release),
        kernel_version: c_field(&uts.version),
        machine: c_field(&uts.machine),
        hostname: c_field(&uts.nodename),
        os,
        cpu_cores: cpu_cores(),
    })
}

fn c_field(raw: &[libc::c_char]) -> String {
    // SAFETY: reinterpreting c_char as u8 of the same size and alignment.
    let bytes: &[u8] = unsafe { std::slice::from_raw_parts(raw.as_ptr().cast::<u8>(), raw.len()) };
    CStr::from_bytes_until_nul(bytes).map_or_else(|_| String::from_utf8_lossy(bytes).into_owned(), |c| c.to_string_lossy().into_owned())
}

/// `NAME`, `VERSION` and `PRETTY_NAME` from os-release content. Comments and
/// malformed lines are skipped; surrounding double quotes are stripped.
#[must_use]
pub fn parse_os_release(content: &str) -> OsRelease {
    let mut out = OsRelease::default();
    for line in content.lines() {
        if line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = strip_quotes(value).to_owned();
        match key {
            "NAME" => out.name = value,
            "VERSION" => out.version = value,
            "PRETTY_NAME" => out.pretty_name = value,
            _ => {}
        }
    }
    out
}

fn strip_quotes(value: &str) -> &str {
    value.strip_prefix('"').and_then(|v| v.strip_suffix('"')).unwrap_or(value)
}

/// Online CPU count, at least 1.
#[must_use]
pub fn cpu_cores() -> u32 {
    // SAFETY: sysconf has no memory-safety preconditions.
    let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    u32::try_from(n).unwrap_or(1).max(1)
}

/// Kernel clock ticks per second (`CLK_TCK`), 0 if unavailable.
#[must_use]
pub fn clock_ticks() -> u64 {
    // SAFETY: sysconf has no memory-safety preconditions.
    let n = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    u64::try_from(n).unwrap_or(0)
}
