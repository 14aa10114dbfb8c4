//! Readers for the Linux proc filesystem.
//!
//! DESIGN
//! ======
//! `ProcFs` wraps a root directory (normally `/proc`) so every reader can be
//! exercised against a fixture tree. File access and parsing are split: the
//! `parse_*` functions take file contents and never touch the disk.

#[cfg(test)]
#[path = "procfs_test.rs"]
mod procfs_test;

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::protocol::ErrorCode;

/// Task state letters that may follow the `comm` field in `/proc/<pid>/stat`.
const TASK_STATES: &str = "RSDZTtWXxKPI";

#[derive(Debug, thiserror::Error)]
pub enum ProcError {
    #[error("read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("malformed {0}")]
    Malformed(&'static str),
}

impl ErrorCode for ProcError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "E_PROC_IO",
            Self::Malformed(_) => "E_PROC_MALFORMED",
        }
    }
}

// =============================================================================
// VALUES
// =============================================================================

/// Aggregate CPU counters from the `cpu` line of `/proc/stat`, in jiffies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuTimes {
    /// `idle + iowait`.
    pub idle: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemInfo {
    pub total_kb: u64,
    pub available_kb: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LoadAvg {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SmapsRollup {
    pub pss_kb: u64,
    /// Sum of all `Private_*` lines.
    pub uss_kb: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub mount_point: String,
    pub fs_type: String,
}

// =============================================================================
// PROC FS
// =============================================================================

#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read(&self, rel: impl AsRef<Path>) -> Result<String, ProcError> {
        let path = self.root.join(rel);
        fs::read_to_string(&path).map_err(|source| ProcError::Io { path, source })
    }

    pub fn cpu_times(&self) -> Result<CpuTimes, ProcError> {
        parse_cpu_times(&self.read("stat")?)
    }

    pub fn meminfo(&self) -> Result<MemInfo, ProcError> {
        Ok(parse_meminfo(&self.read("meminfo")?))
    }

    pub fn uptime_secs(&self) -> Result<f64, ProcError> {
        parse_uptime(&self.read("uptime")?)
    }

    pub fn loadavg(&self) -> Result<LoadAvg, ProcError> {
        parse_loadavg(&self.read("loadavg")?)
    }

    pub fn mounts(&self) -> Result<Vec<Mount>, ProcError> {
        Ok(parse_mounts(&self.read("self/mounts")?))
    }

    /// Numeric entries of the proc root, in directory order.
    pub fn pids(&self) -> Result<Vec<u32>, ProcError> {
        let entries = fs::read_dir(&self.root).map_err(|source| ProcError::Io { path: self.root.clone(), source })?;
        Ok(entries
            .flatten()
            .filter_map(|e| e.file_name().to_str().and_then(|name| name.parse::<u32>().ok()))
            .filter(|pid| *pid > 0)
            .collect())
    }

    /// `comm` of a process without the trailing newline.
    pub fn comm(&self, pid: u32) -> Result<String, ProcError> {
        let raw = self.read(format!("{pid}/comm"))?;
        Ok(raw.trim_end_matches('\n').to_owned())
    }

    /// `utime + stime` of a process, in jiffies.
    pub fn process_jiffies(&self, pid: u32) -> Result<u64, ProcError> {
        parse_stat_jiffies(&self.read(format!("{pid}/stat"))?)
    }

    /// `VmRSS` in kB, 0 when the line is absent (kernel threads, zombies).
    pub fn vm_rss_kb(&self, pid: u32) -> Result<u64, ProcError> {
        Ok(parse_kb_field(&self.read(format!("{pid}/status"))?, "VmRSS"))
    }

    pub fn smaps_rollup(&self, pid: u32) -> Result<SmapsRollup, ProcError> {
        Ok(parse_smaps_rollup(&self.read(format!("{pid}/smaps_rollup"))?))
    }

    /// First PID whose `comm` equals `name`, skipping kernel threads.
    #[must_use]
    pub fn find_pid(&self, name: &str) -> Option<u32> {
        let mut pids = self.pids().unwrap_or_default();
        pids.sort_unstable();
        pids.into_iter().find(|pid| self.comm_matches(*pid, name))
    }

    /// Whether `pid` still runs a process called `name`.
    #[must_use]
    pub fn comm_matches(&self, pid: u32, name: &str) -> bool {
        match self.comm(pid) {
            Ok(comm) => !is_kernel_thread(&comm) && comm == name,
            Err(_) => false,
        }
    }

    /// Unique process names, sorted, at most `max` of them.
    #[must_use]
    pub fn process_names(&self, max: usize) -> Vec<String> {
        let mut names = BTreeSet::new();
        for pid in self.pids().unwrap_or_default() {
            let Ok(comm) = self.comm(pid) else {
                continue;
            };
            if comm.is_empty() || is_kernel_thread(&comm) {
                continue;
            }
            names.insert(comm);
        }
        names.into_iter().take(max).collect()
    }
}

fn is_kernel_thread(comm: &str) -> bool {
    comm.starts_with('[')
}

// =============================================================================
// PARSERS
// =============================================================================

/// Parse the aggregate `cpu` line (first line) of `/proc/stat`.
pub fn parse_cpu_times(content: &str) -> Result<CpuTimes, ProcError> {
    let line = content.lines().next().ok_or(ProcError::Malformed("stat"))?;
    let mut fields = line.split_whitespace();
    if fields.next() != Some("cpu") {
        return Err(ProcError::Malformed("stat"));
    }
    let values: Vec<u64> = fields.take(8).map(str::parse).collect::<Result<_, _>>().map_err(|_| ProcError::Malformed("stat"))?;
    let [user, nice, system, idle, iowait, irq, softirq, steal] = values[..] else {
        return Err(ProcError::Malformed("stat"));
    };
    Ok(CpuTimes { idle: idle + iowait, total: user + nice + system + idle + iowait + irq + softirq + steal })
}

pub fn parse_meminfo(content: &str) -> MemInfo {
    MemInfo { total_kb: parse_kb_field(content, "MemTotal"), available_kb: parse_kb_field(content, "MemAvailable") }
}

/// Value of a `Key:   1234 kB` line, 0 when absent or unparseable.
pub fn parse_kb_field(content: &str, key: &str) -> u64 {
    content
        .lines()
        .find_map(|line| {
            let rest = line.strip_prefix(key)?.strip_prefix(':')?;
            rest.split_whitespace().next()?.parse().ok()
        })
        .unwrap_or(0)
}

pub fn parse_uptime(content: &str) -> Result<f64, ProcError> {
    content
        .split_whitespace()
        .next()
        .and_then(|v| v.parse().ok())
        .ok_or(ProcError::Malformed("uptime"))
}

pub fn parse_loadavg(content: &str) -> Result<LoadAvg, ProcError> {
    let mut fields = content.split_whitespace().map(str::parse::<f64>);
    match (fields.next(), fields.next(), fields.next()) {
        (Some(Ok(one)), Some(Ok(five)), Some(Ok(fifteen))) => Ok(LoadAvg { one, five, fifteen }),
        _ => Err(ProcError::Malformed("loadavg")),
    }
}

/// `utime + stime` from a `/proc/<pid>/stat` line.
///
/// `comm` may itself contain spaces and `)`, so the field boundary is the
/// last `) X ` where `X` is a task state letter. Fields after `comm` are
/// numeric and never contain `)`.
pub fn parse_stat_jiffies(line: &str) -> Result<u64, ProcError> {
    let open = line.find('(').ok_or(ProcError::Malformed("pid stat"))?;
    let bytes = line.as_bytes();
    let close = (open + 1..bytes.len().saturating_sub(3))
        .rev()
        .find(|&i| {
            bytes[i] == b')' && bytes[i + 1] == b' ' && bytes[i + 3] == b' ' && TASK_STATES.as_bytes().contains(&bytes[i + 2])
        })
        .ok_or(ProcError::Malformed("pid stat"))?;

    // state ppid pgrp session tty_nr tpgid flags minflt cminflt majflt cmajflt utime stime
    let fields: Vec<&str> = line[close + 2..].split_whitespace().take(13).collect();
    let [_, _, _, _, _, _, _, _, _, _, _, utime, stime] = fields[..] else {
        return Err(ProcError::Malformed("pid stat"));
    };
    let utime: u64 = utime.parse().map_err(|_| ProcError::Malformed("pid stat"))?;
    let stime: u64 = stime.parse().map_err(|_| ProcError::Malformed("pid stat"))?;
    Ok(utime + stime)
}

pub fn parse_smaps_rollup(content: &str) -> SmapsRollup {
    let mut out = SmapsRollup::default();
    for line in content.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let Some(value) = rest.split_whitespace().next().and_then(|v| v.parse::<u64>().ok()) else {
            continue;
        };
        match key {
            "Pss" => out.pss_kb = value,
            "Private_Clean" | "Private_Dirty" | "Private_Hugetlb" | "Private_Shmem" => out.uss_kb += value,
            _ => {}
        }
    }
    out
}

/// Mount point and fs type per line of a mounts table. Octal escapes
/// (`\040` for space) in the mount point are decoded.
pub fn parse_mounts(content: &str) -> Vec<Mount> {
    content
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let _device = fields.next()?;
            let mount_point = unescape_mount(fields.next()?);
            let fs_type = fields.next()?.to_owned();
            Some(Mount { mount_point, fs_type })
        })
        .collect()
}

fn unescape_mount(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(pos) = rest.find('\\') {
        out.push_str(&rest[..pos]);
        let code = rest.get(pos + 1..pos + 4).and_then(|oct| u8::from_str_radix(oct, 8).ok());
        if let Some(byte) = code {
            out.push(char::from(byte));
            rest = &rest[pos + 4..];
        } else {
            out.push('\\');
            rest = &rest[pos + 1..];
        }
    }
    out.push_str(rest);
    out
}
