//! One-shot filesystem usage for an allowlist of mount points.
//!
//! Values follow df(1): `used = total - free` where free includes reserved
//! blocks, while `available` excludes them. Paths that cannot be queried are
//! skipped. The filesystem type is the longest mount point containing the
//! path, `unknown` when none does.

#[cfg(test)]
#[path = "storage_test.rs"]
mod storage_test;

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::MAX_STORAGE_PATHS;
use crate::protocol::{ErrorCode, StorageEntry};
use crate::services::procfs::{Mount, ProcFs};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("path contains a NUL byte: {0}")]
    InvalidPath(PathBuf),
    #[error("statvfs {path}: {source}")]
    Statvfs { path: PathBuf, source: io::Error },
}

impl ErrorCode for StorageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidPath(_) => "E_STORAGE_PATH",
            Self::Statvfs { .. } => "E_STATVFS",
        }
    }
}

/// Block counts for one filesystem, already scaled to bytes per block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsUsage {
    pub block_size: u64,
    pub blocks: u64,
    pub blocks_free: u64,
    pub blocks_available: u64,
}

impl FsUsage {
    #[must_use]
    pub fn total_kb(&self) -> u64 {
        self.blocks.saturating_mul(self.block_size) / 1024
    }

    #[must_use]
    pub fn used_kb(&self) -> u64 {
        self.blocks.saturating_sub(self.blocks_free).saturating_mul(self.block_size) / 1024
    }

    #[must_use]
    pub fn available_kb(&self) -> u64 {
        self.blocks_available.saturating_mul(self.block_size) / 1024
    }
}

/// `statvfs(2)` for `path`. `f_frsize` is preferred; some filesystems report
/// it as 0, in which case `f_bsize` is used.
#[allow(clippy::useless_conversion, clippy::unnecessary_cast)]
pub fn statvfs(path: &Path) -> Result<FsUsage, StorageError> {
    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| StorageError::InvalidPath(path.to_path_buf()))?;
    // SAFETY: zeroed is a valid bit pattern for the plain-data statvfs struct.
    let mut vfs: libc::statvfs = unsafe { std::mem::zeroed() };
    // SAFETY: c_path is NUL-terminated and vfs is a valid, writable statvfs.
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut vfs) };
    if rc != 0 {
        return Err(StorageError::Statvfs { path: path.to_path_buf(), source: io::Error::last_os_error() });
    }

    let (frsize, bsize) = (vfs.f_frsize as u64, vfs.f_bsize as u64);
    Ok(FsUsage {
        block_size: if frsize == 0 { bsize } else { frsize },
        blocks: vfs.f_blocks as u64,
        blocks_free: vfs.f_bfree as u64,
        blocks_available: vfs.f_bavail as u64,
    })
}

/// Filesystem type of the longest mount point that contains `path`.
#[must_use]
pub fn fs_type_for(path: &Path, mounts: &[Mount]) -> Option<String> {
    mounts
        .iter()
        .filter(|m| path.starts_with(&m.mount_point))
        .max_by_key(|m| m.mount_point.len())
        .map(|m| m.fs_type.clone())
}

/// Usage for each configured path, at most `MAX_STORAGE_PATHS` entries.
#[must_use]
pub fn collect(paths: &[PathBuf], procfs: &ProcFs) -> Vec<StorageEntry> {
    let mounts = procfs.mounts().unwrap_or_else(|e| {
        debug!(error = %e, "storage: mount table unavailable");
        Vec::new()
    });

    paths
        .iter()
        .filter_map(|path| match statvfs(path) {
            Ok(usage) => Some(StorageEntry {
                path: path.to_string_lossy().into_owned(),
                fs: fs_type_for(path, &mounts).unwrap_or_else(|| "unknown".into()),
                total_kb: usage.total_kb(),
                used_kb: usage.used_kb(),
                available_kb: usage.available_kb(),
            }),
            Err(e) => {
                debug!(error = %e, code = e.error_code(), "storage: skipping path");
                None
            }
        })
        .take(MAX_STORAGE_PATHS)
        .collect()
}
