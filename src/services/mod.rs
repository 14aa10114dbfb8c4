//! Device-side services used by the websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own all reads of the host (`/proc`, `statvfs`, `uname`,
//! the filesystem) so route handlers stay focused on protocol translation.
//! Everything except `sampler` is synchronous and cheap enough to call from
//! a handler directly.

pub mod cgi;
pub mod process;
pub mod procfs;
pub mod sampler;
pub mod storage;
pub mod system_info;
