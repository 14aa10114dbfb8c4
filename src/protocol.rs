//! Wire protocol for the `sysstats` WebSocket.
//!
//! DESIGN
//! ======
//! Outbound traffic is one periodic snapshot object plus two one-shot
//! replies (`processes`, `storage`). Inbound traffic is a tiny JSON command
//! object. All size limits live here so the route layer only moves strings.
//!
//! LIMITS
//! ======
//! - Inbound messages of `MAX_INBOUND_BYTES` or more are ignored unparsed.
//! - A snapshot larger than `MAX_SNAPSHOT_BYTES` is dropped, never cut.
//! - One-shot lists drop tail entries until they fit `MAX_LIST_BYTES`.

#[cfg(test)]
#[path = "protocol_test.rs"]
mod protocol_test;

use serde::Serialize;
use serde_json::Value;

pub const MAX_INBOUND_BYTES: usize = 128;
pub const MAX_SNAPSHOT_BYTES: usize = 1024;
pub const MAX_LIST_BYTES: usize = 8192;
pub const MAX_PROCESS_COUNT: usize = 256;
pub const MAX_PROC_NAME_BYTES: usize = 63;

// =============================================================================
// ERROR CODES
// =============================================================================

/// Errors that carry a stable, grepable code for logs.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    #[error("message of {0} bytes exceeds inbound limit")]
    TooLarge(usize),
    #[error("empty message")]
    Empty,
    #[error("invalid json: {0}")]
    InvalidJson(String),
    #[error("message is not a json object")]
    NotObject,
    #[error("no recognized command")]
    UnknownCommand,
    #[error("snapshot of {0} bytes exceeds {MAX_SNAPSHOT_BYTES}")]
    SnapshotTooLarge(usize),
    #[error("serialize: {0}")]
    Serialize(String),
}

impl ErrorCode for ProtocolError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::TooLarge(_) => "E_MSG_TOO_LARGE",
            Self::Empty => "E_MSG_EMPTY",
            Self::InvalidJson(_) => "E_INVALID_JSON",
            Self::NotObject => "E_NOT_OBJECT",
            Self::UnknownCommand => "E_UNKNOWN_COMMAND",
            Self::SnapshotTooLarge(_) => "E_SNAPSHOT_TOO_LARGE",
            Self::Serialize(_) => "E_SERIALIZE",
        }
    }
}

// =============================================================================
// INBOUND
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ListProcesses,
    Storage,
    Monitor(String),
    StopMonitor,
}

/// Parse one inbound text message.
///
/// Precedence follows key checks in order: `list_processes: true`, then
/// `storage: true`, then a string `monitor`. Other keys are ignored.
pub fn parse_command(text: &str) -> Result<Command, ProtocolError> {
    if text.is_empty() {
        return Err(ProtocolError::Empty);
    }
    if text.len() >= MAX_INBOUND_BYTES {
        return Err(ProtocolError::TooLarge(text.len()));
    }
    let value: Value = serde_json::from_str(text).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;
    let Value::Object(map) = value else {
        return Err(ProtocolError::NotObject);
    };

    if map.get("list_processes") == Some(&Value::Bool(true)) {
        return Ok(Command::ListProcesses);
    }
    if map.get("storage") == Some(&Value::Bool(true)) {
        return Ok(Command::Storage);
    }
    match map.get("monitor") {
        Some(Value::String(name)) if name.is_empty() => Ok(Command::StopMonitor),
        Some(Value::String(name)) => Ok(Command::Monitor(truncate_name(name))),
        _ => Err(ProtocolError::UnknownCommand),
    }
}

/// Cut a process name to `MAX_PROC_NAME_BYTES` on a char boundary.
#[must_use]
pub fn truncate_name(name: &str) -> String {
    if name.len() <= MAX_PROC_NAME_BYTES {
        return name.to_owned();
    }
    let mut end = MAX_PROC_NAME_BYTES;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_owned()
}

// =============================================================================
// SNAPSHOT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClientCounts {
    pub connected: usize,
    pub max: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcStats {
    pub name: String,
    pub cpu: f64,
    pub rss_kb: u64,
    pub pss_kb: u64,
    pub uss_kb: u64,
    pub pid: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcNotFound {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub message: String,
}

impl ProcNotFound {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self { kind: "process_not_found", message: format!("Process '{name}' not found") }
    }
}

/// Outcome of sampling a monitored process for one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorReport {
    Found(ProcStats),
    NotFound(ProcNotFound),
}

/// One periodic stats message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub ts: u64,
    pub mono_ms: u64,
    pub delta_ms: u64,
    pub cpu: f64,
    pub cpu_cores: u32,
    pub mem_total_kb: u64,
    pub mem_available_kb: u64,
    pub uptime_s: u64,
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
    pub clients: ClientCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proc: Option<ProcStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProcNotFound>,
}

impl Snapshot {
    /// Attach the monitored-process outcome, replacing any previous one.
    #[must_use]
    pub fn with_monitor(mut self, report: Option<MonitorReport>) -> Self {
        self.proc = None;
        self.error = None;
        match report {
            Some(MonitorReport::Found(stats)) => self.proc = Some(stats),
            Some(MonitorReport::NotFound(err)) => self.error = Some(err),
            None => {}
        }
        self
    }
}

/// Serialize a snapshot, refusing anything over `MAX_SNAPSHOT_BYTES`.
pub fn encode_snapshot(snapshot: &Snapshot) -> Result<String, ProtocolError> {
    let json = to_json(snapshot)?;
    if json.len() > MAX_SNAPSHOT_BYTES {
        return Err(ProtocolError::SnapshotTooLarge(json.len()));
    }
    Ok(json)
}

/// Round to two decimals, the precision every float on the wire carries.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// =============================================================================
// ONE-SHOT LISTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageEntry {
    pub path: String,
    pub fs: String,
    pub total_kb: u64,
    pub used_kb: u64,
    pub available_kb: u64,
}

/// An encoded one-shot reply and whether entries were dropped to fit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListReply {
    pub json: String,
    pub truncated: bool,
}

/// `{"processes":[...]}` with at most `MAX_PROCESS_COUNT` names.
pub fn encode_process_list(names: &[String]) -> Result<ListReply, ProtocolError> {
    encode_capped("processes", names, MAX_PROCESS_COUNT)
}

/// `{"storage":[...]}`.
pub fn encode_storage(entries: &[StorageEntry]) -> Result<ListReply, ProtocolError> {
    encode_capped("storage", entries, usize::MAX)
}

/// Encode `{"<key>":[items...]}`, dropping tail items until the result fits
/// `MAX_LIST_BYTES`.
fn encode_capped<T: Serialize>(key: &str, items: &[T], max_items: usize) -> Result<ListReply, ProtocolError> {
    let key_json = to_json(key)?;
    // `{` key `:[` items `]}`
    let mut len = key_json.len() + 5;
    let mut parts = Vec::new();
    let mut truncated = items.len() > max_items;

    for item in items.iter().take(max_items) {
        let part = to_json(item)?;
        let extra = part.len() + usize::from(!parts.is_empty());
        if len + extra > MAX_LIST_BYTES {
            truncated = true;
            break;
        }
        len += extra;
        parts.push(part);
    }

    let json = format!("{{{key_json}:[{}]}}", parts.join(","));
    Ok(ListReply { json, truncated })
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, ProtocolError> {
    serde_json::to_string(value).map_err(|e| ProtocolError::Serialize(e.to_string()))
}
