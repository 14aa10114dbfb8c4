//! WebSocket handler for the `sysstats` stream.
//!
//! DESIGN
//! ======
//! On upgrade, a connection slot is claimed and the socket enters a
//! `select!` loop:
//! - send-interval tick → build a snapshot from the latest shared sample plus
//!   this session's monitored process, send it
//! - inbound text → parse a command, reply for one-shot requests, or update
//!   the session's monitor
//!
//! LIFECYCLE
//! =========
//! 1. Reserve a pending slot; reject with 503 when the pool is full
//! 2. Upgrade → slot becomes connected (first client starts the sampler)
//! 3. Immediate snapshot, then one per send interval
//! 4. Close or send failure → slot released (last client stops the sampler)

#[cfg(test)]
#[path = "ws_test.rs"]
mod ws_test;

use std::time::Duration;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::time::{MissedTickBehavior, timeout};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::protocol::{self, Command, ErrorCode, MAX_PROCESS_COUNT, ProtocolError};
use crate::services::process::ProcessMonitor;
use crate::services::storage;
use crate::state::{AppState, SlotGuard};

pub const PROTOCOL: &str = "sysstats";

/// How long a new client waits for the sampler's first reading.
const FIRST_SAMPLE_WAIT: Duration = Duration::from_secs(2);

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let Some(slot) = state.slots.try_reserve() else {
        warn!(
            max = state.config.max_clients,
            pending = state.slots.pending(),
            "ws: rejecting connection; client limit reached"
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "client limit reached").into_response();
    };

    ws.protocols([PROTOCOL])
        .on_failed_upgrade(|e| warn!(error = %e, "ws: upgrade failed"))
        .on_upgrade(move |socket| run_ws(socket, state, slot))
}

// =============================================================================
// SESSION
// =============================================================================

/// Per-connection state.
#[derive(Debug, Default)]
pub struct Session {
    pub monitor: Option<ProcessMonitor>,
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, mut slot: SlotGuard) {
    let client_id = Uuid::new_v4();
    let connected = slot.connect();
    info!(%client_id, connected, max = state.config.max_clients, "ws: client connected");

    let mut samples = state.sampler.subscribe();
    if timeout(FIRST_SAMPLE_WAIT, samples.wait_for(Option::is_some)).await.is_err() {
        warn!(%client_id, "ws: no sample yet; first snapshot delayed");
    }

    let mut session = Session::default();
    let mut ticker = tokio::time::interval(state.config.send_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        if let Some(reply) = process_inbound_text(&state, &mut session, client_id, text.as_str()).await {
                            if socket.send(Message::Text(reply.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            _ = ticker.tick() => {
                let Some(text) = build_snapshot(&state, &mut session, client_id) else {
                    continue;
                };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    debug!(%client_id, "ws: send failed");
                    break;
                }
            }
        }
    }

    drop(slot);
    info!(
        %client_id,
        connected = state.slots.counts().connected,
        sampling = state.sampler.is_running(),
        "ws: client disconnected"
    );
}

// =============================================================================
// OUTBOUND
// =============================================================================

/// Encode the current snapshot for this session. `None` when no sample is
/// available yet or the snapshot exceeds the wire limit.
pub fn build_snapshot(state: &AppState, session: &mut Session, client_id: Uuid) -> Option<String> {
    let sample = state.sampler.latest()?;
    let report = session
        .monitor
        .as_mut()
        .map(|m| m.sample(state.procfs(), state.sampler.mono_ms(), state.cpu_cores, state.clk_tck));
    let snapshot = sample.to_snapshot(state.cpu_cores, state.slots.counts()).with_monitor(report);

    match protocol::encode_snapshot(&snapshot) {
        Ok(text) => Some(text),
        Err(e) => {
            error!(%client_id, error = %e, code = e.error_code(), "ws: dropping snapshot");
            None
        }
    }
}

// =============================================================================
// INBOUND
// =============================================================================

/// Apply one inbound text message and return the reply for the sender, if any.
///
/// Kept separate from the socket so command handling can be tested without
/// a live connection.
pub async fn process_inbound_text(state: &AppState, session: &mut Session, client_id: Uuid, text: &str) -> Option<String> {
    let command = match protocol::parse_command(text) {
        Ok(c) => c,
        Err(e @ (ProtocolError::TooLarge(_) | ProtocolError::Empty)) => {
            debug!(%client_id, error = %e, "ws: ignoring inbound message");
            return None;
        }
        Err(e) => {
            warn!(%client_id, error = %e, code = e.error_code(), "ws: ignoring inbound message");
            return None;
        }
    };

    match command {
        Command::ListProcesses => {
            let procfs = state.procfs().clone();
            let names = tokio::task::spawn_blocking(move || procfs.process_names(MAX_PROCESS_COUNT)).await;
            let names = names.unwrap_or_else(|e| {
                error!(%client_id, error = %e, "ws: process scan failed");
                Vec::new()
            });
            encode_list_reply(client_id, "processes", protocol::encode_process_list(&names))
        }
        Command::Storage => {
            let procfs = state.procfs().clone();
            let paths = state.config.storage_paths.clone();
            let entries = tokio::task::spawn_blocking(move || storage::collect(&paths, &procfs)).await;
            let entries = entries.unwrap_or_else(|e| {
                error!(%client_id, error = %e, "ws: storage scan failed");
                Vec::new()
            });
            encode_list_reply(client_id, "storage", protocol::encode_storage(&entries))
        }
        Command::Monitor(name) => {
            info!(%client_id, %name, "ws: monitoring process");
            session.monitor = Some(ProcessMonitor::new(name));
            None
        }
        Command::StopMonitor => {
            if let Some(previous) = session.monitor.take() {
                info!(%client_id, name = previous.name(), "ws: stopped process monitoring");
            }
            None
        }
    }
}

fn encode_list_reply(
    client_id: Uuid,
    kind: &'static str,
    encoded: Result<protocol::ListReply, ProtocolError>,
) -> Option<String> {
    match encoded {
        Ok(reply) => {
            if reply.truncated {
                info!(%client_id, kind, max_bytes = protocol::MAX_LIST_BYTES, "ws: list reply truncated");
            }
            Some(reply.json)
        }
        Err(e) => {
            error!(%client_id, kind, error = %e, code = e.error_code(), "ws: list reply failed");
            None
        }
    }
}
