//! Client side of the device's `sysstats` WebSocket.
//!
//! LIFECYCLE
//! =========
//! `stream` connects, optionally sends a `monitor` request, and hands every
//! snapshot to the caller. When the socket closes or the connect fails it
//! waits a fixed delay and connects again. Setting the teardown flag ends
//! the loop; no reconnect is attempted after that.

#[cfg(test)]
#[path = "stats_test.rs"]
mod stats_test;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::CliError;

pub const PROTOCOL: &str = "sysstats";
pub const STATS_PORT: u16 = 9000;
pub const DEFAULT_RECONNECT_MS: u64 = 3000;

/// How long a one-shot request waits for its reply.
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Stats URL on the same host as `base_url`.
pub fn default_stats_url(base_url: &str) -> Result<String, CliError> {
    let invalid = || CliError::InvalidBaseUrl(base_url.to_owned());
    let rest = base_url
        .strip_prefix("http://")
        .or_else(|| base_url.strip_prefix("https://"))
        .ok_or_else(invalid)?;
    let authority = rest.split('/').next().unwrap_or_default();
    let authority = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    let host = if authority.starts_with('[') {
        authority.split_inclusive(']').next().unwrap_or_default()
    } else {
        authority.split(':').next().unwrap_or_default()
    };
    if host.is_empty() {
        return Err(invalid());
    }
    Ok(format!("ws://{host}:{STATS_PORT}/"))
}

// =============================================================================
// REQUESTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    ListProcesses,
    Storage,
    Monitor(String),
}

impl Request {
    #[must_use]
    pub fn to_json(&self) -> String {
        let value = match self {
            Request::ListProcesses => json!({ "list_processes": true }),
            Request::Storage => json!({ "storage": true }),
            Request::Monitor(name) => json!({ "monitor": name }),
        };
        value.to_string()
    }

    /// Top-level key of the reply, for requests that get one.
    #[must_use]
    pub fn reply_key(&self) -> Option<&'static str> {
        match self {
            Request::ListProcesses => Some("processes"),
            Request::Storage => Some("storage"),
            Request::Monitor(_) => None,
        }
    }
}

pub async fn connect(url: &str) -> Result<WsStream, CliError> {
    let mut request = url.into_client_request()?;
    request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(PROTOCOL));
    let (stream, _) = connect_async(request).await?;
    Ok(stream)
}

/// Send one request and wait for its reply, skipping periodic snapshots.
pub async fn request(url: &str, req: &Request) -> Result<Value, CliError> {
    let key = req.reply_key().ok_or_else(|| CliError::InvalidArgument(format!("{req:?} has no reply")))?;
    let mut stream = connect(url).await?;
    stream.send(Message::text(req.to_json())).await?;

    let wait = async {
        while let Some(message) = stream.next().await {
            match message? {
                Message::Text(text) => {
                    let value: Value = serde_json::from_str(text.as_str())?;
                    if value.get(key).is_some() {
                        return Ok(value);
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        Err::<Value, CliError>(CliError::WsClosed)
    };
    let reply = tokio::time::timeout(REPLY_TIMEOUT, wait).await.map_err(|_| CliError::Timeout)??;

    if let Err(e) = stream.close(None).await {
        debug!(error = %e, "stats: close failed");
    }
    Ok(reply)
}

// =============================================================================
// STREAM
// =============================================================================

#[derive(Debug, Clone)]
pub struct StreamOptions {
    pub url: String,
    pub monitor: Option<String>,
    /// Stop after this many snapshots in total, across reconnects.
    pub count: Option<usize>,
    pub reconnect: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Finished,
    Closed,
}

/// Stream snapshots until `count` is reached or teardown is requested.
/// Returns the number of snapshots delivered.
pub async fn stream(opts: &StreamOptions, mut teardown: watch::Receiver<bool>, mut on_snapshot: impl FnMut(&Value)) -> usize {
    let mut received = 0_usize;
    loop {
        if *teardown.borrow() || opts.count.is_some_and(|limit| received >= limit) {
            break;
        }

        let outcome = tokio::select! {
            outcome = session(opts, &mut received, &mut on_snapshot) => outcome,
            () = torn_down(&mut teardown) => break,
        };
        match outcome {
            Ok(SessionEnd::Finished) => break,
            Ok(SessionEnd::Closed) => info!(url = %opts.url, "stats: connection closed"),
            Err(e) => warn!(url = %opts.url, error = %e, "stats: connection failed"),
        }

        let delay_ms = u64::try_from(opts.reconnect.as_millis()).unwrap_or(u64::MAX);
        info!(delay_ms, "stats: reconnecting");
        tokio::select! {
            () = tokio::time::sleep(opts.reconnect) => {}
            () = torn_down(&mut teardown) => break,
        }
    }
    received
}

async fn session(opts: &StreamOptions, received: &mut usize, on_snapshot: &mut impl FnMut(&Value)) -> Result<SessionEnd, CliError> {
    let mut stream = connect(&opts.url).await?;
    info!(url = %opts.url, "stats: connected");

    if let Some(name) = &opts.monitor {
        stream.send(Message::text(Request::Monitor(name.clone()).to_json())).await?;
    }

    while let Some(message) = stream.next().await {
        match message? {
            Message::Text(text) => {
                let value: Value = match serde_json::from_str(text.as_str()) {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(error = %e, "stats: ignoring malformed message");
                        continue;
                    }
                };
                on_snapshot(&value);
                *received += 1;
                if opts.count.is_some_and(|limit| *received >= limit) {
                    if let Err(e) = stream.close(None).await {
                        debug!(error = %e, "stats: close failed");
                    }
                    return Ok(SessionEnd::Finished);
                }
            }
            Message::Close(_) => return Ok(SessionEnd::Closed),
            _ => {}
        }
    }
    Ok(SessionEnd::Closed)
}

/// Resolves once teardown is set. Never resolves if the flag's owner is gone
/// without setting it.
async fn torn_down(teardown: &mut watch::Receiver<bool>) {
    if teardown.wait_for(|down| *down).await.is_err() {
        std::future::pending::<()>().await;
    }
}
