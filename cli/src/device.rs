//! Request/response calls against the device's CGI endpoints.
//!
//! Widget and overlay calls POST a JSON envelope
//! `{"apiVersion": "1.0", "method": ..., "params": {...}}` and read back a
//! reply that carries either `data` or an `error` object. PTZ commands are
//! plain GET requests with query parameters.

#[cfg(test)]
#[path = "device_test.rs"]
mod device_test;

use geometry::ptz::PanTilt;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::{CliContext, CliError};

pub const API_VERSION: &str = "1.0";
pub const WIDGET_CGI: &str = "/axis-cgi/overlaywidget/overlaywidget.cgi";
pub const OVERLAY_CGI: &str = "/axis-cgi/dynamicoverlay/dynamicoverlay.cgi";
pub const PTZ_CGI: &str = "/axis-cgi/com/ptz.cgi";

// =============================================================================
// JSON API
// =============================================================================

/// One JSON API method call.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceCall {
    pub cgi: &'static str,
    pub method: &'static str,
    pub params: Value,
}

impl DeviceCall {
    #[must_use]
    pub fn new(cgi: &'static str, method: &'static str, params: Value) -> Self {
        Self { cgi, method, params }
    }

    #[must_use]
    pub fn envelope(&self) -> Value {
        json!({ "apiVersion": API_VERSION, "method": self.method, "params": self.params })
    }
}

/// Validate a `--data` argument before anything is sent.
pub fn parse_data(raw: &str) -> Result<Value, CliError> {
    let value = serde_json::from_str::<Value>(raw).map_err(|e| CliError::InvalidData(e.to_string()))?;
    if !value.is_object() {
        return Err(CliError::InvalidData("expected a JSON object".to_owned()));
    }
    Ok(value)
}

/// Turn an `error` object in a reply into a [`CliError::Device`].
pub fn check_reply(method: &str, reply: Value) -> Result<Value, CliError> {
    let Some(error) = reply.get("error") else {
        return Ok(reply);
    };
    let code = match error.get("code") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "unknown".to_owned(),
        Some(other) => other.to_string(),
    };
    let message = error.get("message").and_then(Value::as_str).unwrap_or("no message").to_owned();
    Err(CliError::Device { method: method.to_owned(), code, message })
}

pub async fn call(ctx: &CliContext, call: &DeviceCall) -> Result<Value, CliError> {
    let client = reqwest::Client::new();
    let url = ctx.url(call.cgi);
    debug!(%url, method = call.method, "device: request");

    let response = with_auth(ctx, client.post(&url)).json(&call.envelope()).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CliError::HttpStatus { status: status.as_u16(), body });
    }

    let reply = response.json::<Value>().await?;
    check_reply(call.method, reply).inspect_err(|e| warn!(error = %e, "device: call failed"))
}

// =============================================================================
// PTZ
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtzAction {
    Move(PanTilt),
    Zoom(i32),
    Stop,
}

impl PtzAction {
    #[must_use]
    pub fn query(&self, camera: u32) -> Vec<(&'static str, String)> {
        let mut query = vec![("camera", camera.to_string())];
        match self {
            PtzAction::Move(pt) => query.push(("continuouspantiltmove", format!("{},{}", pt.pan, pt.tilt))),
            PtzAction::Zoom(speed) => query.push(("continuouszoommove", speed.to_string())),
            PtzAction::Stop => {
                query.push(("continuouspantiltmove", "0,0".to_owned()));
                query.push(("continuouszoommove", "0".to_owned()));
            }
        }
        query
    }
}

pub async fn ptz(ctx: &CliContext, action: &PtzAction, camera: u32) -> Result<(), CliError> {
    let client = reqwest::Client::new();
    let response = with_auth(ctx, client.get(ctx.url(PTZ_CGI))).query(&action.query(camera)).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CliError::HttpStatus { status: status.as_u16(), body });
    }
    Ok(())
}

fn with_auth(ctx: &CliContext, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    match &ctx.user {
        Some(user) => request.basic_auth(user, ctx.password.as_deref()),
        None => request,
    }
}
