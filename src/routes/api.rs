//! One-shot JSON endpoints.
//!
//! Reads are synchronous filesystem/libc calls, so each handler runs them on
//! the blocking pool.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::protocol::{ErrorCode, MAX_PROCESS_COUNT, StorageEntry};
use crate::services::{cgi, storage, system_info};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CgiList {
    pub cgi: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ProcessList {
    pub processes: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct StorageList {
    pub storage: Vec<StorageEntry>,
}

pub async fn system(State(state): State<AppState>) -> Response {
    let paths = state.config.os_release_paths.clone();
    match tokio::task::spawn_blocking(move || system_info::read(&paths)).await {
        Ok(Ok(info)) => Json(info).into_response(),
        Ok(Err(e)) => {
            error!(error = %e, code = e.error_code(), "api: system info failed");
            error_response(e.error_code(), &e.to_string())
        }
        Err(e) => join_failed(&e),
    }
}

pub async fn cgi(State(state): State<AppState>) -> Response {
    let dirs = state.config.cgi_paths.clone();
    match tokio::task::spawn_blocking(move || cgi::collect(&dirs, cgi::MAX_CGI_ENTRIES)).await {
        Ok(cgi) => Json(CgiList { cgi }).into_response(),
        Err(e) => join_failed(&e),
    }
}

pub async fn processes(State(state): State<AppState>) -> Response {
    let procfs = state.procfs().clone();
    match tokio::task::spawn_blocking(move || procfs.process_names(MAX_PROCESS_COUNT)).await {
        Ok(processes) => Json(ProcessList { processes }).into_response(),
        Err(e) => join_failed(&e),
    }
}

pub async fn storage(State(state): State<AppState>) -> Response {
    let procfs = state.procfs().clone();
    let paths = state.config.storage_paths.clone();
    match tokio::task::spawn_blocking(move || storage::collect(&paths, &procfs)).await {
        Ok(storage) => Json(StorageList { storage }).into_response(),
        Err(e) => join_failed(&e),
    }
}

fn join_failed(e: &tokio::task::JoinError) -> Response {
    error!(error = %e, "api: blocking task failed");
    error_response("E_INTERNAL", "internal error")
}

fn error_response(code: &str, message: &str) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": { "code": code, "message": message } }))).into_response()
}
