mod config;
mod protocol;
mod routes;
mod services;
mod state;

use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = config::Config::from_env();
    info!(
        port = config.port,
        sample_ms = u64::try_from(config.sample_interval.as_millis()).unwrap_or(u64::MAX),
        send_ms = u64::try_from(config.send_interval.as_millis()).unwrap_or(u64::MAX),
        max_clients = config.max_clients,
        "configuration loaded"
    );

    let port = config.port;
    let state = state::AppState::new(config);
    info!(
        proc_root = %state.procfs().root().display(),
        cpu_cores = state.cpu_cores,
        clk_tck = state.clk_tck,
        "host detected"
    );
    let sampler = state.sampler.clone();

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    info!(%port, protocol = routes::ws::PROTOCOL, "overlayd listening");
    if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await {
        error!(error = %e, "server failed");
    }

    sampler.stop();
    info!("terminating");
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let mut term = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "cannot install SIGTERM handler; waiting for SIGINT only");
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "cannot wait for SIGINT");
            }
            return;
        }
    };
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                error!(error = %e, "SIGINT handler failed");
            }
            info!("SIGINT received");
        }
        _ = term.recv() => info!("SIGTERM received"),
    }
}
