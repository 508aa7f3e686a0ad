//! Headless alert overlay server.
//!
//! Starts the alert queue, the HTTP/WebSocket server and the relay, then
//! waits for Ctrl+C.

use alert_overlay_lib::app::SharedState;
use alert_overlay_lib::{relay, server, shutdown};
use alert_queue::AlertQueue;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    alert_overlay_lib::init_tracing();
    tracing::info!("Starting alert overlay server");

    let config = alert_overlay_lib::init_foundation()?;
    let backend = alert_overlay_lib::build_backend(&config)?;
    let alerts = AlertQueue::spawn(backend);

    let overlay_id = config.overlay_id.clone();
    let duration = config.message_duration.clone();
    let state = SharedState::new(config, alerts);

    if overlay_id.is_empty() {
        tracing::warn!("OVERLAY_ID not set; waiting for POST /api/overlay/configure");
    } else {
        state.configure_overlay(overlay_id, duration).await?;
    }

    let s = state.clone();
    tokio::spawn(async move { relay::run_relay(s).await });

    let server_state = state.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server::start_server(server_state).await {
            tracing::error!("Server failed: {e}");
        }
    });

    tracing::info!(
        port = state.server_port(),
        "Alert overlay server running. Press Ctrl+C to stop."
    );

    tokio::signal::ctrl_c().await?;
    shutdown::graceful_shutdown(&state).await;

    let _ = server_handle.await;
    Ok(())
}
