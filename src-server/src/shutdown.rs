use std::time::Duration;

use alert_queue::SETTLE_DELAY;
use tokio::time::timeout;

use crate::app::SharedState;

/// Slack on top of display + settle for the final acknowledgement request.
const ACK_GRACE: Duration = Duration::from_secs(2);

pub async fn graceful_shutdown(state: &SharedState) {
    tracing::info!("Shutdown sequence started");

    state.shutdown_token().cancel();
    tracing::info!("Shutdown: server and relay cancelled");

    let display = Duration::from_millis(state.alerts().snapshot().display_duration_ms);
    let limit = display + SETTLE_DELAY + ACK_GRACE;
    match timeout(limit, state.alerts().shutdown()).await {
        Ok(Ok(())) => tracing::info!("Shutdown: alert queue drained"),
        Ok(Err(_)) => tracing::warn!("Shutdown: alert queue already stopped"),
        Err(_) => tracing::warn!(
            limit_ms = limit.as_millis() as u64,
            "Shutdown: alert queue did not drain in time"
        ),
    }

    tracing::info!("Shutdown sequence completed");
}
