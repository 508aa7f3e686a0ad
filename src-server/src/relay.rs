//! Pushes active-alert changes to connected overlay pages.

use alert_queue::{AlertId, QueueSnapshot};
use serde_json::{Value, json};

use crate::app::SharedState;

/// Broadcast an `alert` message whenever the active alert or its settling
/// flag changes. Runs until shutdown.
pub async fn run_relay(state: SharedState) {
    let mut rx = state.alerts().subscribe();
    let mut last: Option<(Option<AlertId>, bool)> = None;

    loop {
        let key = {
            let snapshot = rx.borrow_and_update();
            let key = display_key(&snapshot);
            if last.as_ref() != Some(&key) {
                let msg = alert_message(&snapshot);
                let _ = state.ws_sender().send(msg.to_string());
            }
            key
        };
        last = Some(key);

        tokio::select! {
            _ = state.shutdown_token().cancelled() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    tracing::info!("Alert relay stopped");
}

fn display_key(snapshot: &QueueSnapshot) -> (Option<AlertId>, bool) {
    (
        snapshot.active.as_ref().map(|a| a.id.clone()),
        snapshot.is_settling,
    )
}

/// Overlay message describing what should currently be on screen.
pub fn alert_message(snapshot: &QueueSnapshot) -> Value {
    json!({
        "type": "alert",
        "data": snapshot.active,
        "visible": snapshot.active.is_some(),
        "settling": snapshot.is_settling,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })
}
