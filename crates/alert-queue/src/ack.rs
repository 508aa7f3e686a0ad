//! Fire-and-forget acknowledgement of displayed alerts.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::alert::AlertId;
use crate::scheduler::Command;
use crate::source::AlertSource;

/// Mark `id` shown in the background and report the outcome to the queue.
///
/// The caller never waits; a failed call is logged and counted only.
pub(crate) fn notify_shown<S: AlertSource>(
    source: Arc<S>,
    id: AlertId,
    queue: mpsc::WeakSender<Command>,
) {
    tokio::spawn(async move {
        let ok = match source.mark_shown(&id).await {
            Ok(()) => {
                tracing::debug!(alert_id = %id, "Alert marked shown");
                true
            }
            Err(e) => {
                tracing::warn!(alert_id = %id, error = %e, "Failed to mark alert shown");
                false
            }
        };
        if let Some(tx) = queue.upgrade() {
            let _ = tx.send(Command::AckCompleted { id, ok }).await;
        }
    });
}
