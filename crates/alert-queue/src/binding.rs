//! Binds the queue to one overlay identity: bulk fetch plus live feed.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::alert::Alert;
use crate::scheduler::Command;
use crate::source::AlertSource;

/// Active ingestion for one overlay. Dropping it aborts both ingestion
/// tasks, which drops (and thereby unsubscribes) the live feed.
pub(crate) struct SourceBinding {
    overlay_id: String,
    fetch_task: JoinHandle<()>,
    feed_task: JoinHandle<()>,
}

impl SourceBinding {
    pub(crate) fn start<S: AlertSource>(
        source: Arc<S>,
        overlay_id: String,
        queue: mpsc::WeakSender<Command>,
    ) -> Self {
        tracing::info!(overlay_id = %overlay_id, "Binding alert queue to overlay");

        let fetch_task = tokio::spawn(fetch_existing(
            source.clone(),
            overlay_id.clone(),
            queue.clone(),
        ));
        let feed_task = tokio::spawn(forward_created(source, overlay_id.clone(), queue));

        Self {
            overlay_id,
            fetch_task,
            feed_task,
        }
    }

    pub(crate) fn overlay_id(&self) -> &str {
        &self.overlay_id
    }
}

impl Drop for SourceBinding {
    fn drop(&mut self) {
        self.fetch_task.abort();
        self.feed_task.abort();
        tracing::info!(overlay_id = %self.overlay_id, "Alert source unbound");
    }
}

async fn fetch_existing<S: AlertSource>(
    source: Arc<S>,
    overlay_id: String,
    queue: mpsc::WeakSender<Command>,
) {
    let alerts = match source.fetch_pending(&overlay_id).await {
        Ok(alerts) => alerts,
        Err(e) => {
            // No retry: the live feed is the fallback delivery path.
            tracing::error!(overlay_id = %overlay_id, error = %e, "Failed to fetch pending alerts");
            return;
        }
    };

    tracing::info!(overlay_id = %overlay_id, count = alerts.len(), "Fetched pending alerts");
    for alert in alerts {
        if !submit(&queue, alert).await {
            return;
        }
    }
}

async fn forward_created<S: AlertSource>(
    source: Arc<S>,
    overlay_id: String,
    queue: mpsc::WeakSender<Command>,
) {
    let mut subscription = match source.subscribe_created(&overlay_id).await {
        Ok(sub) => sub,
        Err(e) => {
            tracing::error!(overlay_id = %overlay_id, error = %e, "Failed to subscribe to created alerts");
            return;
        }
    };

    while let Some(alert) = subscription.next().await {
        if alert.is_shown {
            tracing::debug!(alert_id = %alert.id, "Skipping alert already marked shown");
            continue;
        }
        if !submit(&queue, alert).await {
            break;
        }
    }
    tracing::debug!(overlay_id = %overlay_id, "Created-alert feed ended");
}

/// Hand an alert to the queue worker. Returns `false` once the worker is gone.
async fn submit(queue: &mpsc::WeakSender<Command>, alert: Alert) -> bool {
    let Some(tx) = queue.upgrade() else {
        return false;
    };
    tx.send(Command::Admit { alert, reply: None }).await.is_ok()
}
