//! Seam to the backend that supplies alerts and records them as shown.

use std::future::Future;

use tokio::sync::mpsc;

use crate::alert::{Alert, AlertId};

/// Backend collaborator for one deployment.
///
/// Futures must be `Send` because the queue drives them from spawned
/// tasks.
pub trait AlertSource: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// One-shot fetch of alerts not yet shown for the overlay.
    fn fetch_pending(
        &self,
        overlay_id: &str,
    ) -> impl Future<Output = Result<Vec<Alert>, Self::Error>> + Send;

    /// Live feed of alerts created for the overlay.
    fn subscribe_created(
        &self,
        overlay_id: &str,
    ) -> impl Future<Output = Result<Subscription, Self::Error>> + Send;

    /// Record the alert as shown.
    fn mark_shown(&self, id: &AlertId) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Handle to a live subscription.
///
/// Dropping the handle unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    alerts: mpsc::Receiver<Alert>,
    shutdown: Option<mpsc::Sender<()>>,
}

impl Subscription {
    /// `shutdown` is signalled (or closed) when the subscriber goes away.
    pub fn new(alerts: mpsc::Receiver<Alert>, shutdown: mpsc::Sender<()>) -> Self {
        Self {
            alerts,
            shutdown: Some(shutdown),
        }
    }

    /// Next created alert, or `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<Alert> {
        self.alerts.recv().await
    }

    pub fn unsubscribe(mut self) {
        self.signal_shutdown();
    }

    fn signal_shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.try_send(());
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.signal_shutdown();
    }
}
