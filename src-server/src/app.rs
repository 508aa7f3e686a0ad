use std::sync::Arc;

use alert_queue::AlertQueue;
use tokio::sync::{RwLock, broadcast};
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;

/// Application shared state accessible from axum handlers and background tasks.
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<SharedStateInner>,
}

struct SharedStateInner {
    /// Broadcast channel for WebSocket messages
    ws_tx: broadcast::Sender<String>,
    /// Application configuration (updated by overlay configuration)
    config: RwLock<AppConfig>,
    /// Handle to the alert queue worker
    alerts: AlertQueue,
    /// Cancelled once shutdown begins
    shutdown_token: CancellationToken,
}

impl SharedState {
    pub fn new(config: AppConfig, alerts: AlertQueue) -> Self {
        let (ws_tx, _) = broadcast::channel(256);

        Self {
            inner: Arc::new(SharedStateInner {
                ws_tx,
                config: RwLock::new(config),
                alerts,
                shutdown_token: CancellationToken::new(),
            }),
        }
    }

    pub fn server_port(&self) -> u16 {
        self.inner
            .config
            .try_read()
            .map(|c| c.server_port)
            .unwrap_or(8080)
    }

    pub fn ws_sender(&self) -> &broadcast::Sender<String> {
        &self.inner.ws_tx
    }

    pub fn subscribe_ws(&self) -> broadcast::Receiver<String> {
        self.inner.ws_tx.subscribe()
    }

    pub fn alerts(&self) -> &AlertQueue {
        &self.inner.alerts
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.inner.shutdown_token
    }

    /// Get a read lock on the current config.
    pub async fn config(&self) -> tokio::sync::RwLockReadGuard<'_, AppConfig> {
        self.inner.config.read().await
    }

    /// Rebind the alert queue and remember the new overlay settings.
    pub async fn configure_overlay(
        &self,
        overlay_id: String,
        message_duration: Option<String>,
    ) -> Result<(), alert_queue::QueueError> {
        self.inner
            .alerts
            .configure(overlay_id.clone(), message_duration.clone())
            .await?;

        let mut config = self.inner.config.write().await;
        config.overlay_id = overlay_id;
        config.message_duration = message_duration;
        Ok(())
    }
}
