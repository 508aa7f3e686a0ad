//! Backend client for the alert queue.
//!
//! Provides the REST client used for the bulk fetch and acknowledgement,
//! the realtime websocket client used for the live feed, and
//! [`AlertBackend`], which combines both into an [`AlertSource`].

pub mod api;
pub mod realtime;

use alert_queue::{Alert, AlertId, AlertSource, Subscription};

pub use api::AlertApiClient;
pub use realtime::{RealtimeClient, RealtimeConfig};

/// Unified error type for the alert-client crate.
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Alert API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Realtime error: {0}")]
    Realtime(String),

    #[error("Realtime feed is not configured")]
    RealtimeDisabled,

    #[error("Connection timeout")]
    Timeout,

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// REST + realtime backend for one deployment.
#[derive(Clone)]
pub struct AlertBackend {
    api: AlertApiClient,
    realtime: Option<RealtimeConfig>,
}

impl AlertBackend {
    /// `realtime` may be `None`, in which case only the bulk fetch delivers.
    pub fn new(api: AlertApiClient, realtime: Option<RealtimeConfig>) -> Self {
        Self { api, realtime }
    }
}

impl AlertSource for AlertBackend {
    type Error = AlertError;

    async fn fetch_pending(&self, overlay_id: &str) -> Result<Vec<Alert>, AlertError> {
        self.api.fetch_pending(overlay_id).await
    }

    async fn subscribe_created(&self, overlay_id: &str) -> Result<Subscription, AlertError> {
        let config = self.realtime.clone().ok_or(AlertError::RealtimeDisabled)?;
        RealtimeClient::subscribe(config, overlay_id).await
    }

    async fn mark_shown(&self, id: &AlertId) -> Result<(), AlertError> {
        self.api.mark_shown(id).await
    }
}
