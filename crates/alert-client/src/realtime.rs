//! Realtime websocket feed of newly created alerts.
//!
//! Speaks the Phoenix channel protocol used by hosted Postgres change
//! feeds: joins one topic scoped to the overlay, heartbeats on the
//! `phoenix` topic, and forwards `INSERT` records. Reconnects with
//! exponential backoff until the subscription is dropped.

mod connection;

use std::time::{Duration, Instant};

use alert_queue::{Alert, Subscription};
use tokio::sync::mpsc;
use url::Url;

use crate::AlertError;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);
const BASE_BACKOFF: Duration = Duration::from_secs(2);
const MAX_BACKOFF: Duration = Duration::from_secs(60);
const FAILURE_RESET_WINDOW: Duration = Duration::from_secs(5 * 60);
const FEED_CAPACITY: usize = 256;
const PROTOCOL_VSN: &str = "1.0.0";

/// Realtime endpoint configuration.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Base realtime URL, e.g. `wss://project.example.co/realtime/v1`.
    pub url: String,
    pub api_key: Option<String>,
    pub schema: String,
    pub table: String,
}

impl RealtimeConfig {
    /// Config for the `public.alerts` table.
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
            schema: "public".into(),
            table: "alerts".into(),
        }
    }

    /// Channel topic filtered to one overlay.
    pub(crate) fn topic(&self, overlay_id: &str) -> String {
        format!(
            "realtime:{}:{}:overlay_id=eq.{}",
            self.schema, self.table, overlay_id
        )
    }

    /// Websocket URL with protocol version and api key query parameters.
    pub(crate) fn socket_url(&self) -> Result<Url, AlertError> {
        let mut base = self.url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let mut url = Url::parse(&base)?.join("websocket")?;
        let scheme = match url.scheme() {
            "https" => Some("wss"),
            "http" => Some("ws"),
            _ => None,
        };
        if let Some(scheme) = scheme {
            url.set_scheme(scheme)
                .map_err(|_| AlertError::Realtime(format!("cannot use scheme {scheme}")))?;
        }
        {
            let mut query = url.query_pairs_mut();
            if let Some(key) = &self.api_key {
                query.append_pair("apikey", key);
            }
            query.append_pair("vsn", PROTOCOL_VSN);
        }
        Ok(url)
    }
}

/// Realtime client with auto-reconnect.
///
/// Each call to [`RealtimeClient::subscribe`] owns one socket; alerts are
/// delivered through the returned [`Subscription`].
pub struct RealtimeClient;

impl RealtimeClient {
    /// Start listening for alerts created for `overlay_id`.
    pub async fn subscribe(
        config: RealtimeConfig,
        overlay_id: &str,
    ) -> Result<Subscription, AlertError> {
        let url = config.socket_url()?;
        let topic = config.topic(overlay_id);
        let (event_tx, event_rx) = mpsc::channel::<Alert>(FEED_CAPACITY);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        tokio::spawn(Self::run_loop(url, topic, event_tx, shutdown_rx));
        Ok(Subscription::new(event_rx, shutdown_tx))
    }

    async fn run_loop(
        url: Url,
        topic: String,
        event_tx: mpsc::Sender<Alert>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let mut failures: u32 = 0;
        let mut last_failure_at: Option<Instant> = None;
        loop {
            if event_tx.is_closed() {
                tracing::info!(topic = %topic, "Realtime subscriber gone");
                return;
            }
            if let Some(last_failure) = last_failure_at {
                if last_failure.elapsed() >= FAILURE_RESET_WINDOW {
                    if failures > 0 {
                        tracing::info!(failures, "Realtime failures reset after stable interval");
                    }
                    failures = 0;
                    last_failure_at = None;
                }
            }
            match Self::connect_once(&url, &topic, &event_tx, &mut shutdown_rx).await {
                Ok(()) => {
                    tracing::info!(topic = %topic, "Realtime subscription closed");
                    return;
                }
                Err(e) => {
                    if Self::is_auth_error(&e) {
                        tracing::warn!(
                            error = %e,
                            "Realtime connection rejected credentials; giving up on this subscription"
                        );
                        return;
                    }
                    failures += 1;
                    last_failure_at = Some(Instant::now());
                    let backoff = Self::backoff_duration(failures);
                    tracing::warn!(
                        error = %e, attempt = failures,
                        backoff_secs = backoff.as_secs(),
                        "Realtime connection failed, will reconnect"
                    );
                    tokio::select! {
                        _ = shutdown_rx.recv() => {
                            tracing::info!("Realtime unsubscribed during reconnect backoff");
                            return;
                        }
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }
    }

    fn backoff_duration(failures: u32) -> Duration {
        let d = BASE_BACKOFF * 2u32.saturating_pow(failures.saturating_sub(1));
        d.min(MAX_BACKOFF)
    }

    fn is_auth_error(error: &AlertError) -> bool {
        match error {
            AlertError::WebSocket(tokio_tungstenite::tungstenite::Error::Http(resp)) => {
                matches!(resp.status().as_u16(), 401 | 403)
            }
            _ => false,
        }
    }
}
