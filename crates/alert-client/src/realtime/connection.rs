use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as Msg;

use super::*;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

const PHOENIX_TOPIC: &str = "phoenix";

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct PhxMessage {
    pub(super) topic: String,
    pub(super) event: String,
    #[serde(default)]
    pub(super) payload: Value,
    #[serde(rename = "ref", default)]
    pub(super) msg_ref: Option<String>,
}

impl PhxMessage {
    fn new(topic: &str, event: &str, msg_ref: String) -> Self {
        Self {
            topic: topic.to_string(),
            event: event.to_string(),
            payload: json!({}),
            msg_ref: Some(msg_ref),
        }
    }

    fn into_ws(self) -> Result<Msg, AlertError> {
        Ok(Msg::Text(serde_json::to_string(&self)?.into()))
    }
}

pub(super) enum MessageAction {
    Continue,
    Deliver(Alert),
    ChannelClosed(String),
}

impl RealtimeClient {
    /// Run one socket session. `Ok(())` means the subscriber is gone and
    /// the loop should stop; errors trigger a reconnect.
    pub(super) async fn connect_once(
        url: &Url,
        topic: &str,
        event_tx: &mpsc::Sender<Alert>,
        shutdown_rx: &mut mpsc::Receiver<()>,
    ) -> Result<(), AlertError> {
        tracing::info!(topic = %topic, "Connecting to realtime websocket");
        let (mut ws, _) = connect_async(url.as_str()).await?;

        let mut next_ref: u64 = 0;
        Self::join(&mut ws, topic, &mut next_ref).await?;

        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut awaiting_heartbeat: Option<String> = None;

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!(topic = %topic, "Realtime unsubscribe requested");
                    let leave = PhxMessage::new(topic, "phx_leave", Self::bump(&mut next_ref));
                    let _ = ws.send(leave.into_ws()?).await;
                    let _ = ws.close(None).await;
                    return Ok(());
                }
                _ = heartbeat.tick() => {
                    if awaiting_heartbeat.is_some() {
                        tracing::warn!("Realtime heartbeat reply missing");
                        return Err(AlertError::Timeout);
                    }
                    let beat_ref = Self::bump(&mut next_ref);
                    let beat = PhxMessage::new(PHOENIX_TOPIC, "heartbeat", beat_ref.clone());
                    ws.send(beat.into_ws()?).await?;
                    awaiting_heartbeat = Some(beat_ref);
                }
                msg = ws.next() => match msg {
                    Some(Ok(Msg::Text(text))) => {
                        match Self::handle_message(&text, topic, &mut awaiting_heartbeat) {
                            MessageAction::Continue => {}
                            MessageAction::Deliver(alert) => {
                                tracing::debug!(alert_id = %alert.id, "Realtime alert received");
                                if event_tx.send(alert).await.is_err() {
                                    let _ = ws.close(None).await;
                                    return Ok(());
                                }
                            }
                            MessageAction::ChannelClosed(reason) => {
                                let _ = ws.close(None).await;
                                return Err(AlertError::Realtime(reason));
                            }
                        }
                    }
                    Some(Ok(Msg::Ping(data))) => {
                        let _ = ws.send(Msg::Pong(data)).await;
                    }
                    Some(Ok(Msg::Close(_))) | None => {
                        tracing::warn!("Realtime websocket closed by server");
                        return Err(AlertError::Realtime("Server closed".into()));
                    }
                    Some(Err(e)) => return Err(AlertError::WebSocket(e)),
                    Some(Ok(_)) => {}
                },
            }
        }
    }

    async fn join(ws: &mut WsStream, topic: &str, next_ref: &mut u64) -> Result<(), AlertError> {
        let join_ref = Self::bump(next_ref);
        ws.send(PhxMessage::new(topic, "phx_join", join_ref.clone()).into_ws()?)
            .await?;

        loop {
            match tokio::time::timeout(JOIN_TIMEOUT, ws.next()).await {
                Ok(Some(Ok(Msg::Text(text)))) => {
                    let Some(msg) = Self::decode_frame(&text) else {
                        continue;
                    };
                    if msg.event == "phx_reply" && msg.msg_ref.as_deref() == Some(join_ref.as_str()) {
                        Self::reply_status(&msg.payload)?;
                        tracing::info!(topic = %topic, "Realtime channel joined");
                        return Ok(());
                    }
                }
                Ok(Some(Ok(_))) => continue,
                Ok(Some(Err(e))) => return Err(AlertError::WebSocket(e)),
                Ok(None) => return Err(AlertError::Realtime("Connection closed".into())),
                Err(_) => return Err(AlertError::Timeout),
            }
        }
    }

    pub(super) fn handle_message(
        text: &str,
        topic: &str,
        awaiting_heartbeat: &mut Option<String>,
    ) -> MessageAction {
        let Some(msg) = Self::decode_frame(text) else {
            return MessageAction::Continue;
        };

        match msg.event.as_str() {
            "phx_reply" => {
                if msg.msg_ref.is_some() && msg.msg_ref == *awaiting_heartbeat {
                    tracing::trace!("Realtime heartbeat acknowledged");
                    *awaiting_heartbeat = None;
                }
                MessageAction::Continue
            }
            "INSERT" if msg.topic == topic => match Self::parse_insert(&msg.payload) {
                Ok(alert) => MessageAction::Deliver(alert),
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping malformed alert payload");
                    MessageAction::Continue
                }
            },
            "phx_error" | "phx_close" if msg.topic == topic => {
                MessageAction::ChannelClosed(format!("channel {}: {}", msg.event, msg.payload))
            }
            other => {
                tracing::debug!(event = other, topic = %msg.topic, "Unhandled realtime message");
                MessageAction::Continue
            }
        }
    }

    pub(super) fn decode_frame(text: &str) -> Option<PhxMessage> {
        match serde_json::from_str(text) {
            Ok(msg) => Some(msg),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed realtime frame");
                None
            }
        }
    }

    /// Extract the inserted row. Accepts both the legacy `record` layout and
    /// the newer `data.record` one.
    pub(super) fn parse_insert(payload: &Value) -> Result<Alert, AlertError> {
        let record = payload
            .get("record")
            .or_else(|| payload.get("data").and_then(|d| d.get("record")))
            .ok_or_else(|| AlertError::Realtime("INSERT payload missing record".into()))?;
        Ok(serde_json::from_value(record.clone())?)
    }

    pub(super) fn reply_status(payload: &Value) -> Result<(), AlertError> {
        match payload.get("status").and_then(Value::as_str) {
            Some("ok") => Ok(()),
            status => Err(AlertError::Realtime(format!(
                "join rejected (status {}): {}",
                status.unwrap_or("missing"),
                payload.get("response").unwrap_or(&Value::Null)
            ))),
        }
    }

    fn bump(next_ref: &mut u64) -> String {
        *next_ref += 1;
        next_ref.to_string()
    }
}
