//! Alert queue API:
//!   GET  /api/alerts/active      – alert currently on screen + settling flag
//!   GET  /api/alerts/queue       – full queue snapshot
//!   POST /api/overlay/configure  – rebind overlay identity / display duration
//!   GET  /api/settings           – effective settings, secrets masked

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::app::SharedState;
use crate::config::AppConfig;
use crate::config::defaults::DEFAULT_SETTINGS;
use crate::config::validation::validate_setting;

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

/// Build a JSON error response.
pub fn err_json(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "status": "error", "error": message })))
}

/// GET /api/alerts/active
pub async fn get_active_alert(State(state): State<SharedState>) -> Json<Value> {
    let snapshot = state.alerts().snapshot();
    Json(json!({
        "alert": snapshot.active,
        "isSettling": snapshot.is_settling,
        "phase": snapshot.phase,
    }))
}

/// GET /api/alerts/queue
pub async fn get_queue(State(state): State<SharedState>) -> ApiResult {
    let snapshot = state
        .alerts()
        .inspect()
        .await
        .map_err(|e| err_json(StatusCode::SERVICE_UNAVAILABLE, &e.to_string()))?;
    Ok(Json(json!(snapshot)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureRequest {
    pub overlay_id: String,
    /// Seconds, as a number or string.
    #[serde(default)]
    pub duration_seconds: Option<Value>,
}

/// POST /api/overlay/configure
pub async fn configure_overlay(
    State(state): State<SharedState>,
    Json(body): Json<ConfigureRequest>,
) -> ApiResult {
    let overlay_id = body.overlay_id.trim().to_string();
    validate_setting("OVERLAY_ID", &overlay_id)
        .map_err(|e| err_json(StatusCode::BAD_REQUEST, &format!("overlayId {e}")))?;

    let duration = body.duration_seconds.and_then(|v| match v {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    });

    state
        .configure_overlay(overlay_id.clone(), duration.clone())
        .await
        .map_err(|e| err_json(StatusCode::SERVICE_UNAVAILABLE, &e.to_string()))?;

    tracing::info!(overlay_id = %overlay_id, ?duration, "Overlay configured via API");
    Ok(Json(json!({
        "status": "ok",
        "overlayId": overlay_id,
        "durationSeconds": duration,
    })))
}

/// GET /api/settings
pub async fn get_settings(State(state): State<SharedState>) -> Json<Value> {
    let config = state.config().await;
    let mut settings = serde_json::Map::new();
    for def in DEFAULT_SETTINGS.values() {
        let value = setting_value(&config, def.key);
        let shown = if def.secret && !value.is_empty() {
            "*****".to_string()
        } else {
            value.clone()
        };
        settings.insert(
            def.key.to_string(),
            json!({
                "value": shown,
                "type": if def.secret { "secret" } else { "normal" },
                "required": def.required,
                "description": def.description,
                "has_value": !value.is_empty(),
            }),
        );
    }
    Json(Value::Object(settings))
}

fn setting_value(config: &AppConfig, key: &str) -> String {
    match key {
        "ALERT_API_BASE_URL" => config.api_base_url.clone(),
        "ALERT_REALTIME_URL" => config.realtime_url.clone().unwrap_or_default(),
        "ALERT_API_KEY" => config.api_key.clone().unwrap_or_default(),
        "OVERLAY_ID" => config.overlay_id.clone(),
        "MESSAGE_DURATION" => config.message_duration.clone().unwrap_or_default(),
        "SERVER_PORT" => config.server_port.to_string(),
        _ => String::new(),
    }
}
