//! All setting definitions with their default values.

use std::collections::HashMap;
use std::sync::LazyLock;

/// A single setting definition.
#[derive(Debug, Clone)]
pub struct SettingDef {
    pub key: &'static str,
    pub default: &'static str,
    pub secret: bool,
    pub required: bool,
    pub description: &'static str,
}

type DefTuple = (&'static str, &'static str, bool, bool, &'static str);

const DEFS: &[DefTuple] = &[
    ("ALERT_API_BASE_URL", "", false, true, "Base URL of the alert REST API"),
    ("ALERT_REALTIME_URL", "", false, false, "Realtime websocket endpoint for created alerts"),
    ("ALERT_API_KEY", "", true, false, "API key sent to the REST and realtime endpoints"),
    ("OVERLAY_ID", "", false, false, "Overlay identity to bind on startup"),
    ("MESSAGE_DURATION", "", false, false, "Alert display time in seconds (default 5)"),
    ("SERVER_PORT", "8080", false, false, "HTTP/WebSocket listen port"),
];

/// Global setting definitions indexed by key.
pub static DEFAULT_SETTINGS: LazyLock<HashMap<&'static str, SettingDef>> = LazyLock::new(|| {
    DEFS.iter()
        .map(|&(key, default, secret, required, description)| {
            (
                key,
                SettingDef {
                    key,
                    default,
                    secret,
                    required,
                    description,
                },
            )
        })
        .collect()
});

/// Get the default value for a setting key, or `None` if not defined.
pub fn get_default(key: &str) -> Option<&'static str> {
    DEFAULT_SETTINGS.get(key).map(|d| d.default)
}
