//! Runtime application configuration loaded from the environment.

use anyhow::Context;

use super::defaults::{DEFAULT_SETTINGS, get_default};
use super::validation::validate_setting;

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_base_url: String,
    pub realtime_url: Option<String>,
    pub api_key: Option<String>,
    pub overlay_id: String,
    /// Raw display duration in seconds; parsed by the queue, which falls
    /// back to its default for anything non-numeric.
    pub message_duration: Option<String>,
    pub server_port: u16,
}

impl AppConfig {
    /// Load configuration from process environment variables.
    pub fn load() -> Result<Self, anyhow::Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, filling in defaults and
    /// validating each value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, anyhow::Error> {
        let g = |key: &str| -> Result<String, anyhow::Error> {
            let value = lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| get_default(key).unwrap_or_default().to_string());
            if value.is_empty() {
                if DEFAULT_SETTINGS.get(key).is_some_and(|d| d.required) {
                    anyhow::bail!("missing required setting {key}");
                }
                return Ok(value);
            }
            validate_setting(key, &value)
                .map_err(|e| anyhow::anyhow!("{e}"))
                .with_context(|| format!("invalid setting {key}"))?;
            Ok(value)
        };

        let message_duration = non_empty(g("MESSAGE_DURATION")?);
        if let Some(raw) = &message_duration {
            if !raw.parse::<f64>().is_ok_and(|secs| secs.is_finite() && secs > 0.0) {
                tracing::warn!(value = %raw, "MESSAGE_DURATION is not a positive number; default will be used");
            }
        }

        Ok(Self {
            api_base_url: g("ALERT_API_BASE_URL")?,
            realtime_url: non_empty(g("ALERT_REALTIME_URL")?),
            api_key: non_empty(g("ALERT_API_KEY")?),
            overlay_id: g("OVERLAY_ID")?,
            message_duration,
            server_port: g("SERVER_PORT")?.parse().context("invalid setting SERVER_PORT")?,
        })
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}
