//! Setting value validation.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static RE_OVERLAY_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\-.:]{1,128}$").unwrap());

/// Validate a setting value. Returns `Ok(())` if valid, or an error message.
pub fn validate_setting(key: &str, value: &str) -> Result<(), String> {
    match key {
        "ALERT_API_BASE_URL" => validate_url(value, &["http", "https"])?,
        "ALERT_REALTIME_URL" => {
            if !value.is_empty() {
                validate_url(value, &["ws", "wss", "http", "https"])?;
            }
        }
        "OVERLAY_ID" => {
            if !value.is_empty() && !RE_OVERLAY_ID.is_match(value) {
                return Err("must be 1-128 characters of [A-Za-z0-9_-.:]".into());
            }
        }
        "SERVER_PORT" => validate_int_range(value, 1, 65535)?,
        _ => {}
    }
    Ok(())
}

fn validate_url(value: &str, schemes: &[&str]) -> Result<(), String> {
    let url = Url::parse(value).map_err(|e| format!("invalid URL: {e}"))?;
    if !schemes.contains(&url.scheme()) {
        return Err(format!("scheme must be one of {}", schemes.join(", ")));
    }
    Ok(())
}

fn validate_int_range(value: &str, min: i64, max: i64) -> Result<(), String> {
    let v: i64 = value.parse().map_err(|_| "must be an integer")?;
    if !(min..=max).contains(&v) {
        return Err(format!("must be between {min} and {max}"));
    }
    Ok(())
}
