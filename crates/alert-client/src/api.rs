//! Alert REST API client.
//!
//! `GET /api/alerts?overlayId=..` returns the alerts not yet shown for an
//! overlay; `PUT /api/alerts` updates one alert's fields.

mod request;

use alert_queue::{Alert, AlertId};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::AlertError;

/// HTTP client for the alert REST endpoints.
#[derive(Clone)]
pub struct AlertApiClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct AlertUpdate<'a> {
    id: &'a AlertId,
    data: ShownFlag,
}

#[derive(Debug, Serialize)]
struct ShownFlag {
    is_shown: bool,
}

impl AlertApiClient {
    /// Fetch the alerts not yet shown for `overlay_id`.
    pub async fn fetch_pending(&self, overlay_id: &str) -> Result<Vec<Alert>, AlertError> {
        let mut url = self.endpoint("api/alerts")?;
        url.query_pairs_mut().append_pair("overlayId", overlay_id);

        let body = self.get(url).await?;
        decode_alert_list(&body)
    }

    /// Flag an alert as shown so it is not fetched again.
    pub async fn mark_shown(&self, id: &AlertId) -> Result<(), AlertError> {
        let url = self.endpoint("api/alerts")?;
        let update = AlertUpdate {
            id,
            data: ShownFlag { is_shown: true },
        };
        self.put(url, &update).await?;
        Ok(())
    }

    fn endpoint(&self, path: &str) -> Result<Url, AlertError> {
        Ok(self.base_url.join(path)?)
    }
}

/// Decode a fetch response: either a list of alerts or `{ "error": .. }`.
///
/// Rows that do not decode as alerts are logged and skipped.
pub(crate) fn decode_alert_list(body: &str) -> Result<Vec<Alert>, AlertError> {
    let value: Value = serde_json::from_str(body)?;
    match value {
        Value::Array(rows) => Ok(rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value::<Alert>(row) {
                Ok(alert) => Some(alert),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping undecodable alert row");
                    None
                }
            })
            .collect()),
        Value::Null => Ok(Vec::new()),
        Value::Object(ref obj) if obj.contains_key("error") => {
            let message = match &obj["error"] {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Err(AlertError::ApiError {
                status: 200,
                message,
            })
        }
        other => Err(AlertError::ApiError {
            status: 200,
            message: format!("unexpected alert list payload: {other}"),
        }),
    }
}
