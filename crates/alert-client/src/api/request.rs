use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;

use super::*;

impl AlertApiClient {
    /// `base_url` is normalised to end with `/` so relative endpoints join
    /// beneath it.
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, AlertError> {
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: Url::parse(&base)?,
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let Some(key) = &self.api_key else {
            return headers;
        };
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {key}")) {
            headers.insert(AUTHORIZATION, value);
        }
        if let Ok(value) = HeaderValue::from_str(key) {
            headers.insert("apikey", value);
        }
        headers
    }

    /// Execute a GET request and return the body of a 2xx response.
    pub(super) async fn get(&self, url: Url) -> Result<String, AlertError> {
        let resp = self
            .http
            .get(url.clone())
            .headers(self.auth_headers())
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            tracing::warn!(url = %url, status = status.as_u16(), "Alert API GET failed");
            return Err(AlertError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(body)
    }

    /// Execute a PUT request with a JSON body.
    pub(super) async fn put(&self, url: Url, body: &impl Serialize) -> Result<String, AlertError> {
        let resp = self
            .http
            .put(url.clone())
            .headers(self.auth_headers())
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        let resp_body = resp.text().await?;

        if !status.is_success() {
            tracing::warn!(url = %url, status = status.as_u16(), "Alert API PUT failed");
            return Err(AlertError::ApiError {
                status: status.as_u16(),
                message: resp_body,
            });
        }

        Ok(resp_body)
    }
}
