//! Analysis function client
//!
//! Invokes backend functions (`/functions/v1/<name>`) such as incident
//! analysis. Rate-limit and payment errors are surfaced with the server's
//! own message so the UI can show them verbatim. Only a pure network
//! failure is retried, and only once.

use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Delay before the single network retry
const RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, thiserror::Error)]
pub enum FunctionError {
    #[error("{0}")]
    RateLimited(String),

    #[error("{0}")]
    PaymentRequired(String),

    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("function returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid function response: {0}")]
    Decode(String),
}

impl FunctionError {
    fn from_status(status: u16, body: String) -> Self {
        let message = server_message(&body);
        match status {
            429 => FunctionError::RateLimited(message),
            402 => FunctionError::PaymentRequired(message),
            401 | 403 => FunctionError::Unauthorized(message),
            _ => FunctionError::Http { status, message },
        }
    }
}

/// `{"error": "..."}` bodies carry the text meant for the user
fn server_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .or_else(|| v.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

/// Client for invoking backend functions
#[derive(Clone)]
pub struct FunctionsClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
    access_token: Option<String>,
}

impl FunctionsClient {
    pub fn new(base_url: &str, api_key: &str, request_timeout: Duration) -> anyhow::Result<Self> {
        use anyhow::Context;

        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to create HTTP client")?;
        let mut base_url = Url::parse(base_url).context("Invalid backend URL")?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            http,
            base_url,
            api_key: api_key.to_string(),
            access_token: None,
        })
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Call function `name` with a JSON body and return its JSON reply
    pub async fn invoke(&self, name: &str, body: &Value) -> Result<Value, FunctionError> {
        match self.invoke_once(name, body).await {
            Err(FunctionError::Network(reason)) => {
                tracing::warn!(function = name, %reason, "Function call failed, retrying once");
                tokio::time::sleep(RETRY_DELAY).await;
                self.invoke_once(name, body).await
            }
            other => other,
        }
    }

    async fn invoke_once(&self, name: &str, body: &Value) -> Result<Value, FunctionError> {
        let url = self
            .base_url
            .join(&format!("functions/v1/{}", name))
            .map_err(|e| FunctionError::Decode(format!("invalid function url: {}", e)))?;
        let token = self.access_token.as_deref().unwrap_or(&self.api_key);

        let resp = self
            .http
            .post(url)
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| FunctionError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(FunctionError::from_status(status.as_u16(), text));
        }

        let text = resp
            .text()
            .await
            .map_err(|e| FunctionError::Network(e.to_string()))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| FunctionError::Decode(e.to_string()))
    }
}
