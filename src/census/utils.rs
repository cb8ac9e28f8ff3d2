//! Utility functions shared by the fetchers

use crate::config::FetchPolicy;
use crate::error::FetchError;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Build the HTTP client shared by every upstream request
pub fn build_client(policy: &FetchPolicy) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(policy.request_timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Send a GET request and decode a JSON body
pub async fn http_get_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, FetchError> {
    let response = request.send().await?;
    let status = response.status();

    if !status.is_success() {
        return Err(FetchError::Status(status));
    }

    let bytes = response.bytes().await?;
    debug!("Downloaded {} bytes", bytes.len());

    if bytes.is_empty() {
        return Err(FetchError::shape("empty response body"));
    }

    serde_json::from_slice(&bytes).map_err(|e| FetchError::shape(format!("invalid JSON: {}", e)))
}

/// Read a numeric value that may arrive as a JSON number or a numeric string
pub fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// Read a property as a zip code string, accepting numbers as well
pub fn zip_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => n.as_u64().map(|n| format!("{:05}", n)),
        _ => None,
    }
}
