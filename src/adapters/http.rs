//! Minimal JSON-over-HTTP client shared by the service adapters.
//!
//! Transport problems are reported as [`CallFailure`] so the circuit
//! breaker can classify them; no retrying happens here.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::CallFailure;

/// Longest error body kept in a failure message
const MAX_ERROR_BODY: usize = 512;

/// POSTs JSON to `{base_url}/{path}` and decodes a JSON reply
#[derive(Debug, Clone)]
pub struct HttpJsonClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpJsonClient {
    /// Create a client; `timeout` is a hard ceiling above the breaker's
    /// per-attempt timeout
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("siteaudit/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, CallFailure>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut request = self.client.post(self.url_for(path)).json(body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(transport_failure)?;
        let status = response.status();

        if !status.is_success() {
            let mut message = response.text().await.unwrap_or_default();
            if message.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !message.is_char_boundary(cut) {
                    cut -= 1;
                }
                message.truncate(cut);
            }
            return Err(CallFailure::Status {
                status: status.as_u16(),
                message: message.trim().to_string(),
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| CallFailure::Decode(e.to_string()))
    }
}

/// Map a reqwest send error onto a raw failure
fn transport_failure(err: reqwest::Error) -> CallFailure {
    if err.is_timeout() {
        CallFailure::Timeout
    } else if let Some(status) = err.status() {
        CallFailure::Status {
            status: status.as_u16(),
            message: err.to_string(),
        }
    } else if err.is_decode() {
        CallFailure::Decode(err.to_string())
    } else {
        // Connect, DNS, reset mid-body: the upstream is unreachable
        CallFailure::Connect(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let client =
            HttpJsonClient::new("https://api.example.com/v1/", None, Duration::from_secs(5)).unwrap();

        assert_eq!(client.base_url(), "https://api.example.com/v1");
        assert_eq!(
            client.url_for("/keywords/data"),
            "https://api.example.com/v1/keywords/data"
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_connect_failure() {
        // Port 9 (discard) on localhost is closed in test environments
        let client = HttpJsonClient::new("http://127.0.0.1:9", None, Duration::from_secs(2)).unwrap();

        let result: Result<serde_json::Value, CallFailure> =
            client.post("anything", &serde_json::json!({})).await;

        match result {
            Err(CallFailure::Connect(_)) | Err(CallFailure::Timeout) => {}
            other => panic!("expected transport failure, got {:?}", other),
        }
    }
}
