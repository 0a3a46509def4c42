//! HTTP client for the media server's call control API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::Transport;
use crate::error::TransportError;

/// Transport backed by the media server's REST API.
pub struct RestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl RestTransport {
    /// Create a new client with the given base URL and per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build transport HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_call_action(
        &self,
        meeting_id: &str,
        action: &str,
    ) -> Result<(), (StatusCode, String)> {
        let url = format!("{}/calls/{}/{}", self.base_url, meeting_id, action);
        debug!("Transport request: POST {}", url);

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        // Media server reports errors as {"message": "..."}
        let message = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or_else(|| format!("HTTP {}", status));

        Err((status, message))
    }
}

#[async_trait]
impl Transport for RestTransport {
    async fn join(&self, meeting_id: &str) -> Result<(), TransportError> {
        self.post_call_action(meeting_id, "join")
            .await
            .map_err(|(_, reason)| TransportError::JoinFailed {
                meeting_id: meeting_id.to_string(),
                reason,
            })
    }

    async fn end_call(&self, meeting_id: &str) -> Result<(), TransportError> {
        self.post_call_action(meeting_id, "end")
            .await
            .map_err(|(_, reason)| TransportError::EndFailed {
                meeting_id: meeting_id.to_string(),
                reason,
            })
    }
}
