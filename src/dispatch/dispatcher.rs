//! Agent dispatcher abstraction and HTTP client implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::error::DispatchError;

/// Capability to schedule an AI agent for a meeting.
///
/// The call returns as soon as the external system accepts the request;
/// the agent attaches to the session out-of-band.
#[async_trait]
pub trait AgentDispatcher: Send + Sync {
    async fn connect_agent(&self, meeting_id: &str) -> Result<(), DispatchError>;
}

/// Dispatcher backed by the agent worker's REST API.
pub struct RestAgentDispatcher {
    client: reqwest::Client,
    base_url: String,
}

impl RestAgentDispatcher {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build dispatcher HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl AgentDispatcher for RestAgentDispatcher {
    async fn connect_agent(&self, meeting_id: &str) -> Result<(), DispatchError> {
        let url = format!("{}/agents/connect", self.base_url);
        debug!("Dispatch request: POST {} for meeting {}", url, meeting_id);

        let response = self
            .client
            .post(&url)
            .json(&json!({ "meetingId": meeting_id }))
            .send()
            .await
            .map_err(|e| DispatchError {
                meeting_id: meeting_id.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let reason = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or_else(|| format!("HTTP {}", status));

        Err(DispatchError {
            meeting_id: meeting_id.to_string(),
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let dispatcher =
            RestAgentDispatcher::new("http://localhost:4500/", Duration::from_secs(5)).unwrap();
        assert_eq!(dispatcher.base_url, "http://localhost:4500");
    }

    #[tokio::test]
    async fn test_connect_agent_unreachable_server() {
        let dispatcher =
            RestAgentDispatcher::new("http://127.0.0.1:1", Duration::from_millis(500)).unwrap();
        let err = dispatcher.connect_agent("m1").await.unwrap_err();
        assert_eq!(err.meeting_id, "m1");
    }
}
