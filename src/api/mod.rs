//! REST API server for Huddle.
//!
//! Provides HTTP endpoints for:
//! - Session control (join, leave, status, listing)
//! - The transport disconnect webhook
//! - Service info and version

pub mod error;
pub mod routes;

use crate::config::Config;
use crate::session::SessionService;
use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::info;

pub use routes::sessions::SessionsState;

pub struct ApiServer {
    port: u16,
    sessions_state: SessionsState,
}

impl ApiServer {
    pub fn new(service: Arc<SessionService>, config: &Config) -> Self {
        Self {
            port: config.server.port,
            sessions_state: SessionsState { service },
        }
    }

    pub async fn start(self) -> Result<()> {
        let app = Router::new()
            // Root and version endpoints
            .route("/", get(status))
            .route("/version", get(version))
            // Session control and transport webhook
            .merge(routes::sessions::router(self.sessions_state))
            .layer(ServiceBuilder::new());

        let listener = tokio::net::TcpListener::bind(&format!("127.0.0.1:{}", self.port)).await?;

        info!("API server listening on http://127.0.0.1:{}", self.port);
        info!("Endpoints:");
        info!("  GET  /                     - Service info");
        info!("  GET  /version              - Get version info");
        info!("  POST /sessions/:id/join    - Join a meeting");
        info!("  POST /sessions/:id/leave   - Leave a meeting");
        info!("  GET  /sessions/:id         - Get session status");
        info!("  GET  /sessions             - List live sessions");
        info!("  POST /transport/disconnect - Transport disconnect webhook");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn status() -> Json<Value> {
    Json(json!({
        "service": "huddle",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": "huddle"
    }))
}
