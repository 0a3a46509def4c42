use crate::api::ApiServer;
use crate::config::Config;
use crate::dispatch::RestAgentDispatcher;
use crate::session::SessionService;
use crate::transport::RestTransport;
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

pub async fn run_service() -> Result<()> {
    info!("Starting Huddle service");

    let config = Config::load()?;

    let transport = Arc::new(RestTransport::new(
        &config.transport.base_url,
        config.transport.timeout(),
    )?);
    let dispatcher = Arc::new(RestAgentDispatcher::new(
        &config.dispatch.base_url,
        config.dispatch.timeout(),
    )?);

    let service = Arc::new(SessionService::new(
        transport,
        dispatcher,
        config.dispatch.policy(),
        config.session.grace_period(),
    ));

    info!("Huddle is ready!");
    info!(
        "Media server: {}, agent dispatcher: {}",
        config.transport.base_url, config.dispatch.base_url
    );
    info!(
        "Test manually: curl -X POST http://127.0.0.1:{}/sessions/demo/join",
        config.server.port
    );

    ApiServer::new(service, &config).start().await
}
