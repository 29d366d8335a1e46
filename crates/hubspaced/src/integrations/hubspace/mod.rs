mod coordinator;
mod source;

use std::sync::Arc;

use ::hubspace::HubspaceClient;
use anyhow::Context;
pub use coordinator::HubspaceIntegration;
pub use coordinator::INTEGRATION_NAME;
use linkme::distributed_slice;
use tracing::info;

use crate::engine;

#[distributed_slice(engine::INTEGRATION_REGISTRY)]
fn init_hubspace(ctx: &engine::IntegrationContext) -> engine::IntegrationFactoryResult {
    let hubspace_config = match &ctx.config.integrations.hubspace {
        Some(c) if c.enabled => c,
        Some(_) => {
            info!("[{}] Integration is disabled, skipping", INTEGRATION_NAME);
            return Ok(None);
        }
        None => return Ok(None),
    };

    let client = HubspaceClient::new(
        hubspace_config.credentials(),
        hubspace_config.client_options(),
    )
    .context("Failed to create HubSpace client")?;

    Ok(Some(Box::new(HubspaceIntegration::new(
        Arc::new(client),
        hubspace_config.poll_interval(),
    ))))
}
