mod assets;
mod compiler;
mod config;
mod debug;
mod dom;
mod gateway;
mod handler;
mod hooks;
mod model;
mod sentinel;
mod server;
mod stylesheet;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::gateway::{GatewayClient, ReqwestGatewayClient};
use crate::hooks::PageHooksRegistry;
use crate::server::AppState;
use crate::stylesheet::{CssMinifier, LightningCssMinifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = AppConfig::from_env()?;

    let gateway: Arc<dyn GatewayClient> = Arc::new(ReqwestGatewayClient::new());
    let minifier: Arc<dyn CssMinifier> = Arc::new(LightningCssMinifier);
    let compiler = compiler::TemplateCompiler::new(
        gateway.clone(),
        minifier,
        config.gateway_bases.0.clone(),
        config.default_timeout,
    );

    let templates = server::compile_templates(&compiler, &config.template_root).await?;
    tracing::info!(count = templates.len(), "templates compiled");

    let hooks = PageHooksRegistry::new();
    let addr = config.bind_addr;
    let state = Arc::new(AppState::new(config, gateway, hooks, templates));

    tracing::info!(%addr, "starting edge-compose server");
    server::run(addr, state).await?;
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
