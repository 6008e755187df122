use crate::errors::ProxyError;
use crate::lifecycle::ProxyServer;
use std::sync::Arc;
use tether_config::Config;
use tracing::{error, info};

/// Entry point for running the proxy server until Ctrl-C.
pub async fn run(config: Config) -> Result<(), ProxyError> {
    let server = Arc::new(ProxyServer::from_config(&config)?);

    let signal = tokio::spawn(shutdown_on_signal(Arc::clone(&server)));
    let result = server.start().await;
    signal.abort();
    result
}

async fn shutdown_on_signal(server: Arc<ProxyServer>) {
    if let Err(error) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {error}");
        return;
    }
    info!("shutdown signal received");
    if let Err(error) = server.stop() {
        error!("failed to stop proxy: {error}");
    }
}
