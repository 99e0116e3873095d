//! Rendezvous and signaling relay for password-protected video rooms,
//! with a side-channel announcing freshly uploaded recordings.

use std::net::SocketAddr;

use dotenv::dotenv;
use hannibal::Service;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod connection;
mod metrics;
mod registry;
mod relay;
mod upload;
mod web_server;

use crate::config::Config;
use crate::relay::SignalingRelay;
use crate::web_server::warp::WebServer;

const DEFAULT_LOG_CONFIG: &str = "server=debug,warp=info";

#[async_std::main]
async fn main() -> anyhow::Result<()> {
    color_backtrace::install();
    dotenv().ok();

    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(
            config.log_config.as_deref().unwrap_or(DEFAULT_LOG_CONFIG),
        ))
        .init();

    std::fs::create_dir_all(&config.storage.upload_dir)?;

    let socket = SocketAddr::new(config.server.host.parse()?, config.server.port);

    // bring the relay up before the first websocket or upload arrives
    SignalingRelay::from_registry().await?;

    let web_server = WebServer::from_registry().await?;
    web_server.send(web_server::Listen {
        socket,
        storage: config.storage,
    })?;

    info!("listening on http://{}", socket);
    web_server.wait_for_stop().await;
    Ok(())
}
