//! HTTP server for the payroll engine.
//!
//! Reads configuration from the directory named by `PAYROLL_ENGINE_CONFIG`
//! (default `./config`) and serves the API on the configured address.

use std::error::Error;

use payroll_engine::api::{AppState, create_router};
use payroll_engine::config::ConfigLoader;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const CONFIG_ENV: &str = "PAYROLL_ENGINE_CONFIG";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_dir = std::env::var(CONFIG_ENV).unwrap_or_else(|_| "./config".to_string());
    let config = ConfigLoader::load(&config_dir)?;
    let bind_addr = config.settings().server.bind_addr.clone();

    let router = create_router(AppState::new(config));
    let listener = TcpListener::bind(&bind_addr).await?;
    info!(address = %bind_addr, config = %config_dir, "Payroll engine listening");

    axum::serve(listener, router).await?;
    Ok(())
}
