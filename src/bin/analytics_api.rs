//! analytics_api - API-only service for Vehicle Analytics
//!
//! This daemon:
//! 1. Opens an existing session database
//! 2. Serves the dashboard API
//! 3. Does NOT ingest any camera stream

use anyhow::Result;
use std::sync::mpsc;

use vehicle_analytics::{
    api::{ApiConfig, ApiServer},
    config::AnalyticsApiConfig,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AnalyticsApiConfig::load()?;
    let api_config = ApiConfig {
        addr: config.api_addr.clone(),
        token_path: config.api_token_path.clone(),
    };
    let api_handle = ApiServer::new(api_config, config.db_path.clone()).spawn()?;
    log::info!("dashboard api listening on {}", api_handle.addr);
    if let Some(path) = &api_handle.token_path {
        log::info!("dashboard api token written to {}", path.display());
    } else {
        log::warn!(
            "dashboard api token (handle securely): {}",
            api_handle.token
        );
    }
    log::info!("analytics_api running. serving {}", config.db_path);

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .expect("error setting Ctrl-C handler");

    log::info!("analytics_api waiting for shutdown signal (Ctrl-C)...");
    let _ = rx.recv();
    log::info!("shutdown signal received, stopping dashboard api...");
    api_handle.stop()?;

    Ok(())
}
