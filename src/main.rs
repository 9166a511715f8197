mod bot;
mod config;
mod data;
mod health;
mod telegram;
mod tracker;

use std::sync::Arc;

use anyhow::Result;
use config::{Config, EnvConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    tracing::info!("🚀 Weather market alert bot starting...");

    // Load configuration
    let config = Config::load("config.toml")?;
    let env_config = EnvConfig::load()?;

    tracing::info!("Check interval: {}s", config.polling.check_interval_secs);
    tracing::info!(
        "Daily slug refresh: {:02}:{:02} (UTC offset {} min)",
        config.polling.refresh_hour,
        config.polling.refresh_minute,
        config.polling.utc_offset_minutes
    );
    tracing::info!("Gamma API: {}", env_config.gamma_url);

    let health_port = config.system.health_port;
    tokio::spawn(async move {
        if let Err(e) = health::serve(health_port).await {
            tracing::error!("Health endpoint failed: {}", e);
        }
    });

    let bot = Arc::new(bot::Bot::new(&config, &env_config)?);
    bot.run().await;

    tracing::info!("✅ Bot initialized, watching {} stations", data::types::Station::ALL.len());

    // Keep running
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    Ok(())
}
