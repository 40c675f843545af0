//! WAVEX futures trading bot - entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// WAVEX rule-based futures trading bot
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via WAVEX_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    wavex_bot::logging::init_logging()?;

    info!("Starting wavex-bot v{}", env!("CARGO_PKG_VERSION"));

    // Config path: CLI arg > WAVEX_CONFIG env var > default.
    let config_path = args
        .config
        .or_else(|| std::env::var("WAVEX_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = wavex_bot::BotConfig::load(&config_path)?;
    info!(symbol = %config.symbol, ?config.mode, "Configuration loaded");

    let app = wavex_bot::Application::new(config)?;
    app.run().await?;

    Ok(())
}
