mod bootstrap;
mod challenge;
mod config;
mod error;
mod ledger;
mod settlement;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Initialize logging and tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,twotruths_settlement=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("🚀 Starting Two Truths N Lie settlement service");

    dotenv::dotenv().ok();
    let config = config::Config::from_env()?;

    let scheduler = bootstrap::initialize(&config).await?;

    info!(
        "⏰ Scanning for full challenges every {:?}",
        config.scan_interval
    );
    let handle = scheduler.start();

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    handle.stop().await;

    Ok(())
}
