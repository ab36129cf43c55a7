//! # Nodeboard Host
//!
//! Background daemon that owns the reminder store, fires reminders and
//! serves UI clients over a Unix socket.
//!
//! Usage: `cargo run --bin nodeboard-host`

use anyhow::Result;
use dotenvy::dotenv;
use log::info;

use nodeboard::core::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    info!("Starting Nodeboard host...");
    nodeboard::host::run(config).await?;
    info!("Nodeboard host shutdown complete");
    Ok(())
}
