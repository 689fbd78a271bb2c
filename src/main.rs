//! n-echo: a line-oriented repeat server
//!
//! Clients send `<n> <message>` lines and get the message back n times,
//! one per line. Malformed requests get an `ERROR:` reply without closing
//! the connection.
//!
//! Features:
//! - One task per connection, no state shared between clients
//! - Configuration via CLI arguments or TOML file

mod config;
mod protocols;
mod server;

use config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    server::start(&config.host, config.port).await?;
    Ok(())
}
