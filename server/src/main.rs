//! Einstiegspunkt des Duplex-Servers
//!
//! Liest den Konfigurationspfad aus `DUPLEX_CONFIG`, richtet das Logging
//! ein und uebergibt an [`Server::starten`].

use anyhow::Result;
use duplex_server::config::{LoggingEinstellungen, ServerConfig};
use duplex_server::Server;

#[tokio::main]
async fn main() -> Result<()> {
    let config_pfad = std::env::var("DUPLEX_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = ServerConfig::laden(&config_pfad)?;

    logging_einrichten(&config.logging);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "Duplex Server startet"
    );

    Server::neu(config).starten().await
}

/// Richtet tracing-subscriber ein; `RUST_LOG` gewinnt gegen die Konfiguration
fn logging_einrichten(logging: &LoggingEinstellungen) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.format == "json" {
        fmt().json().with_env_filter(filter).init();
    } else {
        fmt().compact().with_env_filter(filter).init();
    }
}
