//! Standalone signaling relay service.
//!
//! Configuration comes from the environment:
//! - `TELECARE_RELAY_BIND`: listen address (default `127.0.0.1:8090`)
//! - `TELECARE_JOIN_BASE_URL`: base for generated join links
//! - `TELECARE_LOG_LEVEL` / `TELECARE_LOG_JSON`: logging

use telecare_infra_common::logging::{setup_logging, LoggingConfig};
use telecare_signal_relay::{api, RelayConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_logging(LoggingConfig::from_env("telecare-relay")?)?;

    let mut config = RelayConfig::default();
    if let Ok(bind) = std::env::var("TELECARE_RELAY_BIND") {
        config.bind_addr = bind.parse()?;
    }
    if let Ok(base) = std::env::var("TELECARE_JOIN_BASE_URL") {
        config.join_base_url = base;
    }

    api::serve(config).await?;
    Ok(())
}
