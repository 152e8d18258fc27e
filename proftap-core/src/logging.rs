//! Tracing setup for operator-facing diagnostics.
//!
//! Lifecycle operations log one line each (`<timestamp> <level> <target>:
//! <message>`) to stdout. `RUST_LOG` overrides the default filter; the
//! rendered format is not a stability contract.

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. Call once, from the embedding binary.
pub fn init_tracing(default_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .context("invalid log filter")?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .context("failed to install global tracing subscriber")?;

    Ok(())
}
