use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use venue_arb::config::AppConfig;
use venue_arb::execution::{SimulatedAdapter, VenueAdapter};
use venue_arb::model::Venue;
use venue_arb::orchestrator::Engine;
use venue_arb::persistence::InMemoryStore;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::from_env().context("loading configuration")?;
    info!(symbols = config.symbols.len(), "configuration loaded");

    let adapters = build_adapters(&config);
    let persistence = Arc::new(InMemoryStore::new());
    let engine = Engine::new(config, adapters, persistence, None);

    engine.start().await;
    info!("engine started, awaiting shutdown signal");

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutdown signal received");
    engine.shutdown().await;

    Ok(())
}

/// Builds the venue adapters the engine talks to. Simulated for now — a
/// real deployment swaps these for venue-specific `VenueAdapter`
/// implementations wired the same way.
fn build_adapters(config: &AppConfig) -> HashMap<Venue, Arc<dyn VenueAdapter>> {
    let mut adapters: HashMap<Venue, Arc<dyn VenueAdapter>> = HashMap::new();
    let a = Arc::new(SimulatedAdapter::new("venue_a", rust_decimal_macros::dec!(0.05)));
    let b = Arc::new(SimulatedAdapter::new("venue_b", rust_decimal_macros::dec!(0.05)));
    for symbol in &config.symbols {
        a.set_mid(&symbol.symbol, rust_decimal_macros::dec!(100.0));
        b.set_mid(&symbol.symbol, rust_decimal_macros::dec!(100.05));
    }
    adapters.insert(Venue::A, a);
    adapters.insert(Venue::B, b);
    adapters
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "venue_arb=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
