//! The trader: load config, wire the paper-mode collaborators, and run the
//! arbitrage loop until the synthetic session ends.
//!
//! Live mode needs a FIX transport, which is deployed as a separate
//! integration; this binary refuses to start with `liveMode = true`.

use std::sync::Arc;
use std::thread;

use anyhow::{bail, Result};
use clap::Parser;
use tarn_bins::common::{run_synthetic_feed, FixtureAdmin, PaperTransport, TraderArgs};
use tarn_core::utils::init_logger;
use tarn_core::{Config, Runner, Strategy, TriangularArb, TriangularArbConfig};

fn main() -> Result<()> {
    let args = TraderArgs::parse();
    init_logger(&args.log_level, args.json_logs);
    let config = Config::load(&args.config)?;

    tracing::info!("=== tarn trader ===");
    tracing::info!("config: {}", args.config.display());
    tracing::info!("starting asset: {}", config.strategy.starting_asset);

    if config.strategy.live_mode {
        bail!("liveMode=true requires the FIX order transport; this build ships the paper harness only");
    }

    let admin = Arc::new(FixtureAdmin::from_file(
        &config.simulation.exchange_info_path,
        &config.strategy.starting_asset,
        config.simulation.initial_balance,
    )?);

    let strategy = TriangularArb::new(TriangularArbConfig {
        starting_asset: config.strategy.starting_asset.clone(),
        default_fee: config.strategy.default_fee,
        risk: config.strategy.risk,
        min_profit_ratio: config.strategy.min_profit_ratio,
        symbol_fees: config.strategy.symbol_fees.clone(),
    });

    let mut runner = Runner::new(&config, strategy, admin, Arc::new(PaperTransport))?;
    let adapter = runner.initialize()?;

    let symbols = runner.strategy().route_symbols();
    if symbols.is_empty() {
        tracing::warn!("no arbitrage routes over this universe; nothing to trade");
    }

    let shutdown = runner.shutdown_handle();
    let ticks = config.simulation.feed_ticks;
    let feed = thread::spawn(move || run_synthetic_feed(adapter, symbols, ticks, shutdown));

    runner.run()?;
    if feed.join().is_err() {
        bail!("market data feed thread panicked");
    }

    tracing::info!("session complete");
    Ok(())
}
