//! Common utilities for the binaries: CLI arguments, paper-trading
//! collaborators, and the synthetic market-data feed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use rand::Rng;
use tarn_core::exchange::{ExchangeInfo, SymbolDocument};
use tarn_core::{Admin, MarketDataAdapter, OrderTransport, Way};

#[derive(Parser, Debug)]
#[command(author, version, about = "tarn triangular-arbitrage trader")]
pub struct TraderArgs {
    /// Path to the INI configuration file
    #[arg(long)]
    pub config: PathBuf,

    /// Log level when RUST_LOG is unset
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Emit JSON logs
    #[arg(long)]
    pub json_logs: bool,
}

/// Admin client backed by an exchange-info fixture file and a single
/// configured balance. Stands in for the REST admin endpoint in paper mode.
pub struct FixtureAdmin {
    documents: Vec<SymbolDocument>,
    balances: HashMap<String, f64>,
}

impl FixtureAdmin {
    pub fn from_file(path: &Path, starting_asset: &str, initial_balance: f64) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading exchange-info fixture {}", path.display()))?;
        let info: ExchangeInfo =
            serde_json::from_str(&raw).context("parsing exchange-info fixture")?;
        Ok(Self {
            documents: info.symbols,
            balances: HashMap::from([(starting_asset.to_owned(), initial_balance)]),
        })
    }
}

impl Admin for FixtureAdmin {
    fn fetch_symbols(&self) -> Result<Vec<SymbolDocument>> {
        Ok(self.documents.clone())
    }

    fn fetch_balances(&self) -> Result<HashMap<String, f64>> {
        Ok(self.balances.clone())
    }
}

/// Order transport for paper mode. The broker's test mode synthesizes
/// fills before ever consulting the transport, so reaching this is a
/// configuration error.
pub struct PaperTransport;

impl OrderTransport for PaperTransport {
    fn send_market(&self, _: &str, _: &str, _: Way, _: f64) -> Result<()> {
        anyhow::bail!("no live order transport in this build")
    }
}

/// Drive the adapter with snapshots followed by `ticks` random-walk
/// incremental updates, then request shutdown. Prices are synthetic; the
/// point is exercising the full pipeline, and the walk occasionally opens
/// a triangle wide enough to trade.
pub fn run_synthetic_feed(
    adapter: Arc<MarketDataAdapter>,
    symbols: Vec<String>,
    ticks: u64,
    shutdown: Arc<AtomicBool>,
) {
    if symbols.is_empty() {
        shutdown.store(true, Ordering::Release);
        return;
    }

    let mut rng = rand::thread_rng();
    let mut mids: HashMap<String, f64> = symbols
        .iter()
        .map(|s| (s.clone(), seed_price(s)))
        .collect();

    for symbol in &symbols {
        let mid = mids[symbol];
        adapter.on_snapshot(symbol, mid * 0.9999, mid * 1.0001);
    }

    for i in 0..ticks {
        let symbol = &symbols[i as usize % symbols.len()];
        let mid = mids.get_mut(symbol).unwrap();
        *mid *= 1.0 + rng.gen_range(-3e-4..3e-4);
        adapter.on_incremental(symbol, *mid * 0.9999, *mid * 1.0001);
        std::thread::sleep(Duration::from_micros(200));
    }

    shutdown.store(true, Ordering::Release);
}

/// Deterministic pseudo-price per symbol so runs are comparable.
fn seed_price(symbol: &str) -> f64 {
    let hash = symbol
        .bytes()
        .fold(2166136261u32, |acc, b| (acc ^ b as u32).wrapping_mul(16777619));
    1.0 + (hash % 10_000) as f64 / 10.0
}
