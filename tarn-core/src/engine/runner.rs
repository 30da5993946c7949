//! The trading orchestrator: initialization sequence and the main loop.
//!
//! Wiring order matters: fetch the symbol universe, intern it, discover
//! routes, fetch balances, then hold off trading until every subscribed
//! symbol has delivered its first snapshot. The main loop drains the dirty
//! bitmap under the configured polling mode and drives execution
//! synchronously - one cycle completes or rolls back before the next is
//! considered.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::config::{Config, PollingMode};
use crate::core::Signal;
use crate::data::{DirtySet, MarketDataAdapter, PriceBook, SymbolRegistry};
use crate::exchange::{OrderSizer, Symbol, SymbolDocument, SymbolFilters};
use crate::execution::{Broker, ExecutionEngine, OrderTransport, TradeJournal};
use crate::strategy::Strategy;

/// Blocking-mode wait timeout; bounds shutdown latency.
const WAIT_TIMEOUT: Duration = Duration::from_millis(100);
/// How long initialization waits for the initial snapshot barrier.
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(30);

/// REST admin collaborator: symbol universe and account balances.
pub trait Admin: Send + Sync {
    fn fetch_symbols(&self) -> Result<Vec<SymbolDocument>>;
    fn fetch_balances(&self) -> Result<HashMap<String, f64>>;
}

pub struct Runner<S: Strategy> {
    strategy: S,
    admin: Arc<dyn Admin>,
    book: Arc<PriceBook>,
    broker: Arc<Broker>,
    journal: Arc<TradeJournal>,
    exec: ExecutionEngine,
    sizer: OrderSizer,
    registry: Option<Arc<SymbolRegistry>>,
    adapter: Option<Arc<MarketDataAdapter>>,
    balances: HashMap<String, f64>,
    polling_mode: PollingMode,
    spin_count: u32,
    shutdown: Arc<AtomicBool>,
}

impl<S: Strategy> Runner<S> {
    pub fn new(
        config: &Config,
        strategy: S,
        admin: Arc<dyn Admin>,
        transport: Arc<dyn OrderTransport>,
    ) -> Result<Self> {
        let book = Arc::new(PriceBook::new());
        let broker = Arc::new(Broker::new(transport, config.strategy.live_mode));
        let journal = Arc::new(TradeJournal::new(&config.persistence.trade_log_dir)?);
        let exec = ExecutionEngine::new(
            Arc::clone(&broker),
            Arc::clone(&journal),
            config.execution.to_execution_config(),
        );

        info!(
            "[Runner] created (liveMode={}, pollingMode={:?})",
            config.strategy.live_mode, config.performance.polling_mode
        );

        Ok(Self {
            strategy,
            admin,
            book,
            broker,
            journal,
            exec,
            sizer: OrderSizer::new(),
            registry: None,
            adapter: None,
            balances: HashMap::new(),
            polling_mode: config.performance.polling_mode,
            spin_count: config.performance.busy_poll_spin_count,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Fetch the universe, build registry/sizer/routes, pull balances, and
    /// return the market-data adapter for the session layer to feed.
    pub fn initialize(&mut self) -> Result<Arc<MarketDataAdapter>> {
        info!("[Runner] initializing...");

        let documents = self.admin.fetch_symbols().context("fetching exchange info")?;
        info!("[Runner] exchange info: {} symbol documents", documents.len());

        let mut registry = SymbolRegistry::new();
        let mut universe: Vec<Arc<Symbol>> = Vec::new();
        self.sizer.clear();

        for doc in &documents {
            if !doc.is_trading() || doc.base_asset.is_empty() || doc.quote_asset.is_empty() {
                continue;
            }
            let id = registry
                .register(&doc.symbol)
                .context("registering symbol universe")?;
            let filters = SymbolFilters::from_json(&doc.filters);
            self.sizer.add_symbol(id, filters.clone());
            universe.push(Arc::new(Symbol::new(
                id,
                &doc.base_asset,
                &doc.quote_asset,
                &doc.symbol,
                filters,
            )));
        }
        info!("[Runner] loaded {} tradable symbols", universe.len());

        self.strategy.discover_routes(&universe);

        self.refresh_balances();
        let starting_asset = self.strategy.starting_asset().to_owned();
        match self.balances.get(&starting_asset) {
            Some(balance) => {
                info!("[Runner] starting asset {} balance: {:.8}", starting_asset, balance)
            }
            None => {
                warn!("[Runner] no balance for starting asset {}", starting_asset);
                self.balances.insert(starting_asset, 0.0);
            }
        }

        let registry = Arc::new(registry);
        let adapter = Arc::new(MarketDataAdapter::new(
            Arc::clone(&self.book),
            Arc::clone(&registry),
        ));
        adapter.set_expected_symbols(&self.strategy.route_symbols());

        self.registry = Some(registry);
        self.adapter = Some(Arc::clone(&adapter));
        info!("[Runner] initialization complete");
        Ok(adapter)
    }

    /// Flag checked after every wait; flip from any thread to stop the loop.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn book(&self) -> &Arc<PriceBook> {
        &self.book
    }

    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    pub fn journal(&self) -> &Arc<TradeJournal> {
        &self.journal
    }

    pub fn registry(&self) -> Option<&Arc<SymbolRegistry>> {
        self.registry.as_ref()
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Main loop: wait for updates, evaluate, execute. Returns when the
    /// shutdown flag is set or the starting-asset balance is exhausted.
    pub fn run(&mut self) -> Result<()> {
        let adapter = self
            .adapter
            .clone()
            .context("run() requires initialize() first")?;
        self.wait_for_snapshots(&adapter);

        info!("[Runner] entering main loop ({:?})", self.polling_mode);
        loop {
            if self.shutdown.load(Ordering::Acquire) {
                info!("[Runner] shutdown requested");
                break;
            }

            let dirty = self.wait_for_updates();
            if self.shutdown.load(Ordering::Acquire) {
                info!("[Runner] shutdown requested");
                break;
            }
            if dirty.is_empty() {
                continue;
            }

            let starting_asset = self.strategy.starting_asset();
            let balance = self.balances.get(starting_asset).copied().unwrap_or(0.0);
            if balance <= 0.0 {
                warn!(
                    "[Runner] no {} balance left to trade with; stopping",
                    starting_asset
                );
                break;
            }
            let stake = self.strategy.risk() * balance;

            let signal = self
                .strategy
                .on_update(&dirty, &self.book, stake, &self.sizer);
            if let Some(signal) = signal {
                self.execute_cycle(&signal);
            }
        }

        info!("[Runner] main loop done");
        Ok(())
    }

    fn wait_for_updates(&self) -> DirtySet {
        match self.polling_mode {
            PollingMode::Blocking => self.book.wait_blocking(Some(WAIT_TIMEOUT)),
            PollingMode::Hybrid => self.book.wait_spin(self.spin_count, Some(WAIT_TIMEOUT)),
            PollingMode::BusyPoll => self.book.wait_busy(),
        }
    }

    fn wait_for_snapshots(&self, adapter: &MarketDataAdapter) {
        info!("[Runner] waiting for market data snapshots...");
        let complete = adapter.wait_all_snapshots(SNAPSHOT_TIMEOUT);
        let (received, expected) = adapter.snapshot_progress();
        if complete {
            info!("[Runner] all snapshots received ({received}/{expected})");
        } else {
            warn!("[Runner] snapshot timeout, received {received}/{expected}");
        }
    }

    /// Drive one cycle and reconcile balances afterwards regardless of the
    /// outcome.
    fn execute_cycle(&mut self, signal: &Signal) {
        let starting_asset = self.strategy.starting_asset().to_owned();
        let balance_before = self.balances.get(&starting_asset).copied().unwrap_or(0.0);

        info!("[Runner] executing in {} mode", if self.broker.is_live() { "LIVE" } else { "TEST" });

        let result = {
            let fee_pct_for = |symbol: &str| self.strategy.fee_pct(symbol);
            self.exec.execute(signal, &self.sizer, &fee_pct_for)
        };

        // Either way the exchange may hold different balances now.
        self.refresh_balances();

        match result {
            Ok(outcome) => {
                let balance_after = self.balances.get(&starting_asset).copied().unwrap_or(0.0);
                let actual_pnl = balance_after - balance_before;
                let actual_pnl_pct = if outcome.initial_stake > 0.0 {
                    actual_pnl / outcome.initial_stake * 100.0
                } else {
                    0.0
                };
                info!("[Runner] ===== execution summary =====");
                info!(
                    "[Runner] {} balance: {:.8} -> {:.8}",
                    starting_asset, balance_before, balance_after
                );
                info!("[Runner] actual pnl:      {:.8} ({:+.4}%)", actual_pnl, actual_pnl_pct);
                info!(
                    "[Runner] traced pnl:      {:.8} ({:+.4}%)",
                    outcome.traced_pnl, outcome.traced_pnl_pct
                );
                info!("[Runner] theoretical pnl: {:.8}", signal.pnl);
            }
            Err(err) => {
                // The cycle error is logged and absorbed; only loop-level
                // failures stop trading.
                error!("[Runner] cycle failed: {err}");
            }
        }
    }

    fn refresh_balances(&mut self) {
        match self.admin.fetch_balances() {
            Ok(balances) => {
                info!("[Runner] loaded {} non-zero balances", balances.len());
                self.balances = balances;
            }
            Err(err) => {
                warn!("[Runner] balance refresh failed: {err:#}");
            }
        }
        let starting_asset = self.strategy.starting_asset().to_owned();
        self.balances.entry(starting_asset).or_insert(0.0);
    }
}
