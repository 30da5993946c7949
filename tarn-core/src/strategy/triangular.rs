//! The triangular-arbitrage strategy: owns the path pool and turns dirty
//! bitmaps into sized signals.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, info};

use crate::core::Signal;
use crate::data::{DirtySet, PriceBook};
use crate::exchange::{OrderSizer, Symbol};
use crate::strategy::{compute_paths, ArbitragePath, PathPool, Strategy};

#[derive(Debug, Clone)]
pub struct TriangularArbConfig {
    pub starting_asset: String,
    /// Default fee in percent, e.g. 0.1 for 0.1%.
    pub default_fee: f64,
    /// Fraction of the starting-asset balance staked per cycle.
    pub risk: f64,
    /// Fast-ratio screen threshold; paths at or below it are skipped.
    pub min_profit_ratio: f64,
    /// Per-symbol fee overrides in percent.
    pub symbol_fees: HashMap<String, f64>,
}

impl Default for TriangularArbConfig {
    fn default() -> Self {
        Self {
            starting_asset: String::new(),
            default_fee: 0.1,
            risk: 1.0,
            min_profit_ratio: 1.0001,
            symbol_fees: HashMap::new(),
        }
    }
}

pub struct TriangularArb {
    config: TriangularArbConfig,
    pool: PathPool,
    route_symbols: BTreeSet<String>,
}

impl TriangularArb {
    pub fn new(config: TriangularArbConfig) -> Self {
        info!(
            "[TriangularArb] starting asset: {}, default fee: {}%, risk: {}, min profit ratio: {}",
            config.starting_asset, config.default_fee, config.risk, config.min_profit_ratio
        );
        Self {
            config,
            pool: PathPool::new(),
            route_symbols: BTreeSet::new(),
        }
    }

    pub fn pool(&self) -> &PathPool {
        &self.pool
    }
}

impl Strategy for TriangularArb {
    fn discover_routes(&mut self, symbols: &[Arc<Symbol>]) {
        info!(
            "[TriangularArb] discovering routes over {} symbols",
            symbols.len()
        );

        let routes = compute_paths(symbols, &self.config.starting_asset, 3);

        self.pool = PathPool::new();
        self.route_symbols.clear();

        let config = &self.config;
        let fee_for = |symbol: &str| {
            config
                .symbol_fees
                .get(symbol)
                .copied()
                .unwrap_or(config.default_fee)
        };
        for route in routes {
            for order in &route {
                self.route_symbols.insert(order.symbol.name.clone());
            }
            self.pool.add(ArbitragePath::new(route, &fee_for));
        }
        self.pool.build_index();

        info!(
            "[TriangularArb] {} paths over {} unique symbols",
            self.pool.len(),
            self.route_symbols.len()
        );
        for (idx, path) in self.pool.iter().enumerate() {
            info!("[TriangularArb] path {:>4}: {}", idx, path.description());
        }
    }

    fn on_update(
        &mut self,
        dirty: &DirtySet,
        book: &PriceBook,
        stake: f64,
        sizer: &OrderSizer,
    ) -> Option<Signal> {
        if stake <= 0.0 || self.pool.is_empty() {
            return None;
        }

        let affected = self.pool.affected(dirty);
        if affected.is_empty() {
            return None;
        }

        let mut best: Option<Signal> = None;
        for path_idx in affected {
            let path = self.pool.get_mut(path_idx);
            path.refresh(book);

            let ratio = path.fast_ratio();
            if ratio <= self.config.min_profit_ratio {
                continue;
            }
            debug!(
                "[TriangularArb] path {} passed screen, ratio={:.8}: {}",
                path_idx,
                ratio,
                path.description()
            );

            if let Some(signal) = path.evaluate(stake, sizer) {
                // Strict greater-than keeps the first-discovered path on ties.
                if best.as_ref().map_or(true, |b| signal.pnl > b.pnl) {
                    best = Some(signal);
                }
            }
        }

        if let Some(signal) = &best {
            info!(
                "[TriangularArb] opportunity: {} pnl={:.8}",
                signal.description, signal.pnl
            );
        }
        best
    }

    fn starting_asset(&self) -> &str {
        &self.config.starting_asset
    }

    fn risk(&self) -> f64 {
        self.config.risk
    }

    fn fee_pct(&self, symbol: &str) -> f64 {
        self.config
            .symbol_fees
            .get(symbol)
            .copied()
            .unwrap_or(self.config.default_fee)
    }

    fn route_symbols(&self) -> Vec<String> {
        self.route_symbols.iter().cloned().collect()
    }
}
