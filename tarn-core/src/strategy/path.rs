//! A three-leg arbitrage path with cached prices, plus the pool that indexes
//! paths by the symbols they touch.

use std::sync::Arc;

use tracing::info;

use crate::core::{Order, OrderType, Signal, SymbolId, MAX_SYMBOLS};
use crate::data::{DirtySet, PriceBook};
use crate::exchange::OrderSizer;

/// One circular route of three legs.
///
/// Leg configuration (symbols, directions, fee multipliers) is fixed at
/// construction; only the price cache mutates, refreshed from the book on
/// the strategy thread. Paths hold ids and metadata only - never references
/// into the book or broker.
pub struct ArbitragePath {
    orders: Vec<Order>,
    symbol_ids: [SymbolId; 3],
    is_buy: [bool; 3],
    /// Pre-computed `1 - fee_pct/100` per leg.
    fee_mul: [f64; 3],
    description: String,

    // Price cache, refreshed per evaluation round.
    bids: [f64; 3],
    asks: [f64; 3],
    /// `1/ask` for buy legs, `bid` for sell legs; `0` when a side is unset.
    effective_mul: [f64; 3],
    prices_valid: bool,
}

impl ArbitragePath {
    /// Build from a discovered three-leg route. `fee_pct_for` returns the
    /// fee percentage for a symbol name (e.g. `0.1` for 0.1%).
    pub fn new(orders: Vec<Order>, fee_pct_for: &dyn Fn(&str) -> f64) -> Self {
        debug_assert_eq!(orders.len(), 3);

        let mut symbol_ids = [0; 3];
        let mut is_buy = [false; 3];
        let mut fee_mul = [1.0; 3];
        for (leg, order) in orders.iter().take(3).enumerate() {
            symbol_ids[leg] = order.symbol_id();
            is_buy[leg] = order.way == crate::core::Way::Buy;
            fee_mul[leg] = 1.0 - fee_pct_for(&order.symbol.name) / 100.0;
        }

        let description = orders
            .iter()
            .map(|o| o.to_string())
            .collect::<Vec<_>>()
            .join(" ");

        Self {
            orders,
            symbol_ids,
            is_buy,
            fee_mul,
            description,
            bids: [0.0; 3],
            asks: [0.0; 3],
            effective_mul: [0.0; 3],
            prices_valid: false,
        }
    }

    /// Pull fresh top-of-book prices for all three legs and recompute the
    /// per-leg multipliers. A missing side marks the whole cache invalid.
    pub fn refresh(&mut self, book: &PriceBook) {
        let (p0, p1, p2) = book.get_triple(self.symbol_ids);
        self.bids = [p0.bid, p1.bid, p2.bid];
        self.asks = [p0.ask, p1.ask, p2.ask];

        self.prices_valid = true;
        for leg in 0..3 {
            let mul = if self.is_buy[leg] {
                let ask = self.asks[leg];
                if ask > 0.0 {
                    1.0 / ask
                } else {
                    0.0
                }
            } else {
                self.bids[leg]
            };
            if mul <= 0.0 {
                self.prices_valid = false;
            }
            self.effective_mul[leg] = mul.max(0.0);
        }
    }

    /// Multiplicative return of the cycle at cached top-of-book prices with
    /// fees applied and no lot rounding. Zero when any price is missing.
    #[inline]
    pub fn fast_ratio(&self) -> f64 {
        if !self.prices_valid {
            return 0.0;
        }
        (self.effective_mul[0] * self.fee_mul[0])
            * (self.effective_mul[1] * self.fee_mul[1])
            * (self.effective_mul[2] * self.fee_mul[2])
    }

    /// Simulate the cycle with `stake` units of the starting asset, applying
    /// exchange lot rounding and per-leg fees. Returns a sized signal only
    /// when the simulated cycle ends above the stake.
    ///
    /// Buys round the post-fee base quantity they yield (validation only;
    /// the running amount stays unrounded); sells round the base quantity
    /// they spend, which truncates the running amount. Either rounding
    /// hitting zero kills the candidate.
    pub fn evaluate(&self, stake: f64, sizer: &OrderSizer) -> Option<Signal> {
        let mut amount = stake;
        let mut working_price = [0.0; 3];
        let mut working_qty = [0.0; 3];

        for leg in 0..3 {
            let bid = self.bids[leg];
            let ask = self.asks[leg];
            if bid <= 0.0 || ask <= 0.0 {
                return None;
            }

            let id = self.symbol_ids[leg];
            if self.is_buy[leg] {
                let price = ask;
                let raw_get = amount / price;
                let ending = raw_get * self.fee_mul[leg];
                let rounded_ending = sizer.round_market_qty(id, ending);
                if rounded_ending <= 0.0 {
                    return None;
                }
                working_price[leg] = price;
                working_qty[leg] = raw_get;
                amount = ending;
            } else {
                let price = bid;
                let rounded_sell = sizer.round_market_qty(id, amount);
                if rounded_sell <= 0.0 {
                    return None;
                }
                let raw_get = rounded_sell * price;
                working_price[leg] = price;
                working_qty[leg] = rounded_sell;
                amount = raw_get * self.fee_mul[leg];
            }
        }

        let pnl = amount - stake;
        if pnl <= 0.0 {
            return None;
        }

        let orders = self
            .orders
            .iter()
            .enumerate()
            .map(|(leg, order)| {
                let mut sized = order.clone();
                sized.kind = OrderType::Market;
                sized.price = working_price[leg];
                sized.qty = working_qty[leg];
                sized
            })
            .collect();
        Some(Signal::new(orders, self.description.clone(), pnl))
    }

    pub fn symbol_ids(&self) -> &[SymbolId; 3] {
        &self.symbol_ids
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn contains_symbol(&self, id: SymbolId) -> bool {
        self.symbol_ids.contains(&id)
    }

    pub fn prices_valid(&self) -> bool {
        self.prices_valid
    }
}

/// Owns every discovered path and an inverted index from symbol id to the
/// paths that reference it. Built once, then read-only at steady state.
pub struct PathPool {
    paths: Vec<ArbitragePath>,
    by_symbol: Vec<Vec<u32>>,
}

impl Default for PathPool {
    fn default() -> Self {
        Self::new()
    }
}

impl PathPool {
    pub fn new() -> Self {
        let mut by_symbol = Vec::with_capacity(MAX_SYMBOLS);
        by_symbol.resize_with(MAX_SYMBOLS, Vec::new);
        Self {
            paths: Vec::new(),
            by_symbol,
        }
    }

    pub fn add(&mut self, path: ArbitragePath) -> usize {
        self.paths.push(path);
        self.paths.len() - 1
    }

    /// Fill the symbol → paths index. Call once after the last `add`.
    pub fn build_index(&mut self) {
        for list in &mut self.by_symbol {
            list.clear();
        }
        for (idx, path) in self.paths.iter().enumerate() {
            for &id in path.symbol_ids() {
                self.by_symbol[id as usize].push(idx as u32);
            }
        }
        info!("[PathPool] indexed {} paths", self.paths.len());
    }

    /// Resolve a dirty bitmap to the set of affected path indices, each at
    /// most once. Order is unspecified.
    pub fn affected(&self, dirty: &DirtySet) -> Vec<u32> {
        let mut seen = vec![false; self.paths.len()];
        let mut result = Vec::with_capacity(64);

        for id in dirty.iter() {
            for &path_idx in &self.by_symbol[id as usize] {
                if !seen[path_idx as usize] {
                    seen[path_idx as usize] = true;
                    result.push(path_idx);
                }
            }
        }
        result
    }

    pub fn get_mut(&mut self, idx: u32) -> &mut ArbitragePath {
        &mut self.paths[idx as usize]
    }

    pub fn get(&self, idx: u32) -> &ArbitragePath {
        &self.paths[idx as usize]
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArbitragePath> {
        self.paths.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Way;
    use crate::exchange::{Symbol, SymbolFilters};

    fn symbol(id: u16, base: &str, quote: &str) -> Arc<Symbol> {
        Arc::new(Symbol::new(
            id,
            base,
            quote,
            &format!("{base}{quote}"),
            SymbolFilters::default(),
        ))
    }

    fn flat_fee(_: &str) -> f64 {
        0.1
    }

    /// USDT -> BTC -> ETH -> USDT.
    fn forward_path() -> ArbitragePath {
        let orders = vec![
            Order::new(symbol(0, "BTC", "USDT"), Way::Buy),
            Order::new(symbol(1, "ETH", "BTC"), Way::Buy),
            Order::new(symbol(2, "ETH", "USDT"), Way::Sell),
        ];
        ArbitragePath::new(orders, &flat_fee)
    }

    fn primed_book() -> PriceBook {
        let book = PriceBook::new();
        book.update(0, 50_000.0, 50_010.0);
        book.update(1, 0.0500, 0.0501);
        book.update(2, 2_600.0, 2_601.0);
        book
    }

    #[test]
    fn description_joins_legs() {
        let path = forward_path();
        assert_eq!(path.description(), "BUY@BTCUSDT BUY@ETHBTC SELL@ETHUSDT");
    }

    #[test]
    fn fast_ratio_matches_hand_computation() {
        let mut path = forward_path();
        path.refresh(&primed_book());
        assert!(path.prices_valid());

        let expected =
            (1.0 / 50_010.0) * (1.0 / 0.0501) * 2_600.0 * 0.999f64.powi(3);
        assert!((path.fast_ratio() - expected).abs() < 1e-12);
        assert!(path.fast_ratio() > 1.0);
    }

    #[test]
    fn fast_ratio_is_zero_without_prices() {
        let mut path = forward_path();
        let book = PriceBook::new();
        // Only two of three symbols have prices.
        book.update(0, 50_000.0, 50_010.0);
        book.update(1, 0.0500, 0.0501);
        path.refresh(&book);
        assert!(!path.prices_valid());
        assert_eq!(path.fast_ratio(), 0.0);
    }

    #[test]
    fn fast_ratio_is_one_on_consistent_triangle_without_fees() {
        let orders = vec![
            Order::new(symbol(0, "BTC", "USDT"), Way::Buy),
            Order::new(symbol(1, "ETH", "BTC"), Way::Buy),
            Order::new(symbol(2, "ETH", "USDT"), Way::Sell),
        ];
        let mut path = ArbitragePath::new(orders, &|_| 0.0);

        // Consistent rates: ETHUSDT = BTCUSDT * ETHBTC, zero spread.
        let book = PriceBook::new();
        book.update(0, 50_000.0, 50_000.0);
        book.update(1, 0.05, 0.05);
        book.update(2, 2_500.0, 2_500.0);
        path.refresh(&book);

        assert!((path.fast_ratio() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn evaluate_produces_sized_market_orders() {
        let mut path = forward_path();
        path.refresh(&primed_book());

        let sizer = OrderSizer::new();
        let signal = path.evaluate(1_000.0, &sizer).expect("profitable path");

        assert_eq!(signal.orders.len(), 3);
        assert!(signal.pnl > 0.0);
        for order in &signal.orders {
            assert_eq!(order.kind, OrderType::Market);
            assert!(order.qty > 0.0);
            assert!(order.price > 0.0);
        }
        // Buy legs are priced at the ask, sells at the bid.
        assert_eq!(signal.orders[0].price, 50_010.0);
        assert_eq!(signal.orders[1].price, 0.0501);
        assert_eq!(signal.orders[2].price, 2_600.0);
    }

    #[test]
    fn evaluate_some_implies_fast_ratio_above_one() {
        let mut path = forward_path();
        path.refresh(&primed_book());
        let sizer = OrderSizer::new();
        if path.evaluate(1_000.0, &sizer).is_some() {
            assert!(path.fast_ratio() > 1.0);
        } else {
            panic!("expected a signal under these prices");
        }
    }

    #[test]
    fn pool_affected_resolves_and_dedupes() {
        let mut pool = PathPool::new();
        pool.add(forward_path());
        let orders = vec![
            Order::new(symbol(2, "ETH", "USDT"), Way::Buy),
            Order::new(symbol(1, "ETH", "BTC"), Way::Sell),
            Order::new(symbol(0, "BTC", "USDT"), Way::Sell),
        ];
        pool.add(ArbitragePath::new(orders, &flat_fee));
        pool.build_index();

        // Both paths touch symbols 0 and 2; each index must appear once.
        let mut dirty = DirtySet::new();
        dirty.set(0);
        dirty.set(2);
        let mut affected = pool.affected(&dirty);
        affected.sort_unstable();
        assert_eq!(affected, vec![0, 1]);

        let none = pool.affected(&DirtySet::new());
        assert!(none.is_empty());
    }
}
