//! Arbitrage strategy layer: path discovery, the indexed path pool, and the
//! triangular strategy that screens and sizes opportunities.

pub mod discovery;
pub mod path;
pub mod triangular;

use std::sync::Arc;

use crate::core::Signal;
use crate::data::{DirtySet, PriceBook};
use crate::exchange::{OrderSizer, Symbol};

pub use discovery::{compute_paths, possible_orders};
pub use path::{ArbitragePath, PathPool};
pub use triangular::{TriangularArb, TriangularArbConfig};

/// Strategy seam between the runner and a concrete signal generator.
///
/// There is exactly one production implementation; the trait exists so the
/// runner and execution tests can substitute scripted strategies.
pub trait Strategy {
    /// Enumerate routes over the symbol universe. Called once at
    /// initialization, before market data subscription.
    fn discover_routes(&mut self, symbols: &[Arc<Symbol>]);

    /// React to a batch of price changes; returns the best signal, if any.
    fn on_update(
        &mut self,
        dirty: &DirtySet,
        book: &PriceBook,
        stake: f64,
        sizer: &OrderSizer,
    ) -> Option<Signal>;

    /// Asset every cycle starts and ends in.
    fn starting_asset(&self) -> &str;

    /// Fraction of the starting-asset balance committed per cycle.
    fn risk(&self) -> f64;

    /// Fee percentage charged on `symbol`, e.g. `0.1` for 0.1%.
    fn fee_pct(&self, symbol: &str) -> f64;

    /// Display names of every symbol referenced by a discovered route, for
    /// market-data subscription.
    fn route_symbols(&self) -> Vec<String>;
}
