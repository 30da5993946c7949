//! tarn-core - latency-sensitive triangular-arbitrage engine for a spot
//! crypto exchange.
//!
//! The engine consumes best-bid/ask updates for thousands of instruments,
//! screens pre-computed three-leg circular paths that start and end in a
//! configured asset, and executes the rare profitable cycle as three serial
//! market orders with LIFO rollback on any leg failure.
//!
//! ## Hot path
//!
//! ```text
//! market data ──▶ MarketDataAdapter ──▶ PriceBook (seqlock slots)
//!                                          │  dirty bitmap + condvar
//!                                          ▼
//!                            Strategy thread: PathPool.affected(bitmap)
//!                                          │  refresh ▸ fast_ratio screen
//!                                          ▼
//!                              ArbitragePath::evaluate (lot rounding, fees)
//!                                          │  best Signal
//!                                          ▼
//!                    ExecutionEngine ──▶ Broker ──▶ TradeJournal (CSV)
//! ```
//!
//! Readers of the price book are wait-free: each symbol id owns a
//! cache-line-aligned seqlock slot written by a single market-data thread.
//! The strategy thread never touches a slot it wasn't woken for - the dirty
//! bitmap plus an inverted symbol→path index bounds each evaluation round
//! to the paths actually affected.
//!
//! ## Failure model
//!
//! Execution is strictly serial. A leg that rejects, times out, or fills
//! below tolerance stops the cycle; already-filled legs (including the
//! failing leg's partial fill) are unwound in reverse with opposite-side
//! market orders sized to the real fills. Every submitted leg and rollback
//! leg lands in a daily-rotated CSV journal, flushed per record.
//!
//! ## Modules
//!
//! - [`core`] - plain types: ids, orders, signals, domain errors
//! - [`data`] - symbol registry, seqlock price book, market-data adapter
//! - [`exchange`] - symbol metadata, trading filters, order sizing
//! - [`strategy`] - path discovery, indexed path pool, the triangular strategy
//! - [`execution`] - broker adapter, three-leg engine with rollback, journal
//! - [`engine`] - the runner wiring it all together
//! - [`config`] - INI configuration
//! - [`testing`] - fixtures and scripted mocks shared by the test suites

pub mod config;
pub mod core;
pub mod data;
pub mod engine;
pub mod exchange;
pub mod execution;
pub mod strategy;
pub mod testing;
pub mod utils;

pub use crate::core::{BidAsk, Order, OrderType, Signal, SymbolId, Way, MAX_SYMBOLS};
pub use config::Config;
pub use data::{DirtySet, MarketDataAdapter, PriceBook, SymbolRegistry};
pub use engine::{Admin, Runner};
pub use exchange::{OrderSizer, Symbol, SymbolFilters};
pub use execution::{Broker, ExecutionConfig, ExecutionEngine, OrderTransport, TradeJournal};
pub use strategy::{Strategy, TriangularArb, TriangularArbConfig};

/// Convenience re-exports for binaries and tests.
pub mod prelude {
    pub use crate::config::{Config, PollingMode};
    pub use crate::core::{Order, Signal, SymbolId, Way};
    pub use crate::data::{DirtySet, MarketDataAdapter, PriceBook, SymbolRegistry};
    pub use crate::engine::{Admin, Runner};
    pub use crate::exchange::{OrderSizer, Symbol, SymbolDocument, SymbolFilters};
    pub use crate::execution::{Broker, ExecutionEngine, OrderTransport, TradeJournal};
    pub use crate::strategy::{Strategy, TriangularArb, TriangularArbConfig};
}
