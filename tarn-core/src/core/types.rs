//! Market primitives: symbol ids, order direction, and the order value type.

use std::fmt;
use std::sync::Arc;

use crate::exchange::Symbol;

/// Dense integer symbol identifier used for O(1) array indexing.
///
/// Ids are handed out by [`crate::data::SymbolRegistry`] at initialization
/// and are stable for the lifetime of the process.
pub type SymbolId = u16;

/// Upper bound on registered symbols; sizes the price book slot array and
/// every per-symbol index table.
pub const MAX_SYMBOLS: usize = 4096;

/// Order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Way {
    Buy,
    Sell,
}

impl Way {
    /// The opposite direction, used when unwinding a filled leg.
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Way::Buy => Way::Sell,
            Way::Sell => Way::Buy,
        }
    }
}

impl fmt::Display for Way {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Way::Buy => write!(f, "BUY"),
            Way::Sell => write!(f, "SELL"),
        }
    }
}

/// Order kind. The engine only ever submits market orders; `Limit` exists so
/// order plumbing does not bake the assumption in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Market,
    Limit,
}

/// Best bid/ask pair as read from the price book. A zero side means that
/// side has not been observed yet.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BidAsk {
    pub bid: f64,
    pub ask: f64,
}

/// One leg of an arbitrage cycle.
///
/// `price` on market orders is the top-of-book estimate captured at
/// evaluation time, not an execution price. `qty` is always in base-asset
/// units, on both sides of the book.
#[derive(Debug, Clone)]
pub struct Order {
    pub symbol: Arc<Symbol>,
    pub way: Way,
    pub kind: OrderType,
    pub price: f64,
    pub qty: f64,
}

impl Order {
    pub fn new(symbol: Arc<Symbol>, way: Way) -> Self {
        Self {
            symbol,
            way,
            kind: OrderType::Market,
            price: 0.0,
            qty: 0.0,
        }
    }

    #[inline]
    pub fn symbol_id(&self) -> SymbolId {
        self.symbol.id
    }

    /// Asset this order spends: quote when buying, base when selling.
    pub fn starting_asset(&self) -> &str {
        match self.way {
            Way::Buy => &self.symbol.quote,
            Way::Sell => &self.symbol.base,
        }
    }

    /// Asset this order yields: base when buying, quote when selling.
    pub fn resulting_asset(&self) -> &str {
        match self.way {
            Way::Buy => &self.symbol.base,
            Way::Sell => &self.symbol.quote,
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.way, self.symbol.name)
    }
}
