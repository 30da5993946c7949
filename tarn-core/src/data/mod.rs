//! Market-data layer: symbol interning, the lock-free price book, and the
//! adapter that feeds it.

pub mod feed;
pub mod price_book;
pub mod registry;

pub use feed::MarketDataAdapter;
pub use price_book::{DirtySet, PriceBook};
pub use registry::SymbolRegistry;
