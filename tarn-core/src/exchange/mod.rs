//! Exchange-facing metadata: symbols, trading filters, and order sizing.

pub mod filters;
pub mod sizer;
pub mod symbol;

pub use filters::{LotFilter, MinNotionalFilter, NotionalFilter, PriceFilter, SymbolFilters};
pub use sizer::{AdjustedOrder, OrderSizer, OrderValidation};
pub use symbol::{ExchangeInfo, Symbol, SymbolDocument};
