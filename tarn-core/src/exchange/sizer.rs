//! Order sizing against exchange filters, indexed by symbol id for the hot
//! path.

use tracing::debug;

use crate::core::{SymbolId, MAX_SYMBOLS};
use crate::exchange::SymbolFilters;

/// Result of validating an order against a symbol's filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderValidation {
    pub valid: bool,
    pub reason: String,
}

impl OrderValidation {
    pub fn success() -> Self {
        Self {
            valid: true,
            reason: String::new(),
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: reason.into(),
        }
    }
}

/// Order parameters after filter adjustment, with the validation verdict on
/// the adjusted values.
#[derive(Debug, Clone)]
pub struct AdjustedOrder {
    pub price: f64,
    pub qty: f64,
    pub was_adjusted: bool,
    pub validation: OrderValidation,
}

/// Maps symbols to their filters and answers rounding/validation queries in
/// O(1) by dense [`SymbolId`].
///
/// Populated once at initialization, read-only afterwards. Unknown symbols
/// round to the input unchanged so a missing filter set degrades to "no
/// constraint" rather than blocking evaluation.
pub struct OrderSizer {
    filters: Vec<Option<SymbolFilters>>,
}

impl Default for OrderSizer {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderSizer {
    pub fn new() -> Self {
        let mut filters = Vec::with_capacity(MAX_SYMBOLS);
        filters.resize_with(MAX_SYMBOLS, || None);
        Self { filters }
    }

    pub fn add_symbol(&mut self, id: SymbolId, filters: SymbolFilters) {
        debug!(
            "[OrderSizer] added id={}: lot_step={}, lot_prec={}, mkt_step={}",
            id, filters.lot.step_size, filters.lot.precision, filters.market_lot.step_size
        );
        self.filters[id as usize] = Some(filters);
    }

    pub fn has_symbol(&self, id: SymbolId) -> bool {
        self.filters[id as usize].is_some()
    }

    pub fn filters(&self, id: SymbolId) -> Option<&SymbolFilters> {
        self.filters[id as usize].as_ref()
    }

    pub fn symbol_count(&self) -> usize {
        self.filters.iter().filter(|f| f.is_some()).count()
    }

    pub fn clear(&mut self) {
        self.filters.iter_mut().for_each(|f| *f = None);
    }

    /// Round a limit-order quantity to the symbol's lot grid.
    pub fn round_qty(&self, id: SymbolId, qty: f64) -> f64 {
        match &self.filters[id as usize] {
            Some(f) => f.round_qty(qty),
            None => qty,
        }
    }

    /// Round a market-order quantity to the symbol's market lot grid.
    #[inline]
    pub fn round_market_qty(&self, id: SymbolId, qty: f64) -> f64 {
        match &self.filters[id as usize] {
            Some(f) => f.round_market_qty(qty),
            None => qty,
        }
    }

    /// Validate price, quantity, and notional without changing them.
    pub fn validate_order(
        &self,
        id: SymbolId,
        price: f64,
        qty: f64,
        is_market: bool,
    ) -> OrderValidation {
        let Some(filters) = &self.filters[id as usize] else {
            return OrderValidation::failure(format!("unknown symbol id {id}"));
        };

        if !is_market && !filters.validate_price(price) {
            return OrderValidation::failure(format!("price {price} fails PRICE_FILTER"));
        }

        let qty_ok = if is_market {
            filters.validate_market_qty(qty)
        } else {
            filters.validate_qty(qty)
        };
        if !qty_ok {
            let which = if is_market { "MARKET_LOT_SIZE" } else { "LOT_SIZE" };
            return OrderValidation::failure(format!("qty {qty} fails {which}"));
        }

        if !filters.validate_notional(price, qty, is_market) {
            return OrderValidation::failure(format!(
                "notional {} fails NOTIONAL filter",
                price * qty
            ));
        }

        OrderValidation::success()
    }

    /// Round an order onto the symbol's grids and lift the quantity to the
    /// notional minimum if it falls short, then validate the result.
    pub fn adjust_order(&self, id: SymbolId, price: f64, qty: f64, is_market: bool) -> AdjustedOrder {
        let Some(filters) = &self.filters[id as usize] else {
            return AdjustedOrder {
                price,
                qty,
                was_adjusted: false,
                validation: OrderValidation::failure(format!("unknown symbol id {id}")),
            };
        };

        let mut out = AdjustedOrder {
            price,
            qty,
            was_adjusted: false,
            validation: OrderValidation::success(),
        };

        if !is_market {
            let rounded = filters.round_price(price);
            if rounded != price {
                debug!("[OrderSizer] price adjusted: {} -> {}", price, rounded);
                out.price = rounded;
                out.was_adjusted = true;
            }
        }

        let rounded_qty = if is_market {
            filters.round_market_qty(qty)
        } else {
            filters.round_qty(qty)
        };
        if rounded_qty != qty {
            debug!("[OrderSizer] qty adjusted: {} -> {}", qty, rounded_qty);
            out.qty = rounded_qty;
            out.was_adjusted = true;
        }

        if out.price > 0.0 {
            let min_qty = filters.min_qty_for_notional(out.price);
            if out.qty < min_qty {
                let lifted = if is_market {
                    filters.round_market_qty(min_qty)
                } else {
                    filters.round_qty(min_qty)
                };
                if lifted > out.qty {
                    debug!("[OrderSizer] qty lifted for notional: {} -> {}", out.qty, lifted);
                    out.qty = lifted;
                    out.was_adjusted = true;
                }
            }
        }

        out.validation = self.validate_order(id, out.price, out.qty, is_market);
        out
    }
}
