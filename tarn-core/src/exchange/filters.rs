//! Per-symbol exchange trading rules: tick size, lot step, and notional
//! bounds, with the rounding and validation they imply.
//!
//! All rounding floors to the step grid; a step (or bound) of zero means
//! that rule is inactive. Divisibility checks tolerate 1e-10 of floating
//! noise, matching what exchanges accept on the wire.

use serde_json::Value;

/// Number of fractional decimal digits implied by a step or tick size.
fn step_precision(step: f64) -> u32 {
    if step <= 0.0 {
        return 0;
    }
    let mut s = step;
    let mut precision = 0;
    while s < 1.0 && precision < 10 {
        s *= 10.0;
        precision += 1;
    }
    precision
}

/// Whether `value` sits on the `step` grid, within 1e-10 of floating noise
/// on either side of a grid point.
fn on_grid(value: f64, step: f64) -> bool {
    let rem = value % step;
    rem < 1e-10 || (step - rem) < 1e-10
}

/// Numeric field that may arrive as a JSON string or number.
fn num_field(entry: &Value, key: &str) -> f64 {
    match entry.get(key) {
        Some(Value::String(s)) => s.parse().unwrap_or(0.0),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn bool_field(entry: &Value, key: &str, default: bool) -> bool {
    match entry.get(key) {
        Some(Value::Bool(b)) => *b,
        _ => default,
    }
}

/// PRICE_FILTER: price grid and bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PriceFilter {
    pub min_price: f64,
    pub max_price: f64,
    pub tick_size: f64,
    pub precision: u32,
}

impl PriceFilter {
    pub fn is_active(&self) -> bool {
        self.tick_size > 0.0 || self.min_price > 0.0 || self.max_price > 0.0
    }

    /// Floor to the tick grid, clamped to the configured bounds.
    pub fn round_price(&self, price: f64) -> f64 {
        if self.tick_size <= 0.0 {
            return price;
        }
        let mut rounded = (price / self.tick_size).floor() * self.tick_size;
        if self.min_price > 0.0 {
            rounded = rounded.max(self.min_price);
        }
        if self.max_price > 0.0 {
            rounded = rounded.min(self.max_price);
        }
        rounded
    }

    pub fn validate_price(&self, price: f64) -> bool {
        if self.min_price > 0.0 && price < self.min_price {
            return false;
        }
        if self.max_price > 0.0 && price > self.max_price {
            return false;
        }
        if self.tick_size > 0.0 && !on_grid(price, self.tick_size) {
            return false;
        }
        true
    }
}

/// LOT_SIZE / MARKET_LOT_SIZE: quantity grid and bounds. The same shape
/// serves both; market orders prefer the market variant when present.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LotFilter {
    pub min_qty: f64,
    pub max_qty: f64,
    pub step_size: f64,
    pub precision: u32,
}

impl LotFilter {
    pub fn is_active(&self) -> bool {
        self.step_size > 0.0 || self.min_qty > 0.0 || self.max_qty > 0.0
    }

    /// Floor to the step grid, clamped to the configured bounds.
    pub fn round_qty(&self, qty: f64) -> f64 {
        if self.step_size <= 0.0 {
            return qty;
        }
        let mut rounded = (qty / self.step_size).floor() * self.step_size;
        if self.min_qty > 0.0 {
            rounded = rounded.max(self.min_qty);
        }
        if self.max_qty > 0.0 {
            rounded = rounded.min(self.max_qty);
        }
        rounded
    }

    pub fn validate_qty(&self, qty: f64) -> bool {
        if self.min_qty > 0.0 && qty < self.min_qty {
            return false;
        }
        if self.max_qty > 0.0 && qty > self.max_qty {
            return false;
        }
        if self.step_size > 0.0 && !on_grid(qty, self.step_size) {
            return false;
        }
        true
    }
}

/// MIN_NOTIONAL: lower bound on price * qty, optionally waived for market
/// orders.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinNotionalFilter {
    pub min_notional: f64,
    pub apply_to_market: bool,
}

impl Default for MinNotionalFilter {
    fn default() -> Self {
        Self {
            min_notional: 0.0,
            apply_to_market: true,
        }
    }
}

impl MinNotionalFilter {
    pub fn is_active(&self) -> bool {
        self.min_notional > 0.0
    }

    pub fn validate(&self, price: f64, qty: f64, is_market: bool) -> bool {
        if !self.is_active() {
            return true;
        }
        if is_market && !self.apply_to_market {
            return true;
        }
        price * qty >= self.min_notional
    }

    pub fn min_qty_for_price(&self, price: f64) -> f64 {
        if price <= 0.0 || self.min_notional <= 0.0 {
            return 0.0;
        }
        self.min_notional / price
    }
}

/// NOTIONAL: two-sided bound on price * qty with per-side market flags.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NotionalFilter {
    pub min_notional: f64,
    pub max_notional: f64,
    pub apply_min_to_market: bool,
    pub apply_max_to_market: bool,
}

impl NotionalFilter {
    pub fn is_active(&self) -> bool {
        self.min_notional > 0.0 || self.max_notional > 0.0
    }

    pub fn validate(&self, price: f64, qty: f64, is_market: bool) -> bool {
        let notional = price * qty;
        if self.min_notional > 0.0 && (!is_market || self.apply_min_to_market) && notional < self.min_notional {
            return false;
        }
        if self.max_notional > 0.0 && (!is_market || self.apply_max_to_market) && notional > self.max_notional {
            return false;
        }
        true
    }
}

/// The full rule set for one symbol.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolFilters {
    pub price: PriceFilter,
    pub lot: LotFilter,
    pub market_lot: LotFilter,
    pub min_notional: MinNotionalFilter,
    pub notional: NotionalFilter,
}

impl SymbolFilters {
    /// Interpret the filter array of an exchange-info symbol entry.
    /// Entries with an unrecognized `filterType` are ignored.
    pub fn from_json(filters: &[Value]) -> Self {
        let mut out = SymbolFilters::default();

        for entry in filters {
            let Some(filter_type) = entry.get("filterType").and_then(Value::as_str) else {
                continue;
            };

            match filter_type {
                "PRICE_FILTER" => {
                    out.price.min_price = num_field(entry, "minPrice");
                    out.price.max_price = num_field(entry, "maxPrice");
                    out.price.tick_size = num_field(entry, "tickSize");
                    out.price.precision = step_precision(out.price.tick_size);
                }
                "LOT_SIZE" => {
                    out.lot.min_qty = num_field(entry, "minQty");
                    out.lot.max_qty = num_field(entry, "maxQty");
                    out.lot.step_size = num_field(entry, "stepSize");
                    out.lot.precision = step_precision(out.lot.step_size);
                }
                "MARKET_LOT_SIZE" => {
                    out.market_lot.min_qty = num_field(entry, "minQty");
                    out.market_lot.max_qty = num_field(entry, "maxQty");
                    out.market_lot.step_size = num_field(entry, "stepSize");
                    out.market_lot.precision = step_precision(out.market_lot.step_size);
                }
                "MIN_NOTIONAL" => {
                    out.min_notional.min_notional = num_field(entry, "minNotional");
                    out.min_notional.apply_to_market = bool_field(entry, "applyToMarket", true);
                }
                "NOTIONAL" => {
                    out.notional.min_notional = num_field(entry, "minNotional");
                    out.notional.max_notional = num_field(entry, "maxNotional");
                    out.notional.apply_min_to_market = bool_field(entry, "applyMinToMarket", false);
                    out.notional.apply_max_to_market = bool_field(entry, "applyMaxToMarket", false);
                }
                _ => {}
            }
        }

        out
    }

    pub fn round_price(&self, price: f64) -> f64 {
        self.price.round_price(price)
    }

    pub fn round_qty(&self, qty: f64) -> f64 {
        self.lot.round_qty(qty)
    }

    /// Market orders use MARKET_LOT_SIZE when present, LOT_SIZE otherwise.
    pub fn round_market_qty(&self, qty: f64) -> f64 {
        if self.market_lot.is_active() {
            self.market_lot.round_qty(qty)
        } else {
            self.lot.round_qty(qty)
        }
    }

    pub fn validate_price(&self, price: f64) -> bool {
        self.price.validate_price(price)
    }

    pub fn validate_qty(&self, qty: f64) -> bool {
        self.lot.validate_qty(qty)
    }

    pub fn validate_market_qty(&self, qty: f64) -> bool {
        if self.market_lot.is_active() {
            self.market_lot.validate_qty(qty)
        } else {
            self.lot.validate_qty(qty)
        }
    }

    /// NOTIONAL wins over MIN_NOTIONAL when both are present.
    pub fn validate_notional(&self, price: f64, qty: f64, is_market: bool) -> bool {
        if self.notional.is_active() {
            self.notional.validate(price, qty, is_market)
        } else {
            self.min_notional.validate(price, qty, is_market)
        }
    }

    /// Smallest lot-rounded quantity whose notional clears the minimum at
    /// the given price. Rounds up by one step so flooring cannot dip back
    /// under the bound.
    pub fn min_qty_for_notional(&self, price: f64) -> f64 {
        let mut min_qty = self.lot.min_qty;
        if self.min_notional.is_active() {
            min_qty = min_qty.max(self.min_notional.min_qty_for_price(price));
        }
        if self.notional.min_notional > 0.0 && price > 0.0 {
            min_qty = min_qty.max(self.notional.min_notional / price);
        }
        self.lot.round_qty(min_qty + self.lot.step_size)
    }

    pub fn price_precision(&self) -> u32 {
        self.price.precision
    }

    pub fn qty_precision(&self) -> u32 {
        self.lot.precision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lot(step: f64, min: f64, max: f64) -> LotFilter {
        LotFilter {
            min_qty: min,
            max_qty: max,
            step_size: step,
            precision: step_precision(step),
        }
    }

    #[test]
    fn precision_from_step() {
        assert_eq!(step_precision(1.0), 0);
        assert_eq!(step_precision(0.1), 1);
        assert_eq!(step_precision(0.00001), 5);
        assert_eq!(step_precision(0.0), 0);
    }

    #[test]
    fn round_qty_floors_and_clamps() {
        let f = lot(0.01, 0.05, 100.0);
        assert!((f.round_qty(0.1234) - 0.12).abs() < 1e-12);
        // Below the minimum the clamp lifts it back up.
        assert!((f.round_qty(0.012) - 0.05).abs() < 1e-12);
        assert!((f.round_qty(250.0) - 100.0).abs() < 1e-12);
    }

    #[test]
    fn inactive_step_is_identity() {
        let f = lot(0.0, 0.0, 0.0);
        assert_eq!(f.round_qty(0.123456789), 0.123456789);
        assert!(f.validate_qty(0.123456789));
    }

    #[test]
    fn market_lot_falls_back_to_lot() {
        let mut filters = SymbolFilters::default();
        filters.lot = lot(0.1, 0.0, 0.0);
        assert!((filters.round_market_qty(0.55) - 0.5).abs() < 1e-12);

        filters.market_lot = lot(0.25, 0.0, 0.0);
        assert!((filters.round_market_qty(0.55) - 0.5).abs() < 1e-12);
        assert!((filters.round_market_qty(0.8) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn min_notional_skips_market_orders_when_flagged_off() {
        let f = MinNotionalFilter {
            min_notional: 10.0,
            apply_to_market: false,
        };
        assert!(f.validate(1.0, 5.0, true));
        assert!(!f.validate(1.0, 5.0, false));
        assert!(f.validate(2.0, 5.0, false));
    }

    #[test]
    fn notional_filter_overrides_min_notional() {
        let mut filters = SymbolFilters::default();
        filters.min_notional.min_notional = 5.0;
        filters.notional.min_notional = 20.0;
        filters.notional.apply_min_to_market = true;
        assert!(!filters.validate_notional(1.0, 10.0, true));
        assert!(filters.validate_notional(1.0, 25.0, true));
    }

    #[test]
    fn min_qty_for_notional_clears_the_bound() {
        let mut filters = SymbolFilters::default();
        filters.lot = lot(0.01, 0.0, 0.0);
        filters.min_notional.min_notional = 10.0;

        let qty = filters.min_qty_for_notional(3.0);
        assert!(qty * 3.0 >= 10.0);
        assert!(filters.validate_qty(qty));
    }

    #[test]
    fn from_json_parses_known_filters_and_ignores_others() {
        let raw = serde_json::json!([
            {"filterType": "PRICE_FILTER", "minPrice": "0.01", "maxPrice": "1000000", "tickSize": "0.01"},
            {"filterType": "LOT_SIZE", "minQty": "0.00001", "maxQty": 9000.0, "stepSize": "0.00001"},
            {"filterType": "MIN_NOTIONAL", "minNotional": "10", "applyToMarket": false},
            {"filterType": "ICEBERG_PARTS", "limit": 10},
            {"noFilterType": true}
        ]);
        let filters = SymbolFilters::from_json(raw.as_array().unwrap());

        assert_eq!(filters.price.tick_size, 0.01);
        assert_eq!(filters.price.precision, 2);
        assert_eq!(filters.lot.max_qty, 9000.0);
        assert_eq!(filters.lot.precision, 5);
        assert_eq!(filters.min_notional.min_notional, 10.0);
        assert!(!filters.min_notional.apply_to_market);
        assert!(!filters.market_lot.is_active());
    }

    proptest! {
        #[test]
        fn rounding_lands_on_grid(qty in 0.0f64..10_000.0, step_exp in 0u32..6) {
            let step = 10f64.powi(-(step_exp as i32));
            let f = lot(step, 0.0, 0.0);
            prop_assert!(f.validate_qty(f.round_qty(qty)));
        }

        #[test]
        fn rounding_never_increases_unclamped_qty(qty in 0.0f64..10_000.0, step_exp in 0u32..6) {
            let step = 10f64.powi(-(step_exp as i32));
            let f = lot(step, 0.0, 0.0);
            prop_assert!(f.round_qty(qty) <= qty + 1e-9);
        }
    }
}
