//! Enumerates circular trade routes over the symbol graph.
//!
//! Breadth-first over asset states: every symbol touching the current asset
//! extends a partial route with a directed leg, instruments never repeat
//! within a route, and the final extension must land back on the starting
//! asset.

use std::sync::Arc;

use tracing::info;

use crate::core::{Order, Way};
use crate::exchange::Symbol;

/// All single-leg trades that spend `asset`: sell where it is the base,
/// buy where it is the quote.
pub fn possible_orders(asset: &str, symbols: &[Arc<Symbol>]) -> Vec<Order> {
    let mut orders = Vec::new();
    for symbol in symbols {
        if asset == symbol.base {
            orders.push(Order::new(Arc::clone(symbol), Way::Sell));
        } else if asset == symbol.quote {
            orders.push(Order::new(Arc::clone(symbol), Way::Buy));
        }
    }
    orders
}

/// Enumerate every route of exactly `depth` legs that starts and ends in
/// `starting_asset`, visiting `depth` distinct instruments.
pub fn compute_paths(
    symbols: &[Arc<Symbol>],
    starting_asset: &str,
    depth: usize,
) -> Vec<Vec<Order>> {
    let mut routes: Vec<Vec<Order>> = possible_orders(starting_asset, symbols)
        .into_iter()
        .map(|order| vec![order])
        .collect();

    for step in 0..depth.saturating_sub(1) {
        let closing_step = step + 2 == depth;
        let mut extended = Vec::new();

        for route in &routes {
            let last = route.last().expect("routes are never empty");
            let current_asset = last.resulting_asset().to_owned();

            let unused: Vec<Arc<Symbol>> = symbols
                .iter()
                .filter(|symbol| !route.iter().any(|order| order.symbol == **symbol))
                .cloned()
                .collect();

            for next in possible_orders(&current_asset, &unused) {
                if closing_step && next.resulting_asset() != starting_asset {
                    continue;
                }
                let mut new_route = route.clone();
                new_route.push(next);
                extended.push(new_route);
            }
        }

        routes = extended;
    }

    info!(
        "[Discovery] {} routes of depth {} from asset {}",
        routes.len(),
        depth,
        starting_asset
    );
    routes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::SymbolFilters;

    fn symbol(id: u16, base: &str, quote: &str) -> Arc<Symbol> {
        Arc::new(Symbol::new(
            id,
            base,
            quote,
            &format!("{base}{quote}"),
            SymbolFilters::default(),
        ))
    }

    fn triangle_universe() -> Vec<Arc<Symbol>> {
        vec![
            symbol(0, "BTC", "USDT"),
            symbol(1, "ETH", "BTC"),
            symbol(2, "ETH", "USDT"),
        ]
    }

    #[test]
    fn possible_orders_assigns_direction_by_side() {
        let universe = triangle_universe();
        let orders = possible_orders("BTC", &universe);

        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].symbol.name, "BTCUSDT");
        assert_eq!(orders[0].way, Way::Sell);
        assert_eq!(orders[1].symbol.name, "ETHBTC");
        assert_eq!(orders[1].way, Way::Buy);
    }

    #[test]
    fn finds_both_directions_of_a_triangle() {
        let routes = compute_paths(&triangle_universe(), "USDT", 3);
        assert_eq!(routes.len(), 2);

        let described: Vec<String> = routes
            .iter()
            .map(|route| {
                route
                    .iter()
                    .map(|o| o.to_string())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect();
        assert!(described.contains(&"BUY@BTCUSDT BUY@ETHBTC SELL@ETHUSDT".to_owned()));
        assert!(described.contains(&"BUY@ETHUSDT SELL@ETHBTC SELL@BTCUSDT".to_owned()));
    }

    #[test]
    fn every_route_closes_on_the_starting_asset() {
        let routes = compute_paths(&triangle_universe(), "USDT", 3);
        for route in &routes {
            assert_eq!(route[0].starting_asset(), "USDT");
            assert_eq!(route[2].resulting_asset(), "USDT");
            for pair in route.windows(2) {
                assert_eq!(pair[0].resulting_asset(), pair[1].starting_asset());
            }
        }
    }

    #[test]
    fn instruments_never_repeat_within_a_route() {
        let routes = compute_paths(&triangle_universe(), "USDT", 3);
        for route in &routes {
            let mut names: Vec<&str> = route.iter().map(|o| o.symbol.name.as_str()).collect();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), 3);
        }
    }

    #[test]
    fn no_routes_without_a_closing_leg() {
        // No ETHBTC cross: USDT -> BTC and USDT -> ETH cannot connect.
        let universe = vec![symbol(0, "BTC", "USDT"), symbol(1, "ETH", "USDT")];
        assert!(compute_paths(&universe, "USDT", 3).is_empty());
    }
}
