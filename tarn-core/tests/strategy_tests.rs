//! End-to-end evaluation scenarios: dirty bitmap in, signal (or nothing)
//! out.

use std::collections::HashMap;
use std::sync::Arc;

use tarn_core::core::OrderType;
use tarn_core::exchange::SymbolDocument;
use tarn_core::strategy::Strategy;
use tarn_core::testing::triangle_universe;
use tarn_core::{
    DirtySet, OrderSizer, PriceBook, Symbol, SymbolFilters, SymbolRegistry, TriangularArb,
    TriangularArbConfig,
};

struct Setup {
    book: PriceBook,
    sizer: OrderSizer,
    strategy: TriangularArb,
    registry: SymbolRegistry,
}

fn setup(docs: &[SymbolDocument]) -> Setup {
    let mut registry = SymbolRegistry::new();
    let mut sizer = OrderSizer::new();
    let mut universe = Vec::new();

    for doc in docs {
        let id = registry.register(&doc.symbol).unwrap();
        let filters = SymbolFilters::from_json(&doc.filters);
        sizer.add_symbol(id, filters.clone());
        universe.push(Arc::new(Symbol::new(
            id,
            &doc.base_asset,
            &doc.quote_asset,
            &doc.symbol,
            filters,
        )));
    }

    let mut strategy = TriangularArb::new(TriangularArbConfig {
        starting_asset: "USDT".into(),
        default_fee: 0.1,
        risk: 1.0,
        min_profit_ratio: 1.0001,
        symbol_fees: HashMap::new(),
    });
    strategy.discover_routes(&universe);

    Setup {
        book: PriceBook::new(),
        sizer,
        strategy,
        registry,
    }
}

impl Setup {
    fn prime(&self, prices: &[(&str, f64, f64)]) -> DirtySet {
        for (name, bid, ask) in prices {
            let id = self.registry.id_of(name).unwrap();
            self.book.update(id, *bid, *ask);
        }
        self.book.try_drain().unwrap()
    }
}

/// BTCUSDT/ETHBTC/ETHUSDT with an ETHBTC ask cheap enough that
/// USDT -> BTC -> ETH -> USDT clears fees and spread.
#[test]
fn profitable_triangle_emits_a_sized_signal() {
    let mut s = setup(&triangle_universe(&[
        ("BTCUSDT", 0.00001),
        ("ETHBTC", 0.0001),
        ("ETHUSDT", 0.0001),
    ]));
    let dirty = s.prime(&[
        ("BTCUSDT", 50_000.0, 50_010.0),
        ("ETHBTC", 0.0500, 0.0501),
        ("ETHUSDT", 2_600.0, 2_601.0),
    ]);

    let signal = s
        .strategy
        .on_update(&dirty, &s.book, 1_000.0, &s.sizer)
        .expect("triangle should be profitable");

    assert_eq!(signal.description, "BUY@BTCUSDT BUY@ETHBTC SELL@ETHUSDT");
    // Gross edge ~3.8%, minus 3 x 0.1% fees and lot rounding.
    assert!(signal.pnl > 30.0 && signal.pnl < 40.0, "pnl={}", signal.pnl);

    assert_eq!(signal.orders.len(), 3);
    for order in &signal.orders {
        assert_eq!(order.kind, OrderType::Market);
        assert!(order.qty > 0.0);
    }
    // Buys priced at the ask, sells at the bid.
    assert_eq!(signal.orders[0].price, 50_010.0);
    assert_eq!(signal.orders[1].price, 0.0501);
    assert_eq!(signal.orders[2].price, 2_600.0);
}

/// Same topology, but the cross is priced so both directions lose after
/// fees.
#[test]
fn unprofitable_triangle_stays_quiet() {
    let mut s = setup(&triangle_universe(&[]));
    let dirty = s.prime(&[
        ("BTCUSDT", 50_000.0, 50_010.0),
        ("ETHBTC", 0.0519, 0.0520),
        ("ETHUSDT", 2_600.0, 2_601.0),
    ]);

    assert!(s
        .strategy
        .on_update(&dirty, &s.book, 1_000.0, &s.sizer)
        .is_none());
}

/// The reverse direction passes the fast screen, but a coarse lot step on
/// the middle (sell) leg truncates enough quantity to erase the edge.
#[test]
fn lot_rounding_can_kill_a_screen_passing_path() {
    let prices: &[(&str, f64, f64)] = &[
        ("BTCUSDT", 50_000.0, 50_010.0),
        ("ETHBTC", 0.0525, 0.0526),
        ("ETHUSDT", 2_599.0, 2_600.0),
    ];

    // Coarse step on ETHBTC: no signal.
    let mut coarse = setup(&triangle_universe(&[
        ("BTCUSDT", 0.00001),
        ("ETHBTC", 0.01),
        ("ETHUSDT", 0.00001),
    ]));
    let dirty = coarse.prime(prices);
    assert!(coarse
        .strategy
        .on_update(&dirty, &coarse.book, 1_000.0, &coarse.sizer)
        .is_none());

    // The screen itself did pass; rounding is what rejected it.
    let screened = coarse
        .strategy
        .pool()
        .iter()
        .find(|p| p.description() == "BUY@ETHUSDT SELL@ETHBTC SELL@BTCUSDT")
        .unwrap();
    assert!(screened.fast_ratio() > 1.0001);

    // Identical prices with a fine step: the same path yields a signal.
    let mut fine = setup(&triangle_universe(&[
        ("BTCUSDT", 0.00001),
        ("ETHBTC", 0.000001),
        ("ETHUSDT", 0.00001),
    ]));
    let dirty = fine.prime(prices);
    let signal = fine
        .strategy
        .on_update(&dirty, &fine.book, 1_000.0, &fine.sizer)
        .expect("fine lot step keeps the edge");
    assert_eq!(signal.description, "BUY@ETHUSDT SELL@ETHBTC SELL@BTCUSDT");
    assert!(signal.pnl > 0.0);
}

#[test]
fn zero_stake_short_circuits() {
    let mut s = setup(&triangle_universe(&[]));
    let dirty = s.prime(&[
        ("BTCUSDT", 50_000.0, 50_010.0),
        ("ETHBTC", 0.0500, 0.0501),
        ("ETHUSDT", 2_600.0, 2_601.0),
    ]);
    assert!(s.strategy.on_update(&dirty, &s.book, 0.0, &s.sizer).is_none());
}

#[test]
fn untouched_symbols_trigger_no_evaluation() {
    let mut docs = triangle_universe(&[]);
    docs.push(SymbolDocument {
        symbol: "LTCUSDT".into(),
        base_asset: "LTC".into(),
        quote_asset: "USDT".into(),
        status: "TRADING".into(),
        filters: Vec::new(),
    });
    let mut s = setup(&docs);

    // Profitable prices are in the book, but the only dirty bit belongs to
    // a symbol outside every route.
    s.prime(&[
        ("BTCUSDT", 50_000.0, 50_010.0),
        ("ETHBTC", 0.0500, 0.0501),
        ("ETHUSDT", 2_600.0, 2_601.0),
    ]);
    let dirty = s.prime(&[("LTCUSDT", 80.0, 80.1)]);

    assert!(s
        .strategy
        .on_update(&dirty, &s.book, 1_000.0, &s.sizer)
        .is_none());
}

/// Two disjoint triangles with identical prices tie on pnl; the
/// first-discovered path wins.
#[test]
fn ties_resolve_to_the_first_discovered_path() {
    let mut docs = triangle_universe(&[]);
    for (name, base, quote) in [
        ("SOLUSDT", "SOL", "USDT"),
        ("XRPSOL", "XRP", "SOL"),
        ("XRPUSDT", "XRP", "USDT"),
    ] {
        docs.push(SymbolDocument {
            symbol: name.into(),
            base_asset: base.into(),
            quote_asset: quote.into(),
            status: "TRADING".into(),
            filters: Vec::new(),
        });
    }
    let mut s = setup(&docs);

    let dirty = s.prime(&[
        ("BTCUSDT", 50_000.0, 50_010.0),
        ("ETHBTC", 0.0500, 0.0501),
        ("ETHUSDT", 2_600.0, 2_601.0),
        ("SOLUSDT", 50_000.0, 50_010.0),
        ("XRPSOL", 0.0500, 0.0501),
        ("XRPUSDT", 2_600.0, 2_601.0),
    ]);

    let signal = s
        .strategy
        .on_update(&dirty, &s.book, 1_000.0, &s.sizer)
        .expect("both triangles are profitable");
    assert_eq!(signal.description, "BUY@BTCUSDT BUY@ETHBTC SELL@ETHUSDT");
}
