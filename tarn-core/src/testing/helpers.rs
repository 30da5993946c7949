//! Test fixtures: a small symbol universe, a scripted order transport, and
//! a canned admin client.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, Weak};

use anyhow::Result;

use crate::core::Way;
use crate::exchange::{LotFilter, SymbolDocument, SymbolFilters};
use crate::execution::{Broker, ExecutionReport, OrderStatus, OrderTransport};

/// Filters with a quantity step only; enough for sizing-sensitive tests.
pub fn universe_filters(step: f64) -> SymbolFilters {
    let mut filters = SymbolFilters::default();
    filters.lot = LotFilter {
        min_qty: 0.0,
        max_qty: 0.0,
        step_size: step,
        precision: 0,
    };
    filters
}

/// The BTC/ETH/USDT triangle as exchange-info documents, with a given lot
/// step per symbol.
pub fn triangle_universe(steps: &[(&str, f64)]) -> Vec<SymbolDocument> {
    let step_for = |name: &str| {
        steps
            .iter()
            .find(|(sym, _)| *sym == name)
            .map(|(_, step)| *step)
            .unwrap_or(0.0)
    };

    [
        ("BTCUSDT", "BTC", "USDT"),
        ("ETHBTC", "ETH", "BTC"),
        ("ETHUSDT", "ETH", "USDT"),
    ]
    .into_iter()
    .map(|(name, base, quote)| {
        let step = step_for(name);
        let filters = if step > 0.0 {
            vec![serde_json::json!({
                "filterType": "LOT_SIZE",
                "minQty": "0",
                "maxQty": "0",
                "stepSize": step.to_string(),
            })]
        } else {
            Vec::new()
        };
        SymbolDocument {
            symbol: name.into(),
            base_asset: base.into(),
            quote_asset: quote.into(),
            status: "TRADING".into(),
            filters,
        }
    })
    .collect()
}

/// Canned admin client serving a fixed universe and balance map.
pub struct StaticAdmin {
    pub symbols: Vec<SymbolDocument>,
    pub balances: Mutex<HashMap<String, f64>>,
}

impl StaticAdmin {
    pub fn new(symbols: Vec<SymbolDocument>, balances: HashMap<String, f64>) -> Self {
        Self {
            symbols,
            balances: Mutex::new(balances),
        }
    }
}

impl crate::engine::Admin for StaticAdmin {
    fn fetch_symbols(&self) -> Result<Vec<SymbolDocument>> {
        Ok(self.symbols.clone())
    }

    fn fetch_balances(&self) -> Result<HashMap<String, f64>> {
        Ok(self.balances.lock().unwrap().clone())
    }
}

/// What the scripted transport should do with the next submitted order.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    /// Full fill at the given price.
    Fill { price: f64 },
    /// Terminal `Filled` status but only `ratio` of the quantity executed.
    PartialFill { price: f64, ratio: f64 },
    /// Terminal reject with a reason.
    Reject { reason: String },
    /// No report at all; the waiter times out.
    Silence,
    /// Transport-level submit failure.
    FailSubmit { reason: String },
}

/// An order the scripted transport saw, in submission order.
#[derive(Debug, Clone)]
pub struct SentOrder {
    pub cl_ord_id: String,
    pub symbol: String,
    pub way: Way,
    pub qty: f64,
}

/// Order transport that plays a queue of scripted outcomes back into the
/// broker, synchronously, as if the exchange answered instantly. Outcomes
/// are consumed per submission; an empty queue means full fill at zero
/// price.
pub struct ScriptedTransport {
    outcomes: Mutex<VecDeque<ScriptedOutcome>>,
    sent: Mutex<Vec<SentOrder>>,
    broker: Mutex<Weak<Broker>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            broker: Mutex::new(Weak::new()),
        })
    }

    /// Wire the broker the reports should flow back into.
    pub fn attach_broker(&self, broker: &Arc<Broker>) {
        *self.broker.lock().unwrap() = Arc::downgrade(broker);
    }

    pub fn push(&self, outcome: ScriptedOutcome) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn sent(&self) -> Vec<SentOrder> {
        self.sent.lock().unwrap().clone()
    }
}

impl OrderTransport for ScriptedTransport {
    fn send_market(&self, cl_ord_id: &str, symbol: &str, way: Way, qty: f64) -> Result<()> {
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ScriptedOutcome::Fill { price: 0.0 });

        if let ScriptedOutcome::FailSubmit { reason } = &outcome {
            return Err(anyhow::anyhow!("{reason}"));
        }

        self.sent.lock().unwrap().push(SentOrder {
            cl_ord_id: cl_ord_id.to_owned(),
            symbol: symbol.to_owned(),
            way,
            qty,
        });

        let Some(broker) = self.broker.lock().unwrap().upgrade() else {
            return Ok(());
        };

        let report = |status: OrderStatus, cum_qty: f64, last_px: f64, text: &str| ExecutionReport {
            cl_ord_id: cl_ord_id.to_owned(),
            order_id: format!("X-{cl_ord_id}"),
            symbol: symbol.to_owned(),
            side: way,
            order_qty: qty,
            cum_qty,
            last_px,
            last_qty: cum_qty,
            is_trade: cum_qty > 0.0,
            status,
            text: text.to_owned(),
        };

        match outcome {
            ScriptedOutcome::Fill { price } => {
                broker.apply_execution_report(report(OrderStatus::Filled, qty, price, ""));
            }
            ScriptedOutcome::PartialFill { price, ratio } => {
                broker.apply_execution_report(report(
                    OrderStatus::Filled,
                    qty * ratio,
                    price,
                    "",
                ));
            }
            ScriptedOutcome::Reject { reason } => {
                broker.apply_execution_report(report(OrderStatus::Rejected, 0.0, 0.0, &reason));
            }
            ScriptedOutcome::Silence => {}
            ScriptedOutcome::FailSubmit { .. } => unreachable!("handled above"),
        }

        Ok(())
    }
}
