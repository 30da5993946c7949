//! Broker adapter: submits market orders and tracks their states.
//!
//! One mutex guards the `cl_ord_id → OrderState` map; a condvar wakes
//! waiters on every state change. No ordering is guaranteed across
//! different order ids.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::{info, warn};

use crate::core::{SubmitError, Way};
use crate::exchange::Symbol;
use crate::execution::types::{ExecutionReport, OrderState, OrderStatus};

/// The wire half of order submission. Live deployments plug the FIX order
/// session in here; tests and paper trading use scripted implementations.
pub trait OrderTransport: Send + Sync {
    fn send_market(&self, cl_ord_id: &str, symbol: &str, way: Way, qty: f64)
        -> anyhow::Result<()>;
}

pub struct Broker {
    transport: std::sync::Arc<dyn OrderTransport>,
    live_mode: bool,
    states: Mutex<HashMap<String, OrderState>>,
    state_cv: Condvar,
    id_counter: AtomicU64,
}

impl Broker {
    pub fn new(transport: std::sync::Arc<dyn OrderTransport>, live_mode: bool) -> Self {
        Self {
            transport,
            live_mode,
            states: Mutex::new(HashMap::new()),
            state_cv: Condvar::new(),
            id_counter: AtomicU64::new(0),
        }
    }

    pub fn is_live(&self) -> bool {
        self.live_mode
    }

    /// Submit a market order and return its client order id.
    ///
    /// In test mode the order never reaches the wire: a synthetic state is
    /// recorded as fully filled at `est_price` and waiters are notified
    /// immediately.
    pub fn send_market(
        &self,
        symbol: &Symbol,
        way: Way,
        qty: f64,
        est_price: f64,
    ) -> Result<String, SubmitError> {
        let cl_ord_id = self.next_cl_ord_id();
        info!(
            "[Broker] market order: clOrdId={}, symbol={}, side={}, qty={:.8}",
            cl_ord_id, symbol.name, way, qty
        );

        if !self.live_mode {
            let mut states = self.states.lock().unwrap();
            states.insert(
                cl_ord_id.clone(),
                OrderState {
                    cl_ord_id: cl_ord_id.clone(),
                    symbol: symbol.name.clone(),
                    side: Some(way),
                    order_qty: qty,
                    cum_qty: qty,
                    cum_cost: est_price * qty,
                    avg_px: est_price,
                    status: OrderStatus::Filled,
                    ..OrderState::default()
                },
            );
            drop(states);
            self.state_cv.notify_all();
            return Ok(cl_ord_id);
        }

        {
            let mut states = self.states.lock().unwrap();
            states.insert(
                cl_ord_id.clone(),
                OrderState {
                    cl_ord_id: cl_ord_id.clone(),
                    symbol: symbol.name.clone(),
                    side: Some(way),
                    order_qty: qty,
                    status: OrderStatus::PendingNew,
                    ..OrderState::default()
                },
            );
        }

        self.transport
            .send_market(&cl_ord_id, &symbol.name, way, qty)
            .map_err(|err| SubmitError {
                cl_ord_id: cl_ord_id.clone(),
                reason: format!("{err:#}"),
            })?;

        Ok(cl_ord_id)
    }

    /// Apply an inbound execution report. Unknown ids create a fresh state
    /// so late or out-of-order reports are never dropped.
    pub fn apply_execution_report(&self, report: ExecutionReport) {
        {
            let mut states = self.states.lock().unwrap();
            let state = states
                .entry(report.cl_ord_id.clone())
                .or_insert_with(|| OrderState {
                    cl_ord_id: report.cl_ord_id.clone(),
                    ..OrderState::default()
                });

            state.order_id = report.order_id;
            state.symbol = report.symbol;
            state.side = Some(report.side);
            state.order_qty = report.order_qty;
            state.cum_qty = report.cum_qty;
            state.status = report.status;
            state.reject_reason = report.text;

            if report.is_trade && report.last_qty > 0.0 {
                state.cum_cost += report.last_px * report.last_qty;
                if state.cum_qty > 0.0 {
                    state.avg_px = state.cum_cost / state.cum_qty;
                }
                info!(
                    "[Broker] fill: clOrdId={}, lastPx={:.8}, lastQty={:.8}, avgPx={:.8}",
                    state.cl_ord_id, report.last_px, report.last_qty, state.avg_px
                );
            }
        }
        self.state_cv.notify_all();
    }

    /// Block until the order reaches a terminal status or the timeout
    /// expires. On timeout the state is left in place - late reports are
    /// still recorded - and `Unknown` is returned.
    pub fn wait_completion(&self, cl_ord_id: &str, timeout: Duration) -> OrderStatus {
        let deadline = Instant::now() + timeout;
        let mut states = self.states.lock().unwrap();

        loop {
            if let Some(state) = states.get(cl_ord_id) {
                if state.status.is_terminal() {
                    return state.status;
                }
            }

            let now = Instant::now();
            if now >= deadline {
                warn!("[Broker] timeout waiting for order completion: {}", cl_ord_id);
                return OrderStatus::Unknown;
            }

            let (guard, _result) = self
                .state_cv
                .wait_timeout(states, deadline - now)
                .unwrap();
            states = guard;
        }
    }

    /// Snapshot of the current state for an order id.
    pub fn order_state(&self, cl_ord_id: &str) -> Option<OrderState> {
        self.states.lock().unwrap().get(cl_ord_id).cloned()
    }

    fn next_cl_ord_id(&self) -> String {
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis();
        let n = self.id_counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("TA{ms}_{n}")
    }
}
