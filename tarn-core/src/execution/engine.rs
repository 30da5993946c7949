//! Serial three-leg execution with LIFO rollback.
//!
//! Legs are submitted one at a time; each must reach a terminal state
//! before the next goes out. Any failure unwinds the already-filled legs in
//! reverse order with opposite-side market orders sized to the real fills,
//! then surfaces the original failure annotated with the rollback outcome.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::core::{ExecutionError, FailureKind, Signal, Way};
use crate::exchange::OrderSizer;
use crate::execution::broker::Broker;
use crate::execution::journal::TradeJournal;
use crate::execution::types::{
    ExecutedLeg, LegKind, OrderState, OrderStatus, TradeRecord, TradeStatus,
};

#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// How long one leg may stay non-terminal before it counts as failed.
    pub leg_timeout: Duration,
    /// Per-leg wait during rollback; longer, since we must unwind.
    pub rollback_timeout: Duration,
    /// Fraction of the requested quantity that still counts as a full fill.
    /// Absorbs rounding drift between requested and reported quantities.
    pub fill_tolerance: f64,
    /// Extra attempts per rollback leg after the first.
    pub rollback_retries: u32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            leg_timeout: Duration::from_secs(5),
            rollback_timeout: Duration::from_secs(10),
            fill_tolerance: 0.99,
            rollback_retries: 1,
        }
    }
}

/// Result of a fully executed cycle, traced from real fills.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub parent_id: String,
    pub legs: Vec<ExecutedLeg>,
    /// Stake implied by the first leg's real fill.
    pub initial_stake: f64,
    /// Final amount minus stake, walked through real prices and fees.
    pub traced_pnl: f64,
    pub traced_pnl_pct: f64,
}

pub struct ExecutionEngine {
    broker: Arc<Broker>,
    journal: Arc<TradeJournal>,
    config: ExecutionConfig,
}

impl ExecutionEngine {
    pub fn new(broker: Arc<Broker>, journal: Arc<TradeJournal>, config: ExecutionConfig) -> Self {
        Self {
            broker,
            journal,
            config,
        }
    }

    /// Run one cycle to completion or rollback.
    ///
    /// `fee_pct_for` supplies the fee percentage per symbol for PnL tracing.
    pub fn execute(
        &self,
        signal: &Signal,
        sizer: &OrderSizer,
        fee_pct_for: &dyn Fn(&str) -> f64,
    ) -> Result<CycleOutcome, ExecutionError> {
        let parent_id = self.journal.start_sequence();
        info!("[Execution] ===== cycle {} =====", parent_id);
        info!("[Execution] path: {}", signal.description);
        info!("[Execution] theoretical pnl: {:.8}", signal.pnl);

        let mut executed: Vec<ExecutedLeg> = Vec::with_capacity(signal.orders.len());

        for (leg_index, order) in signal.orders.iter().enumerate() {
            let kind = LegKind::from_index(leg_index);
            let fee_rate = fee_pct_for(&order.symbol.name) / 100.0;

            // Final guard against the exchange filters before going out.
            // Symbols without a filter set go out unadjusted.
            let qty = if sizer.has_symbol(order.symbol_id()) {
                let adjusted = sizer.adjust_order(order.symbol_id(), order.price, order.qty, true);
                if !adjusted.validation.valid {
                    self.journal_leg(
                        &parent_id,
                        kind,
                        &order.symbol.name,
                        order.way,
                        order.price,
                        order.qty,
                        0.0,
                        0.0,
                        TradeStatus::Failed,
                        &format!("SIZING_{parent_id}"),
                    );
                    return Err(self.fail(
                        FailureKind::Sizing,
                        leg_index,
                        String::new(),
                        adjusted.validation.reason,
                        &executed,
                        &parent_id,
                    ));
                }
                if adjusted.was_adjusted {
                    info!(
                        "[Execution] leg {} qty adjusted: {:.8} -> {:.8}",
                        leg_index + 1,
                        order.qty,
                        adjusted.qty
                    );
                }
                adjusted.qty
            } else {
                order.qty
            };

            info!(
                "[Execution] leg {}: {} {} @ MARKET, estPrice={:.8}, qty={:.8}",
                leg_index + 1,
                order.way,
                order.symbol.name,
                order.price,
                qty
            );

            let cl_ord_id = match self.broker.send_market(&order.symbol, order.way, qty, order.price)
            {
                Ok(id) => id,
                Err(err) => {
                    self.journal_leg(
                        &parent_id,
                        kind,
                        &order.symbol.name,
                        order.way,
                        order.price,
                        qty,
                        0.0,
                        0.0,
                        TradeStatus::Failed,
                        &err.cl_ord_id,
                    );
                    return Err(self.fail(
                        FailureKind::SubmitFailed,
                        leg_index,
                        err.cl_ord_id.clone(),
                        err.reason,
                        &executed,
                        &parent_id,
                    ));
                }
            };

            let status = self.broker.wait_completion(&cl_ord_id, self.config.leg_timeout);
            let state = self.broker.order_state(&cl_ord_id).unwrap_or_default();

            let full_fill = status == OrderStatus::Filled
                && state.cum_qty >= self.config.fill_tolerance * qty;

            if full_fill {
                let slippage = if order.price > 0.0 {
                    (state.avg_px - order.price) / order.price * 100.0
                } else {
                    0.0
                };
                info!(
                    "[Execution] leg {} FILLED clOrdId={}, avgPx={:.8}, cumQty={:.8}, slippage={:+.4}%",
                    leg_index + 1,
                    cl_ord_id,
                    state.avg_px,
                    state.cum_qty,
                    slippage
                );

                executed.push(ExecutedLeg {
                    symbol: Arc::clone(&order.symbol),
                    kind,
                    way: order.way,
                    est_price: order.price,
                    est_qty: qty,
                    avg_price: state.avg_px,
                    filled_qty: state.cum_qty,
                    fee_rate,
                });

                // The exit leg's row carries the traced cycle PnL.
                let (pnl, pnl_pct) = if kind == LegKind::Exit {
                    let (_, pnl, pnl_pct) = trace_pnl(&executed);
                    (pnl, pnl_pct)
                } else {
                    (0.0, 0.0)
                };
                self.journal_leg_pnl(
                    &parent_id,
                    kind,
                    &order.symbol.name,
                    order.way,
                    order.price,
                    qty,
                    state.avg_px,
                    state.cum_qty,
                    TradeStatus::Executed,
                    &cl_ord_id,
                    pnl,
                    pnl_pct,
                );
                continue;
            }

            // Leg failed; classify, record any partial fill, and unwind.
            return Err(self.fail_leg(
                leg_index,
                order,
                qty,
                cl_ord_id,
                status,
                state,
                fee_rate,
                &mut executed,
                &parent_id,
            ));
        }

        let (initial_stake, traced_pnl, traced_pnl_pct) = trace_pnl(&executed);
        info!("[Execution] ===== cycle {} complete =====", parent_id);
        info!(
            "[Execution] traced pnl: {:.8} ({:+.4}%) on stake {:.8}",
            traced_pnl, traced_pnl_pct, initial_stake
        );

        Ok(CycleOutcome {
            parent_id,
            legs: executed,
            initial_stake,
            traced_pnl,
            traced_pnl_pct,
        })
    }

    /// Classify a failed leg, journal it, run rollback, and build the error.
    #[allow(clippy::too_many_arguments)]
    fn fail_leg(
        &self,
        leg_index: usize,
        order: &crate::core::Order,
        qty: f64,
        cl_ord_id: String,
        status: OrderStatus,
        state: OrderState,
        fee_rate: f64,
        executed: &mut Vec<ExecutedLeg>,
        parent_id: &str,
    ) -> ExecutionError {
        let kind = LegKind::from_index(leg_index);
        let (failure, reason) = match status {
            OrderStatus::Rejected => (
                FailureKind::Rejected,
                if state.reject_reason.is_empty() {
                    "rejected by exchange".to_owned()
                } else {
                    state.reject_reason.clone()
                },
            ),
            OrderStatus::Unknown => (
                FailureKind::Timeout,
                format!("no terminal state within {:?}", self.config.leg_timeout),
            ),
            _ => (
                FailureKind::PartialFill,
                format!(
                    "status {} with cumQty {:.8} of {:.8}",
                    status, state.cum_qty, qty
                ),
            ),
        };

        let partial = state.cum_qty > 0.0;
        if partial {
            // The partial fill is real exposure; include it in the unwind.
            executed.push(ExecutedLeg {
                symbol: Arc::clone(&order.symbol),
                kind,
                way: order.way,
                est_price: order.price,
                est_qty: qty,
                avg_price: state.avg_px,
                filled_qty: state.cum_qty,
                fee_rate,
            });
        }
        self.journal_leg(
            parent_id,
            kind,
            &order.symbol.name,
            order.way,
            order.price,
            qty,
            state.avg_px,
            state.cum_qty,
            if partial { TradeStatus::Partial } else { TradeStatus::Failed },
            &cl_ord_id,
        );

        self.fail(failure, leg_index, cl_ord_id, reason, executed, parent_id)
    }

    fn fail(
        &self,
        kind: FailureKind,
        failed_leg: usize,
        cl_ord_id: String,
        reason: String,
        executed: &[ExecutedLeg],
        parent_id: &str,
    ) -> ExecutionError {
        error!(
            "[Execution] leg {} failed ({kind}): {reason}; unwinding {} filled leg(s)",
            failed_leg + 1,
            executed.len()
        );
        let rollback_ok = self.rollback(executed, parent_id);
        if !rollback_ok {
            error!("[Execution] ROLLBACK INCOMPLETE for cycle {parent_id}; manual reconciliation required");
        }
        ExecutionError {
            kind,
            failed_leg,
            cl_ord_id,
            reason,
            rollback_ok,
        }
    }

    /// Unwind filled legs LIFO: opposite side, exactly the filled quantity,
    /// priced at the recorded average fill. Continues through failures to
    /// shed as much exposure as possible.
    fn rollback(&self, executed: &[ExecutedLeg], parent_id: &str) -> bool {
        let mut all_ok = true;

        for leg in executed.iter().rev() {
            let way = leg.way.opposite();
            let mut leg_ok = false;

            for attempt in 0..=self.config.rollback_retries {
                if attempt > 0 {
                    warn!(
                        "[Execution] retrying rollback of {} ({} of {})",
                        leg.symbol.name, attempt, self.config.rollback_retries
                    );
                }

                let cl_ord_id = match self.broker.send_market(
                    &leg.symbol,
                    way,
                    leg.filled_qty,
                    leg.avg_price,
                ) {
                    Ok(id) => id,
                    Err(err) => {
                        warn!("[Execution] rollback submit failed: {err}");
                        continue;
                    }
                };

                let status = self
                    .broker
                    .wait_completion(&cl_ord_id, self.config.rollback_timeout);
                let state = self.broker.order_state(&cl_ord_id).unwrap_or_default();

                self.journal_leg(
                    parent_id,
                    leg.kind,
                    &leg.symbol.name,
                    way,
                    leg.avg_price,
                    leg.filled_qty,
                    state.avg_px,
                    state.cum_qty,
                    TradeStatus::Rollback,
                    &cl_ord_id,
                );

                if status == OrderStatus::Filled {
                    if state.cum_qty < self.config.fill_tolerance * leg.filled_qty {
                        // Residue is accepted; chasing it risks making the
                        // position worse.
                        warn!(
                            "[Execution] partial rollback of {}: {:.8} of {:.8}",
                            leg.symbol.name, state.cum_qty, leg.filled_qty
                        );
                    }
                    leg_ok = true;
                    break;
                }
                warn!(
                    "[Execution] rollback of {} not filled (status {}), attempt {}",
                    leg.symbol.name,
                    status,
                    attempt + 1
                );
            }

            if !leg_ok {
                error!("[Execution] failed to roll back {} {}", leg.symbol.name, leg.filled_qty);
                all_ok = false;
            }
        }

        all_ok
    }

    #[allow(clippy::too_many_arguments)]
    fn journal_leg(
        &self,
        parent_id: &str,
        kind: LegKind,
        symbol: &str,
        side: Way,
        intended_price: f64,
        intended_qty: f64,
        actual_price: f64,
        actual_qty: f64,
        status: TradeStatus,
        trade_id: &str,
    ) {
        self.journal_leg_pnl(
            parent_id,
            kind,
            symbol,
            side,
            intended_price,
            intended_qty,
            actual_price,
            actual_qty,
            status,
            trade_id,
            0.0,
            0.0,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn journal_leg_pnl(
        &self,
        parent_id: &str,
        kind: LegKind,
        symbol: &str,
        side: Way,
        intended_price: f64,
        intended_qty: f64,
        actual_price: f64,
        actual_qty: f64,
        status: TradeStatus,
        trade_id: &str,
        pnl: f64,
        pnl_pct: f64,
    ) {
        let record = TradeRecord {
            trade_id: trade_id.to_owned(),
            parent_trade_id: parent_id.to_owned(),
            leg: kind,
            symbol: symbol.to_owned(),
            side,
            intended_price,
            intended_qty,
            actual_price,
            actual_qty,
            status,
            pnl,
            pnl_pct,
            timestamp: Utc::now(),
        };
        // Journal failures must never break a cycle; they are logged inside.
        let _ = self.journal.record(&record);
    }
}

/// Walk the executed legs with real prices and fees: returns
/// `(initial_stake, pnl, pnl_pct)` in the cycle's starting asset.
fn trace_pnl(legs: &[ExecutedLeg]) -> (f64, f64, f64) {
    let Some(first) = legs.first() else {
        return (0.0, 0.0, 0.0);
    };

    // Stake implied by the first fill: quote spent on a buy, base sold on a
    // sell.
    let initial = match first.way {
        Way::Buy => first.filled_qty * first.avg_price,
        Way::Sell => first.filled_qty,
    };

    let mut amount = initial;
    for leg in legs {
        if leg.avg_price <= 0.0 {
            return (initial, 0.0, 0.0);
        }
        amount = match leg.way {
            Way::Buy => (amount / leg.avg_price) * (1.0 - leg.fee_rate),
            Way::Sell => (amount * leg.avg_price) * (1.0 - leg.fee_rate),
        };
    }

    let pnl = amount - initial;
    let pnl_pct = if initial > 0.0 { pnl / initial * 100.0 } else { 0.0 };
    (initial, pnl, pnl_pct)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_thresholds() {
        let config = ExecutionConfig::default();
        assert_eq!(config.leg_timeout, Duration::from_secs(5));
        assert_eq!(config.rollback_timeout, Duration::from_secs(10));
        assert_eq!(config.fill_tolerance, 0.99);
        assert_eq!(config.rollback_retries, 1);
    }

    #[test]
    fn trace_pnl_walks_real_fills() {
        let symbol = |id, base: &str, quote: &str| {
            std::sync::Arc::new(crate::exchange::Symbol::new(
                id,
                base,
                quote,
                &format!("{base}{quote}"),
                crate::exchange::SymbolFilters::default(),
            ))
        };

        // 1000 USDT -> BTC -> ETH -> USDT at consistent prices, no fees.
        let legs = vec![
            ExecutedLeg {
                symbol: symbol(0, "BTC", "USDT"),
                kind: LegKind::Entry,
                way: Way::Buy,
                est_price: 50_000.0,
                est_qty: 0.02,
                avg_price: 50_000.0,
                filled_qty: 0.02,
                fee_rate: 0.0,
            },
            ExecutedLeg {
                symbol: symbol(1, "ETH", "BTC"),
                kind: LegKind::Intermediate,
                way: Way::Buy,
                est_price: 0.05,
                est_qty: 0.4,
                avg_price: 0.05,
                filled_qty: 0.4,
                fee_rate: 0.0,
            },
            ExecutedLeg {
                symbol: symbol(2, "ETH", "USDT"),
                kind: LegKind::Exit,
                way: Way::Sell,
                est_price: 2_600.0,
                est_qty: 0.4,
                avg_price: 2_600.0,
                filled_qty: 0.4,
                fee_rate: 0.0,
            },
        ];

        let (stake, pnl, pnl_pct) = trace_pnl(&legs);
        assert!((stake - 1_000.0).abs() < 1e-9);
        // 1000 / 50000 / 0.05 * 2600 = 1040.
        assert!((pnl - 40.0).abs() < 1e-9);
        assert!((pnl_pct - 4.0).abs() < 1e-9);
    }

    #[test]
    fn trace_pnl_empty_legs() {
        assert_eq!(trace_pnl(&[]), (0.0, 0.0, 0.0));
    }
}
