//! Order lifecycle and journal record types.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::core::Way;

/// Exchange-side order status. `Unknown` doubles as "no terminal state
/// observed before the wait deadline".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderStatus {
    PendingNew,
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
    #[default]
    Unknown,
}

impl OrderStatus {
    /// Whether the exchange will send no further state changes.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Rejected | OrderStatus::Expired
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            OrderStatus::PendingNew => "PENDING_NEW",
            OrderStatus::New => "NEW",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Expired => "EXPIRED",
            OrderStatus::Unknown => "UNKNOWN",
        };
        f.write_str(text)
    }
}

/// Broker-side view of one order, updated from execution reports.
#[derive(Debug, Clone, Default)]
pub struct OrderState {
    pub cl_ord_id: String,
    pub order_id: String,
    pub symbol: String,
    pub side: Option<Way>,
    pub order_qty: f64,
    pub cum_qty: f64,
    /// Running cost of all fills, for the average-price calculation.
    pub cum_cost: f64,
    pub avg_px: f64,
    pub status: OrderStatus,
    pub reject_reason: String,
}

/// Normalized execution report delivered by the order session.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub cl_ord_id: String,
    pub order_id: String,
    pub symbol: String,
    pub side: Way,
    pub order_qty: f64,
    pub cum_qty: f64,
    pub last_px: f64,
    pub last_qty: f64,
    /// True when this report carries a fill.
    pub is_trade: bool,
    pub status: OrderStatus,
    pub text: String,
}

/// Position of a leg within its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegKind {
    Entry,
    Intermediate,
    Exit,
}

impl LegKind {
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => LegKind::Entry,
            1 => LegKind::Intermediate,
            _ => LegKind::Exit,
        }
    }
}

impl fmt::Display for LegKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            LegKind::Entry => "ENTRY",
            LegKind::Intermediate => "INTERMEDIATE",
            LegKind::Exit => "EXIT",
        };
        f.write_str(text)
    }
}

/// Outcome recorded for one journaled leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeStatus {
    Executed,
    Partial,
    Failed,
    Rollback,
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TradeStatus::Executed => "EXECUTED",
            TradeStatus::Partial => "PARTIAL",
            TradeStatus::Failed => "FAILED",
            TradeStatus::Rollback => "ROLLBACK",
        };
        f.write_str(text)
    }
}

/// One journal row: an attempted or rollback leg.
#[derive(Debug, Clone)]
pub struct TradeRecord {
    pub trade_id: String,
    pub parent_trade_id: String,
    pub leg: LegKind,
    pub symbol: String,
    pub side: Way,
    pub intended_price: f64,
    pub intended_qty: f64,
    pub actual_price: f64,
    pub actual_qty: f64,
    pub status: TradeStatus,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub timestamp: DateTime<Utc>,
}

/// A leg that put on exposure, tracked for rollback and PnL tracing.
#[derive(Debug, Clone)]
pub struct ExecutedLeg {
    pub symbol: std::sync::Arc<crate::exchange::Symbol>,
    pub kind: LegKind,
    pub way: Way,
    pub est_price: f64,
    pub est_qty: f64,
    pub avg_price: f64,
    pub filled_qty: f64,
    /// Fee as a fraction, e.g. 0.001 for 0.1%.
    pub fee_rate: f64,
}
