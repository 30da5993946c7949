//! A fully sized execution plan produced by path evaluation.

use crate::core::Order;

/// An ordered plan of three market orders with positive expected PnL,
/// denominated in the cycle's starting asset.
///
/// Order quantities are already simulated through lot-size rounding and
/// cumulative fees; the execution engine submits them as-is (modulo a final
/// exchange-filter adjustment).
#[derive(Debug, Clone)]
pub struct Signal {
    pub orders: Vec<Order>,
    pub description: String,
    pub pnl: f64,
}

impl Signal {
    pub fn new(orders: Vec<Order>, description: impl Into<String>, pnl: f64) -> Self {
        Self {
            orders,
            description: description.into(),
            pnl,
        }
    }
}
