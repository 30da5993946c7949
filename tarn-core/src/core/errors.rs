//! Domain error types for registry, order submission, and cycle execution.
//!
//! These carry enough structure for the main loop to log and continue;
//! application-level plumbing failures use `anyhow` at the call sites.

use std::fmt;

/// Symbol registry is full. Fatal at initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityError {
    /// The fixed registry capacity that was exceeded.
    pub limit: usize,
}

impl fmt::Display for CapacityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "symbol registry full: capacity is {} symbols", self.limit)
    }
}

impl std::error::Error for CapacityError {}

/// An order could not be handed to the transport.
#[derive(Debug, Clone)]
pub struct SubmitError {
    pub cl_ord_id: String,
    pub reason: String,
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "order {} could not be submitted: {}", self.cl_ord_id, self.reason)
    }
}

impl std::error::Error for SubmitError {}

/// What went wrong on the failed leg of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Terminal reject from the exchange.
    Rejected,
    /// No terminal state within the leg timeout; exposure is unknown until
    /// balances are reconciled.
    Timeout,
    /// Terminal state with a fill below the tolerance threshold.
    PartialFill,
    /// The order never reached the wire.
    SubmitFailed,
    /// The sized order failed exchange-filter validation before submission.
    Sizing,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureKind::Rejected => "rejected",
            FailureKind::Timeout => "timeout",
            FailureKind::PartialFill => "partial fill",
            FailureKind::SubmitFailed => "submit failed",
            FailureKind::Sizing => "sizing failed",
        };
        f.write_str(text)
    }
}

/// A cycle failed mid-flight. Raised after the rollback pass has run;
/// `rollback_ok` reports whether every unwind leg completed.
#[derive(Debug, Clone)]
pub struct ExecutionError {
    pub kind: FailureKind,
    /// Zero-based index of the leg that failed.
    pub failed_leg: usize,
    /// Client order id of the failed leg; empty if it was never submitted.
    pub cl_ord_id: String,
    pub reason: String,
    pub rollback_ok: bool,
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "leg {} {} ({}): {}; rollback {}",
            self.failed_leg + 1,
            self.kind,
            if self.cl_ord_id.is_empty() { "unsubmitted" } else { self.cl_ord_id.as_str() },
            self.reason,
            if self.rollback_ok { "complete" } else { "INCOMPLETE" },
        )
    }
}

impl std::error::Error for ExecutionError {}
