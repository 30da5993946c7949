//! Order execution: the broker adapter, the three-leg execution engine with
//! rollback, and the durable trade journal.

pub mod broker;
pub mod engine;
pub mod journal;
pub mod types;

pub use broker::{Broker, OrderTransport};
pub use engine::{CycleOutcome, ExecutionConfig, ExecutionEngine};
pub use journal::TradeJournal;
pub use types::{ExecutedLeg, ExecutionReport, LegKind, OrderState, OrderStatus, TradeRecord, TradeStatus};
