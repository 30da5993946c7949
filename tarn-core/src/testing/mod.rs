//! Shared builders and mocks for unit and integration tests.

pub mod helpers;

pub use helpers::{
    triangle_universe, universe_filters, ScriptedOutcome, ScriptedTransport, SentOrder, StaticAdmin,
};
