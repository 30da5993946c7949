//! Adapter between a market-data session and the price book.
//!
//! The session layer (FIX or simulated) calls `on_snapshot` /
//! `on_incremental` with symbol strings; the adapter resolves them to dense
//! ids and forwards to the book. It also tracks which symbols have received
//! their initial snapshot so the runner can hold off trading until the
//! whole universe is primed.

use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use tracing::{debug, warn};

use crate::data::{PriceBook, SymbolRegistry};

struct SnapshotProgress {
    expected: HashSet<String>,
    received: HashSet<String>,
}

pub struct MarketDataAdapter {
    book: Arc<PriceBook>,
    registry: Arc<SymbolRegistry>,
    progress: Mutex<SnapshotProgress>,
    snapshot_cv: Condvar,
}

impl MarketDataAdapter {
    pub fn new(book: Arc<PriceBook>, registry: Arc<SymbolRegistry>) -> Self {
        Self {
            book,
            registry,
            progress: Mutex::new(SnapshotProgress {
                expected: HashSet::new(),
                received: HashSet::new(),
            }),
            snapshot_cv: Condvar::new(),
        }
    }

    /// Declare the symbols whose initial snapshots we are waiting for.
    /// Call before subscribing; resets any prior progress.
    pub fn set_expected_symbols<S: AsRef<str>>(&self, symbols: &[S]) {
        let mut progress = self.progress.lock().unwrap();
        progress.expected = symbols.iter().map(|s| s.as_ref().to_owned()).collect();
        progress.received.clear();
    }

    /// Initial book snapshot for one symbol.
    pub fn on_snapshot(&self, symbol: &str, bid: f64, ask: f64) {
        let Some(id) = self.registry.id_of(symbol) else {
            debug!("[MarketData] snapshot for unregistered symbol {symbol}, ignoring");
            return;
        };
        self.book.update(id, bid, ask);

        let all_received = {
            let mut progress = self.progress.lock().unwrap();
            if progress.expected.contains(symbol) {
                progress.received.insert(symbol.to_owned());
            }
            progress.received.len() >= progress.expected.len()
        };
        if all_received {
            self.snapshot_cv.notify_all();
        }
    }

    /// Incremental top-of-book refresh. Zero sides mean "unchanged" and are
    /// merged by the book itself.
    pub fn on_incremental(&self, symbol: &str, bid: f64, ask: f64) {
        let Some(id) = self.registry.id_of(symbol) else {
            warn!("[MarketData] update for unregistered symbol {symbol}, ignoring");
            return;
        };
        self.book.update(id, bid, ask);
    }

    /// Wait until every expected symbol has delivered its snapshot.
    /// Returns `false` on timeout.
    pub fn wait_all_snapshots(&self, timeout: Duration) -> bool {
        let progress = self.progress.lock().unwrap();
        let (progress, result) = self
            .snapshot_cv
            .wait_timeout_while(progress, timeout, |p| {
                p.received.len() < p.expected.len()
            })
            .unwrap();
        drop(progress);
        !result.timed_out()
    }

    /// `(received, expected)` snapshot counts, for progress logging.
    pub fn snapshot_progress(&self) -> (usize, usize) {
        let progress = self.progress.lock().unwrap();
        (progress.received.len(), progress.expected.len())
    }

    pub fn all_snapshots_received(&self) -> bool {
        let progress = self.progress.lock().unwrap();
        progress.received.len() >= progress.expected.len()
    }
}
