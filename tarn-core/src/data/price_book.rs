//! Lock-free top-of-book storage with change tracking.
//!
//! One cache-line-aligned seqlock slot per symbol id. A single market-data
//! writer updates each slot; readers are wait-free under that single-writer
//! discipline (a torn read only retries while a write is in flight).
//!
//! Writer protocol per slot: bump `seq` to odd (release), store the sides
//! that changed, bump `seq` to even (release). Readers load `seq`, spin
//! while odd, copy both sides, and accept the pair only if `seq` is
//! unchanged.
//!
//! Changed ids are accumulated in a bitmap behind a mutex + condvar, with a
//! lock-free `has_updates` flag so busy pollers never touch the mutex on
//! the empty fast path.

use std::sync::atomic::{fence, AtomicBool, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::core::{BidAsk, SymbolId, MAX_SYMBOLS};

const BITMAP_WORDS: usize = MAX_SYMBOLS / 64;

/// Fixed-size bitmap over symbol ids, tracking which prices changed since
/// the last drain.
#[derive(Clone)]
pub struct DirtySet {
    words: [u64; BITMAP_WORDS],
}

impl Default for DirtySet {
    fn default() -> Self {
        Self::new()
    }
}

impl DirtySet {
    pub const fn new() -> Self {
        Self {
            words: [0; BITMAP_WORDS],
        }
    }

    #[inline]
    pub fn set(&mut self, id: SymbolId) {
        self.words[id as usize / 64] |= 1u64 << (id as usize % 64);
    }

    #[inline]
    pub fn test(&self, id: SymbolId) -> bool {
        self.words[id as usize / 64] & (1u64 << (id as usize % 64)) != 0
    }

    pub fn clear(&mut self) {
        self.words = [0; BITMAP_WORDS];
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterate set bits in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = SymbolId> + '_ {
        // Clears the lowest set bit each step; one word at a time.
        self.words.iter().enumerate().flat_map(|(word_idx, &word)| {
            let mut bits = word;
            std::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let bit = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                Some((word_idx * 64 + bit) as SymbolId)
            })
        })
    }
}

/// One seqlock-protected top-of-book slot, padded to a cache line so
/// neighboring symbols never share one.
///
/// Prices are stored as raw f64 bits in atomics; the `seq` protocol is what
/// makes the pair consistent, the atomics just keep the individual loads
/// and stores well-defined under concurrency.
#[repr(C, align(64))]
struct PriceSlot {
    seq: AtomicU64,
    bid_bits: AtomicU64,
    ask_bits: AtomicU64,
}

impl PriceSlot {
    const fn new() -> Self {
        Self {
            seq: AtomicU64::new(0),
            bid_bits: AtomicU64::new(0),
            ask_bits: AtomicU64::new(0),
        }
    }
}

struct DirtyState {
    bits: DirtySet,
    has_updates: bool,
}

/// Seqlock price book over all registered symbols plus the dirty-set
/// signalling used to wake the strategy thread.
pub struct PriceBook {
    slots: Box<[PriceSlot]>,
    state: Mutex<DirtyState>,
    update_cv: Condvar,
    /// Lock-free mirror of `DirtyState::has_updates` for spin polling.
    has_updates_hint: AtomicBool,
}

impl Default for PriceBook {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceBook {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(MAX_SYMBOLS);
        slots.resize_with(MAX_SYMBOLS, PriceSlot::new);
        Self {
            slots: slots.into_boxed_slice(),
            state: Mutex::new(DirtyState {
                bits: DirtySet::new(),
                has_updates: false,
            }),
            update_cv: Condvar::new(),
            has_updates_hint: AtomicBool::new(false),
        }
    }

    /// Publish a top-of-book change for `id`. Zero on a side means that
    /// side did not change; a fully zero update is a no-op.
    ///
    /// Writes to the same id must come from a single thread (one market-data
    /// session per symbol); writes to different ids are independent.
    pub fn update(&self, id: SymbolId, bid: f64, ask: f64) {
        if bid == 0.0 && ask == 0.0 {
            return;
        }

        let slot = &self.slots[id as usize];
        let seq = slot.seq.load(Ordering::Relaxed);
        slot.seq.store(seq.wrapping_add(1), Ordering::Release);
        if bid > 0.0 {
            slot.bid_bits.store(bid.to_bits(), Ordering::Relaxed);
        }
        if ask > 0.0 {
            slot.ask_bits.store(ask.to_bits(), Ordering::Relaxed);
        }
        fence(Ordering::Release);
        slot.seq.store(seq.wrapping_add(2), Ordering::Release);

        // Flag first so spinners see it without the lock.
        self.has_updates_hint.store(true, Ordering::Release);
        {
            let mut state = self.state.lock().unwrap();
            state.bits.set(id);
            state.has_updates = true;
        }
        self.update_cv.notify_one();
    }

    /// Consistent `{bid, ask}` snapshot for `id`. Wait-free for readers as
    /// long as each slot has a single writer.
    #[inline]
    pub fn get(&self, id: SymbolId) -> BidAsk {
        let slot = &self.slots[id as usize];
        loop {
            let seq1 = slot.seq.load(Ordering::Acquire);
            if seq1 & 1 == 1 {
                std::hint::spin_loop();
                continue;
            }
            let bid = f64::from_bits(slot.bid_bits.load(Ordering::Relaxed));
            let ask = f64::from_bits(slot.ask_bits.load(Ordering::Relaxed));
            fence(Ordering::Acquire);
            let seq2 = slot.seq.load(Ordering::Relaxed);
            if seq1 == seq2 {
                return BidAsk { bid, ask };
            }
            std::hint::spin_loop();
        }
    }

    /// Read three slots for one arbitrage path, prefetching all of them
    /// before the first seqlock read.
    pub fn get_triple(&self, ids: [SymbolId; 3]) -> (BidAsk, BidAsk, BidAsk) {
        #[cfg(target_arch = "x86_64")]
        unsafe {
            use std::arch::x86_64::{_mm_prefetch, _MM_HINT_T0};
            for id in ids {
                _mm_prefetch::<{ _MM_HINT_T0 }>(
                    std::ptr::addr_of!(self.slots[id as usize]) as *const i8,
                );
            }
        }
        (self.get(ids[0]), self.get(ids[1]), self.get(ids[2]))
    }

    /// Block until updates arrive, then drain the bitmap. With a timeout,
    /// an empty set is returned on expiry so callers can poll a shutdown
    /// flag at a bounded cadence.
    pub fn wait_blocking(&self, timeout: Option<Duration>) -> DirtySet {
        let mut state = self.state.lock().unwrap();
        match timeout {
            Some(t) => {
                let (guard, result) = self
                    .update_cv
                    .wait_timeout_while(state, t, |s| !s.has_updates)
                    .unwrap();
                state = guard;
                if result.timed_out() && !state.has_updates {
                    return DirtySet::new();
                }
            }
            None => {
                state = self
                    .update_cv
                    .wait_while(state, |s| !s.has_updates)
                    .unwrap();
            }
        }
        self.drain_locked(&mut state)
    }

    /// Busy-poll the lock-free flag up to `max_spins` times, then fall back
    /// to a blocking wait. Hybrid mode for latency without a pinned core.
    pub fn wait_spin(&self, max_spins: u32, fallback_timeout: Option<Duration>) -> DirtySet {
        for _ in 0..max_spins {
            if self.has_updates_hint.load(Ordering::Acquire) {
                if let Some(set) = self.try_drain() {
                    return set;
                }
            }
            std::hint::spin_loop();
        }
        self.wait_blocking(fallback_timeout)
    }

    /// Spin until updates arrive. Burns the core; only for deployments with
    /// a dedicated strategy CPU.
    pub fn wait_busy(&self) -> DirtySet {
        loop {
            if self.has_updates_hint.load(Ordering::Acquire) {
                if let Some(set) = self.try_drain() {
                    return set;
                }
            }
            std::hint::spin_loop();
        }
    }

    /// Non-blocking drain; `None` when there is nothing pending.
    pub fn try_drain(&self) -> Option<DirtySet> {
        let mut state = self.state.lock().unwrap();
        if !state.has_updates {
            return None;
        }
        Some(self.drain_locked(&mut state))
    }

    pub fn has_updates(&self) -> bool {
        self.state.lock().unwrap().has_updates
    }

    fn drain_locked(&self, state: &mut DirtyState) -> DirtySet {
        let out = std::mem::take(&mut state.bits);
        state.has_updates = false;
        self.has_updates_hint.store(false, Ordering::Release);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_is_cache_line_sized() {
        assert_eq!(std::mem::size_of::<PriceSlot>(), 64);
        assert_eq!(std::mem::align_of::<PriceSlot>(), 64);
    }

    #[test]
    fn update_then_get_round_trips() {
        let book = PriceBook::new();
        book.update(5, 100.5, 100.6);
        let p = book.get(5);
        assert_eq!(p.bid, 100.5);
        assert_eq!(p.ask, 100.6);
    }

    #[test]
    fn zero_update_is_a_no_op() {
        let book = PriceBook::new();
        book.update(1, 0.0, 0.0);
        assert!(!book.has_updates());
        assert!(book.try_drain().is_none());
    }

    #[test]
    fn one_sided_update_preserves_other_side() {
        let book = PriceBook::new();
        book.update(2, 10.0, 11.0);
        book.update(2, 0.0, 11.5);
        let p = book.get(2);
        assert_eq!(p.bid, 10.0);
        assert_eq!(p.ask, 11.5);
    }

    #[test]
    fn drain_clears_bitmap_and_flag() {
        let book = PriceBook::new();
        book.update(3, 1.0, 2.0);
        book.update(7, 3.0, 4.0);

        let set = book.try_drain().unwrap();
        assert!(set.test(3));
        assert!(set.test(7));
        assert_eq!(set.count(), 2);
        assert!(!book.has_updates());
        assert!(book.try_drain().is_none());
    }

    #[test]
    fn timed_wait_returns_empty_on_timeout() {
        let book = PriceBook::new();
        let set = book.wait_blocking(Some(Duration::from_millis(10)));
        assert!(set.is_empty());
    }

    #[test]
    fn dirty_set_iterates_in_order() {
        let mut set = DirtySet::new();
        set.set(0);
        set.set(63);
        set.set(64);
        set.set(4095);
        let ids: Vec<SymbolId> = set.iter().collect();
        assert_eq!(ids, vec![0, 63, 64, 4095]);
    }

    #[test]
    fn get_triple_reads_three_slots() {
        let book = PriceBook::new();
        book.update(0, 1.0, 1.1);
        book.update(1, 2.0, 2.1);
        book.update(2, 3.0, 3.1);
        let (a, b, c) = book.get_triple([0, 1, 2]);
        assert_eq!(a.bid, 1.0);
        assert_eq!(b.ask, 2.1);
        assert_eq!(c.bid, 3.0);
    }
}
