//! Concurrency tests for the seqlock price book and its wait primitives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::Rng;
use tarn_core::{DirtySet, PriceBook};

/// A reader must never observe a bid/ask pair from two different writes.
/// The writer keeps an exact invariant between the sides; any torn read
/// breaks it.
#[test]
fn seqlock_readers_never_see_torn_pairs() {
    const ID: u16 = 17;
    const SPREAD: f64 = 0.5;
    const WRITES: usize = 200_000;

    let book = Arc::new(PriceBook::new());
    let stop = Arc::new(AtomicBool::new(false));

    let writer = {
        let book = Arc::clone(&book);
        thread::spawn(move || {
            let mut rng = rand::thread_rng();
            for _ in 0..WRITES {
                let bid: f64 = rng.gen_range(1.0..100_000.0);
                book.update(ID, bid, bid + SPREAD);
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let book = Arc::clone(&book);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut observed = 0u64;
                while !stop.load(Ordering::Relaxed) {
                    let p = book.get(ID);
                    if p.bid == 0.0 && p.ask == 0.0 {
                        continue; // before the first write
                    }
                    assert!(
                        (p.ask - p.bid - SPREAD).abs() < 1e-9,
                        "torn read: bid={}, ask={}",
                        p.bid,
                        p.ask
                    );
                    observed += 1;
                }
                observed
            })
        })
        .collect();

    writer.join().unwrap();
    stop.store(true, Ordering::Relaxed);
    let total: u64 = readers.into_iter().map(|r| r.join().unwrap()).sum();
    assert!(total > 0, "readers never observed a price");
}

/// An update that returned must be visible to the next drain.
#[test]
fn dirty_bit_liveness() {
    let book = PriceBook::new();
    book.update(9, 1.0, 1.1);

    let set = book.wait_blocking(Some(Duration::from_secs(1)));
    assert!(set.test(9));

    // Drained; nothing pending until the next update.
    assert!(book.wait_blocking(Some(Duration::from_millis(10))).is_empty());

    book.update(10, 2.0, 2.1);
    let set = book.wait_blocking(Some(Duration::from_secs(1)));
    assert!(set.test(10));
    assert!(!set.test(9));
}

#[test]
fn blocking_wait_wakes_on_update_from_other_thread() {
    let book = Arc::new(PriceBook::new());

    let writer = {
        let book = Arc::clone(&book);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            book.update(100, 5.0, 5.1);
        })
    };

    let set = book.wait_blocking(Some(Duration::from_secs(5)));
    assert!(set.test(100));
    writer.join().unwrap();
}

#[test]
fn spin_wait_picks_up_update_without_blocking() {
    let book = PriceBook::new();
    book.update(3, 1.0, 2.0);

    let set = book.wait_spin(1_000, Some(Duration::from_millis(10)));
    assert!(set.test(3));
}

#[test]
fn spin_wait_falls_back_to_timed_block() {
    let book = PriceBook::new();
    let start = std::time::Instant::now();
    let set = book.wait_spin(100, Some(Duration::from_millis(20)));
    assert!(set.is_empty());
    assert!(start.elapsed() >= Duration::from_millis(20));
}

#[test]
fn busy_wait_returns_once_updates_arrive() {
    let book = Arc::new(PriceBook::new());

    let writer = {
        let book = Arc::clone(&book);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            book.update(200, 9.0, 9.1);
        })
    };

    let set = book.wait_busy();
    assert!(set.test(200));
    writer.join().unwrap();
}

/// Updates racing a drain either land in the drained set or remain pending
/// for the next one; none are lost.
#[test]
fn no_update_is_lost_across_concurrent_drains() {
    const WRITES_PER_ID: usize = 5_000;
    let book = Arc::new(PriceBook::new());
    let done = Arc::new(AtomicBool::new(false));

    let drainer = {
        let book = Arc::clone(&book);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut seen = DirtySet::new();
            loop {
                let set = book.wait_blocking(Some(Duration::from_millis(5)));
                for id in set.iter() {
                    seen.set(id);
                }
                if done.load(Ordering::Acquire) && !book.has_updates() {
                    return seen;
                }
            }
        })
    };

    let writer = {
        let book = Arc::clone(&book);
        thread::spawn(move || {
            for i in 0..WRITES_PER_ID {
                for id in [11u16, 22, 33] {
                    book.update(id, i as f64 + 1.0, i as f64 + 1.5);
                }
            }
        })
    };

    writer.join().unwrap();
    done.store(true, Ordering::Release);
    let seen = drainer.join().unwrap();

    for id in [11u16, 22, 33] {
        assert!(seen.test(id), "updates for id {id} were lost");
    }
}
