//! End-to-end scenarios over the public API
//!
//! Each test here drives the store the way an application would: real
//! threads, real hand-offs, observable side effects only. The unit tests
//! under `src/tests/` cover the same machinery piece by piece; these check
//! the composed behavior.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use rcu_store::{guard_pack, Reclaimer, Store};

fn eventually(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// Scenario: single-writer, single-reader snapshot isolation.
///
/// Reader A pins {"k": 100}; writer B installs {"k": 200} while A's scope is
/// open; every load inside A's scope keeps seeing 100; a fresh scope sees
/// 200.
#[test]
fn snapshot_isolation_across_threads() {
    let store = Store::with_value(HashMap::from([(String::from("k"), 100i32)]));
    let store = &store;

    let (pinned_tx, pinned_rx) = mpsc::channel::<()>();
    let (updated_tx, updated_rx) = mpsc::channel::<()>();

    thread::scope(|scope| {
        scope.spawn(move || {
            {
                let g1 = store.load();
                assert_eq!(g1["k"], 100);
                pinned_tx.send(()).unwrap();

                updated_rx.recv().unwrap();
                let g2 = store.load();
                assert_eq!(g2["k"], 100);
                assert_eq!(g2.version(), g1.version());
            }

            let fresh = store.load();
            assert_eq!(fresh["k"], 200);
        });

        scope.spawn(move || {
            pinned_rx.recv().unwrap();
            store.update_value(HashMap::from([(String::from("k"), 200i32)]));
            updated_tx.send(()).unwrap();
        });
    });
}

/// Scenario: ten readers under a writer sweeping 1..=1000 never observe a
/// value outside the written range, and each reader's observations are
/// non-decreasing.
#[test]
fn multi_reader_stability() {
    const FINAL: u64 = 1000;

    let store = Store::with_value(1u64);
    let store = &store;

    thread::scope(|scope| {
        for _ in 0..10 {
            scope.spawn(move || {
                let mut last = 0;
                loop {
                    let value = *store.load();
                    assert!((1..=FINAL).contains(&value));
                    assert!(value >= last);
                    last = value;
                    if value == FINAL {
                        break;
                    }
                }
            });
        }

        scope.spawn(move || {
            for v in 2..=FINAL {
                store.update_value(v);
            }
        });
    });
}

/// Scenario: a pack over two sources stays coherent while a writer replaces
/// both payloads; a fresh pack sees both replacements.
#[test]
fn guard_pack_coherence_across_two_sources() {
    let numbers = Store::with_value(10i32);
    let labels = Store::with_value(String::from("hello"));
    let numbers = &numbers;
    let labels = &labels;

    let (pinned_tx, pinned_rx) = mpsc::channel::<()>();
    let (updated_tx, updated_rx) = mpsc::channel::<()>();

    thread::scope(|scope| {
        scope.spawn(move || {
            {
                let pack = guard_pack!(numbers, labels);
                pinned_tx.send(()).unwrap();
                updated_rx.recv().unwrap();

                assert_eq!(**pack.get::<0>(), 10);
                assert_eq!(pack.get::<1>().as_str(), "hello");
            }

            let pack = guard_pack!(numbers, labels);
            assert_eq!(**pack.get::<0>(), 20);
            assert_eq!(pack.get::<1>().as_str(), "world");
        });

        scope.spawn(move || {
            pinned_rx.recv().unwrap();
            numbers.update_value(20);
            labels.update_value(String::from("world"));
            updated_tx.send(()).unwrap();
        });
    });
}

/// Scenario: the reclaimer owns destruction. Five updates retire the
/// initial payload and the first four replacements; each destructor runs on
/// the reclaimer's worker thread. The last payload dies with store
/// teardown, on the worker as well.
#[test]
fn reclaimer_owns_destruction() {
    struct Recorder {
        drops: Arc<AtomicUsize>,
        dropped_on: Arc<Mutex<Vec<thread::ThreadId>>>,
    }

    impl Drop for Recorder {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
            self.dropped_on
                .lock()
                .unwrap()
                .push(thread::current().id());
        }
    }

    let drops = Arc::new(AtomicUsize::new(0));
    let dropped_on = Arc::new(Mutex::new(Vec::new()));
    let recorder = |drops: &Arc<AtomicUsize>, dropped_on: &Arc<Mutex<Vec<thread::ThreadId>>>| {
        Recorder {
            drops: Arc::clone(drops),
            dropped_on: Arc::clone(dropped_on),
        }
    };

    let reclaimer = Arc::new(
        Reclaimer::builder()
            .scan_interval(Duration::from_millis(1))
            .build(),
    );
    let worker = reclaimer.thread_id();

    let store = Store::with_reclaimer(
        Some(Arc::new(recorder(&drops, &dropped_on))),
        Arc::clone(&reclaimer),
    );

    for _ in 0..5 {
        store.update_value(recorder(&drops, &dropped_on));
    }

    assert!(eventually(|| drops.load(Ordering::SeqCst) == 5));

    drop(store);
    drop(reclaimer);

    assert_eq!(drops.load(Ordering::SeqCst), 6);
    assert!(dropped_on.lock().unwrap().iter().all(|id| *id == worker));
}

/// Scenario: a short-lived worker thread uses `load_with_tls_release` so
/// its slot is evicted at scope end: empty handle, version one less than
/// the source's, slow path on the next load.
#[test]
fn release_scheduled_slot_eviction() {
    let store = Store::with_value(String::from("payload"));
    store.update_value(String::from("fresher payload"));
    let store = &store;

    thread::scope(|scope| {
        scope.spawn(move || {
            {
                let data = store.load_with_tls_release();
                assert_eq!(data.as_str(), "fresher payload");
            }

            let state = store.slot_state();
            assert!(!state.holds_payload);
            assert_eq!(state.ref_count, 0);
            assert_eq!(state.version, store.version() - 1);

            // The next load is forced through the source again
            let reloaded = store.load();
            assert_eq!(reloaded.as_str(), "fresher payload");
            assert_eq!(reloaded.version(), store.version());
        });
    });
}

/// Scenario: a mixed workload — two stores sharing one reclaimer, pack
/// readers, plain readers, short-lived workers and two writers — finishes
/// with every payload destroyed exactly once.
#[test]
fn mixed_workload_accounts_for_every_payload() {
    struct Counted {
        drops: Arc<AtomicUsize>,
        value: u64,
    }

    impl Drop for Counted {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    const UPDATES: usize = 200;

    let created = Arc::new(AtomicUsize::new(0));
    let drops = Arc::new(AtomicUsize::new(0));
    let counted = |value: u64| {
        created.fetch_add(1, Ordering::SeqCst);
        Counted {
            drops: Arc::clone(&drops),
            value,
        }
    };

    let reclaimer = Arc::new(Reclaimer::new());
    let left_store = Store::with_reclaimer(Some(Arc::new(counted(0))), Arc::clone(&reclaimer));
    let right_store = Store::with_reclaimer(Some(Arc::new(counted(0))), Arc::clone(&reclaimer));
    let left = &left_store;
    let right = &right_store;

    thread::scope(|scope| {
        // Pack readers
        for _ in 0..2 {
            scope.spawn(move || {
                for _ in 0..200 {
                    let pack = guard_pack!(left, right);
                    let l = pack.get::<0>().value;
                    let r = pack.get::<1>().value;
                    assert!(l <= UPDATES as u64);
                    assert!(r <= UPDATES as u64);
                }
            });
        }

        // Short-lived workers evicting their slots before exit
        scope.spawn(move || {
            for _ in 0..20 {
                thread::scope(|inner| {
                    inner.spawn(move || {
                        let data = left.load_with_tls_release();
                        assert!(data.is_present());
                    });
                });
            }
        });

        // Writers
        let left_counted = &counted;
        scope.spawn(move || {
            for v in 1..=UPDATES as u64 {
                left.update_value(left_counted(v));
            }
        });
        let right_counted = &counted;
        scope.spawn(move || {
            for v in 1..=UPDATES as u64 {
                right.update_value(right_counted(v));
            }
        });
    });

    drop(left_store);
    drop(right_store);
    drop(reclaimer);

    assert_eq!(
        drops.load(Ordering::SeqCst),
        created.load(Ordering::SeqCst)
    );
}
