use super::{dirty, probe};
use herder_memory::{AdmissionError, AdmissionReason, IndexKey, MemoryHerder};
use std::sync::atomic::Ordering;
use std::sync::{mpsc, Arc, Barrier};
use std::thread;

#[test]
fn admits_iff_both_ceilings_hold() {
    // app 800, index 600, query 400
    let herder = MemoryHerder::new(1_000, 0.8, 0.75, 0.5);
    let indexing = dirty(0);
    herder.register(IndexKey::new(1), probe(&indexing));

    let cases = [
        // (indexing, running, size)
        (0, 0, 400),
        (0, 100, 300),
        (0, 100, 301),
        (400, 0, 400),
        (401, 0, 400),
        (600, 150, 50),
        (600, 150, 51),
    ];

    for (index_bytes, running, size) in cases {
        indexing.store(index_bytes, Ordering::SeqCst);
        if running > 0 {
            herder.start_query(running).unwrap();
        }

        let expected = running + size <= 400 && running + size + index_bytes <= 800;
        let outcome = herder.start_query(size);
        assert_eq!(
            outcome.is_ok(),
            expected,
            "indexing={index_bytes} running={running} size={size}: {outcome:?}"
        );

        match outcome {
            Ok(()) => {
                assert_eq!(herder.running_query_bytes(), running + size);
                herder.end_query(size);
            }
            Err(err) => {
                let reason = if running + size > 400 {
                    AdmissionReason::Query
                } else {
                    AdmissionReason::App
                };
                assert_eq!(err.reason(), reason);
                assert_eq!(herder.running_query_bytes(), running);
            }
        }

        if running > 0 {
            herder.end_query(running);
        }
        assert_eq!(herder.running_query_bytes(), 0);
    }
}

#[test]
fn query_ceiling_is_checked_before_indexing() {
    let herder = MemoryHerder::new(1_000, 0.8, 1.0, 0.5);
    herder.register(IndexKey::new(1), Box::new(|| 800));

    // Both ceilings are exceeded; the query ceiling is reported.
    let err = herder.start_query(500).unwrap_err();
    assert_eq!(
        err,
        AdmissionError::QueryQuotaExceeded {
            size: 500,
            running: 0,
            quota: 400
        }
    );
}

#[test]
fn zero_sized_queries_are_admitted_until_a_ceiling_is_already_crossed() {
    let herder = MemoryHerder::new(1_000, 0.8, 1.0, 0.5);
    herder.start_query(0).unwrap();
    herder.end_query(0);

    let indexing = dirty(800);
    herder.register(IndexKey::new(1), probe(&indexing));
    herder.start_query(0).unwrap();

    // Indexing grew after registration; nothing more fits.
    indexing.store(801, Ordering::SeqCst);
    assert_eq!(
        herder.start_query(0).unwrap_err().reason(),
        AdmissionReason::App
    );
}

#[test]
fn concurrent_queries_never_oversubscribe_query_quota() {
    let herder = MemoryHerder::new(1_000, 0.8, 0.5, 0.5);
    let threads = 16;
    let barrier = Arc::new(Barrier::new(threads));
    let (tx, rx) = mpsc::channel();

    for _ in 0..threads {
        let herder = herder.clone();
        let barrier = barrier.clone();
        let tx = tx.clone();
        thread::spawn(move || {
            barrier.wait();
            let admitted = herder.admit_query(100);
            let _ = tx.send(admitted.is_ok());
            // Hold the permit until every thread has tried.
            barrier.wait();
            drop(admitted);
        });
    }
    drop(tx);

    let admitted = rx.iter().filter(|ok| *ok).count();
    assert_eq!(admitted, 4);
    // Every sender is dropped only after its permit.
    assert_eq!(herder.running_query_bytes(), 0);
}
