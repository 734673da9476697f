//! Conformance tests for the fork/join range reduction.
//!
//! The arithmetic-sum identity must hold exactly, every trial, for every
//! range size and for both rooting shapes; overflow must surface as a typed
//! error rather than a wrong number.

use std::sync::Arc;

use poolwitness::{expected_sum, reduce_on, Error, EvidenceCollector, PoolOptions, WorkerPool};

const SIZES: &[u64] = &[1, 2, 3, 4, 5, 10, 63, 64, 65, 100, 1_000, 10_000, 123_456];

fn pool(parallelism: usize) -> WorkerPool {
    WorkerPool::with_options(PoolOptions {
        parallelism,
        ..PoolOptions::default()
    })
}

#[test]
fn caller_rooted_sums_match_identity() {
    let pool = pool(4);
    let handle = pool.handle();
    for &n in SIZES {
        let evidence = Arc::new(EvidenceCollector::new());
        let sum = reduce_on(&handle, &handle, &evidence, 1, n).expect("reduction failed");
        assert_eq!(sum, n * (n + 1) / 2, "n = {n}");
    }
}

#[test]
fn pool_rooted_sums_match_identity() {
    let pool = pool(4);
    let handle = pool.handle();
    for &n in SIZES {
        let evidence = Arc::new(EvidenceCollector::new());
        let exec = handle.clone();
        let witness = handle.clone();
        let shared = Arc::clone(&evidence);
        let sum = handle
            .invoke(move || reduce_on(&exec, &witness, &shared, 1, n))
            .expect("reduction failed");
        assert_eq!(sum, expected_sum(n).expect("checksum overflow"), "n = {n}");
    }
}

#[test]
fn single_worker_pool_still_sums_correctly() {
    let pool = pool(1);
    let handle = pool.handle();
    let evidence = Arc::new(EvidenceCollector::new());
    let sum = reduce_on(&handle, &handle, &evidence, 1, 10_000).expect("reduction failed");
    assert_eq!(sum, 50_005_000);
}

#[test]
fn sums_are_stable_across_repeated_trials() {
    // Scheduling varies run to run; the sum must not.
    let pool = pool(4);
    let handle = pool.handle();
    for _ in 0..50 {
        let evidence = Arc::new(EvidenceCollector::new());
        let sum = reduce_on(&handle, &handle, &evidence, 1, 100).expect("reduction failed");
        assert_eq!(sum, 5050);
    }
}

#[test]
fn reduction_overflow_is_a_typed_error() {
    let pool = pool(2);
    let handle = pool.handle();
    let evidence = Arc::new(EvidenceCollector::new());
    let result = reduce_on(&handle, &handle, &evidence, u64::MAX - 100, u64::MAX);
    assert!(matches!(result, Err(Error::SumOverflow { .. })));
}

#[test]
fn checksum_overflow_is_a_typed_error() {
    assert!(matches!(
        expected_sum(u64::MAX),
        Err(Error::ChecksumOverflow { n }) if n == u64::MAX
    ));
}
