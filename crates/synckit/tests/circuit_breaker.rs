//! Circuit breaker scenarios, including the reset-on-close property

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use synckit::{
    BreakerCounters, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState,
};

#[derive(Debug, PartialEq)]
struct Unavailable;

fn breaker(failure_threshold: u32, success_threshold: u32, timeout: Duration) -> CircuitBreaker {
    CircuitBreaker::with_name(
        "downstream",
        CircuitBreakerConfig::new()
            .with_failure_threshold(failure_threshold)
            .with_success_threshold(success_threshold)
            .with_reset_timeout(timeout),
    )
}

#[test_log::test]
fn test_trip_recover_and_tolerate_fresh_failures() {
    let breaker = breaker(3, 2, Duration::from_millis(50));

    for _ in 0..3 {
        let err = breaker.execute(|| Err::<(), _>(Unavailable)).unwrap_err();
        assert_eq!(err.into_operation_error(), Some(Unavailable));
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    thread::sleep(Duration::from_millis(60));

    breaker.execute(|| Ok::<_, Unavailable>(())).unwrap();
    breaker.execute(|| Ok::<_, Unavailable>(())).unwrap();
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(
        breaker.counters(),
        BreakerCounters {
            failures: 0,
            successes: 0
        }
    );

    let _ = breaker.execute(|| Err::<(), _>(Unavailable));
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.counters().failures, 1);

    // A full new run of failures is needed to trip again
    let _ = breaker.execute(|| Err::<(), _>(Unavailable));
    assert_eq!(breaker.state(), CircuitState::Closed);
    let _ = breaker.execute(|| Err::<(), _>(Unavailable));
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[test]
fn test_open_rejection_is_distinct_and_skips_operation() {
    let breaker = breaker(1, 1, Duration::from_secs(60));
    let calls = AtomicUsize::new(0);

    let first = breaker.execute(|| {
        calls.fetch_add(1, Ordering::SeqCst);
        Err::<(), _>(Unavailable)
    });
    assert!(matches!(first, Err(CircuitBreakerError::Operation(Unavailable))));

    for _ in 0..10 {
        let rejected = breaker.execute(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Unavailable>(())
        });
        assert!(matches!(rejected, Err(CircuitBreakerError::Open)));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_probe_failure_after_successes_reopens() {
    let breaker = breaker(2, 3, Duration::from_millis(20));
    let _ = breaker.execute(|| Err::<(), _>(Unavailable));
    let _ = breaker.execute(|| Err::<(), _>(Unavailable));

    thread::sleep(Duration::from_millis(30));
    breaker.execute(|| Ok::<_, Unavailable>(())).unwrap();
    breaker.execute(|| Ok::<_, Unavailable>(())).unwrap();
    assert_eq!(breaker.snapshot().counters.successes, 2);

    let _ = breaker.execute(|| Err::<(), _>(Unavailable));
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(breaker.counters().successes, 0);
}

#[test]
fn test_concurrent_inspection_sees_consistent_counters() {
    let breaker = breaker(1_000, 1, Duration::from_secs(60));

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for i in 0..200 {
                    let _ = breaker.execute(|| {
                        if i % 2 == 0 {
                            Ok(())
                        } else {
                            Err(Unavailable)
                        }
                    });
                }
            });
        }
        s.spawn(|| {
            for _ in 0..500 {
                let snapshot = breaker.snapshot();
                assert_eq!(snapshot.state, CircuitState::Closed);
                assert_eq!(snapshot.counters.successes, 0);
                assert!(snapshot.counters.failures <= 400);
            }
        });
    });

    assert_eq!(breaker.counters().failures, 400);
}
