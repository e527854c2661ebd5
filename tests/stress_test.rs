//! Stress tests for the karya pool

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use karya::{HandlerError, HandlerRegistry, OverflowPolicy, Pool, PoolConfig, TaskError};

#[test]
#[ignore] // Run with --ignored flag
fn stress_test_many_small_tasks() {
    let registry = HandlerRegistry::new().with("double", |n: i64| Ok(n * 2));
    let config = PoolConfig::builder().worker_count(8).build().unwrap();
    let pool = Pool::with_config(registry, config).unwrap();

    let handles: Vec<_> = (0..20_000i64)
        .map(|n| pool.submit("double", n).unwrap())
        .collect();

    let mut sum = 0i64;
    for handle in handles {
        sum += handle.wait().outcome.unwrap();
    }
    assert_eq!(sum, (0..20_000i64).map(|n| n * 2).sum::<i64>());

    let stats = pool.stats();
    assert_eq!(stats.completed, 20_000);
    assert_eq!(stats.failed, 0);

    pool.shutdown();
}

#[test]
#[ignore]
fn stress_test_contended_bounded_queue() {
    let registry = HandlerRegistry::new().with("triple", |n: i64| Ok(n * 3));
    let config = PoolConfig::builder()
        .worker_count(4)
        .bounded_queue(64)
        .on_queue_full(OverflowPolicy::Block)
        .build()
        .unwrap();
    let pool = Arc::new(Pool::with_config(registry, config).unwrap());

    let submitters: Vec<_> = (0..16)
        .map(|t| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                for i in 0..2_000i64 {
                    let n = t as i64 * 10_000 + i;
                    let handle = pool.submit("triple", n).unwrap();
                    assert_eq!(handle.wait().outcome, Ok(n * 3), "task {} wrong", n);
                }
            })
        })
        .collect();

    for submitter in submitters {
        submitter.join().unwrap();
    }
    assert_eq!(pool.stats().completed, 32_000);

    pool.shutdown();
}

#[test]
#[ignore]
fn stress_test_panic_storm() {
    let registry = HandlerRegistry::new().with("flaky", |n: i64| {
        if n % 10 == 0 {
            panic!("intentional panic");
        }
        Ok(n)
    });
    let config = PoolConfig::builder().worker_count(4).build().unwrap();
    let pool = Pool::with_config(registry, config).unwrap();

    let handles: Vec<_> = (0..10_000i64)
        .map(|n| pool.submit("flaky", n).unwrap())
        .collect();

    let mut panicked = 0u64;
    for (n, handle) in handles.into_iter().enumerate() {
        match handle.wait().outcome {
            Ok(value) => assert_eq!(value, n as i64),
            Err(TaskError::Panicked { .. }) => panicked += 1,
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
    assert_eq!(panicked, 1_000);
    assert_eq!(pool.stats().failed, 1_000);

    // The pool still works after the storm.
    assert_eq!(pool.submit("flaky", 1).unwrap().wait().outcome, Ok(1));

    pool.shutdown();
}

#[test]
#[ignore]
fn stress_test_repeated_pool_lifecycle() {
    for iteration in 0..100 {
        let registry = HandlerRegistry::new().with("echo", |n: i64| Ok(n));
        let config = PoolConfig::builder().worker_count(4).build().unwrap();
        let pool = Pool::with_config(registry, config).unwrap();

        let handles: Vec<_> = (0..100i64)
            .map(|n| pool.submit("echo", n).unwrap())
            .collect();
        for (n, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.wait().outcome, Ok(n as i64), "iteration {}", iteration);
        }

        pool.shutdown();
    }
}

#[test]
#[ignore]
fn stress_test_cancellation_churn() {
    let registry = HandlerRegistry::new().with("spin", |n: i64| {
        thread::sleep(Duration::from_micros(50));
        Ok(n)
    });
    let config = PoolConfig::builder().worker_count(2).build().unwrap();
    let pool = Pool::with_config(registry, config).unwrap();

    let handles: Vec<_> = (0..10_000i64)
        .map(|n| pool.submit("spin", n).unwrap())
        .collect();

    // Cancel every third task while the pool grinds through the backlog.
    for handle in handles.iter().skip(2).step_by(3) {
        handle.cancel();
    }

    // Every handle still resolves exactly once, one way or the other.
    for (n, handle) in handles.into_iter().enumerate() {
        match handle.wait().outcome {
            Ok(value) => assert_eq!(value, n as i64),
            Err(TaskError::Cancelled) => {}
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    pool.shutdown();
}

#[test]
#[ignore]
fn stress_test_large_payloads() {
    let registry = HandlerRegistry::new().with("checksum", |data: Vec<u8>| {
        if data.is_empty() {
            return Err(HandlerError::new("empty payload"));
        }
        Ok(data.iter().map(|&b| b as u64).sum::<u64>())
    });
    let config = PoolConfig::builder().worker_count(4).build().unwrap();
    let pool = Pool::with_config(registry, config).unwrap();

    let handles: Vec<_> = (0..200u64)
        .map(|n| {
            let payload = vec![(n % 251) as u8; 1 << 20];
            pool.submit("checksum", payload).unwrap()
        })
        .collect();

    for (n, handle) in handles.into_iter().enumerate() {
        let expected = ((n as u64) % 251) * (1 << 20);
        assert_eq!(handle.wait().outcome, Ok(expected));
    }

    pool.shutdown();
}

#[test]
#[ignore]
fn stress_test_shutdown_under_load() {
    let progress = Arc::new(Mutex::new(0u64));
    let seen = Arc::clone(&progress);
    let registry = HandlerRegistry::new().with("count", move |n: i64| {
        *seen.lock() += 1;
        Ok(n)
    });
    let config = PoolConfig::builder().worker_count(4).build().unwrap();
    let pool = Arc::new(Pool::with_config(registry, config).unwrap());

    let feeder = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || {
            let mut accepted = 0u64;
            for n in 0..1_000_000i64 {
                match pool.submit("count", n) {
                    Ok(handle) => {
                        drop(handle);
                        accepted += 1;
                    }
                    Err(_) => break,
                }
            }
            accepted
        })
    };

    thread::sleep(Duration::from_millis(50));
    pool.shutdown();
    let accepted = feeder.join().unwrap();

    // Whatever was accepted either ran or was dumped; nothing is left over
    // and nothing escapes the ledger.
    let stats = pool.stats();
    assert!(accepted > 0);
    assert_eq!(stats.submitted, accepted);
    assert_eq!(stats.queued_tasks, 0);
    assert_eq!(stats.in_flight_tasks, 0);
    assert_eq!(stats.completed + stats.failed, accepted);
    assert!(*progress.lock() <= accepted);
}
