//! CPU-bound task fan-out: prime counting and Fibonacci on a shared pool.
//!
//! Run with `cargo run --example primes`. Set `RUST_LOG=karya=debug` to
//! watch the pool lifecycle.

use std::time::Instant;

use karya::{HandlerRegistry, Pool, PoolConfig};

fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n == 2 {
        return true;
    }
    if n % 2 == 0 {
        return false;
    }
    let mut i = 3;
    while i * i <= n {
        if n % i == 0 {
            return false;
        }
        i += 2;
    }
    true
}

fn count_primes(max: u64) -> u64 {
    (2..=max).filter(|&n| is_prime(n)).count() as u64
}

fn fibonacci(n: u64) -> u64 {
    let (mut a, mut b) = (0u64, 1u64);
    for _ in 0..n {
        let next = a + b;
        a = b;
        b = next;
    }
    a
}

fn main() -> karya::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let registry = HandlerRegistry::new()
        .with("count_primes", |max: u64| Ok(count_primes(max)))
        .with("fib", |n: u64| Ok(fibonacci(n)));

    let config = PoolConfig::builder().worker_count(4).build()?;
    let pool = Pool::with_config(registry, config)?;
    let started = Instant::now();

    let limits = [10_000u64, 50_000, 100_000, 250_000, 500_000];
    let prime_handles = limits
        .iter()
        .map(|&max| pool.submit("count_primes", max))
        .collect::<karya::Result<Vec<_>>>()?;
    let fib_handles = (40..=50u64)
        .map(|n| pool.submit("fib", n))
        .collect::<karya::Result<Vec<_>>>()?;

    for (&max, handle) in limits.iter().zip(prime_handles) {
        let result = handle.wait();
        match (result.outcome, result.worker) {
            (Ok(count), Some(worker)) => {
                println!(
                    "primes below {:>7}: {:>6}  ({:?} on worker {})",
                    max, count, result.duration, worker
                );
            }
            (outcome, _) => eprintln!("task {} went sideways: {:?}", result.task_id, outcome),
        }
    }

    for (n, handle) in (40..=50u64).zip(fib_handles) {
        if let Ok(value) = handle.wait().outcome {
            println!("fib({}) = {}", n, value);
        }
    }

    let stats = pool.stats();
    println!(
        "{} tasks across {} workers in {:?}",
        stats.completed,
        stats.pool_size,
        started.elapsed()
    );
    pool.shutdown();
    Ok(())
}
