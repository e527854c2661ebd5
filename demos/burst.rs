//! Backpressure and cancellation under a submission burst.
//!
//! A two-worker pool with a small bounded queue absorbs a burst of hashing
//! tasks that arrive faster than they drain. Overflowing submissions are
//! rejected, one pending task is cancelled, and one wait is given a deadline.
//!
//! Run with `cargo run --example burst`.

use std::time::Duration;

use karya::{HandlerRegistry, OverflowPolicy, Pool, PoolConfig, PoolError};

fn digest(password: &str, rounds: u32) -> String {
    let mut hash: u64 = 0;
    for _ in 0..rounds {
        for (i, &byte) in password.as_bytes().iter().enumerate() {
            hash = hash
                .wrapping_mul(31)
                .wrapping_add(byte as u64)
                .wrapping_add(i as u64);
        }
    }
    format!("{:016x}", hash)
}

fn main() -> karya::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let registry = HandlerRegistry::new().with("digest", |(password, rounds): (String, u32)| {
        Ok(digest(&password, rounds))
    });

    let config = PoolConfig::builder()
        .worker_count(2)
        .bounded_queue(8)
        .on_queue_full(OverflowPolicy::Reject)
        .build()?;
    let pool = Pool::with_config(registry, config)?;

    let mut handles = Vec::new();
    let mut rejected = 0usize;
    for n in 0..32u32 {
        match pool.submit("digest", (format!("user-{}", n), 200_000)) {
            Ok(handle) => handles.push(handle),
            Err(PoolError::QueueFull { .. }) => rejected += 1,
            Err(err) => return Err(err),
        }
    }
    println!("burst of 32: {} accepted, {} rejected", handles.len(), rejected);

    // Cancel the newest pending task outright.
    if let Some(handle) = handles.pop() {
        println!("cancel task {}: {:?}", handle.id(), handle.cancel());
    }

    // Wait on the next one, but only briefly.
    if let Some(handle) = handles.pop() {
        match handle.wait_timeout(Duration::from_millis(1)) {
            Ok(result) => println!("task {} finished early: {:?}", result.task_id, result.outcome),
            Err(PoolError::WaitTimeout { .. }) => {
                println!("task {} missed the deadline, abandoning it", handle.id());
            }
            Err(err) => return Err(err),
        }
    }

    for handle in handles {
        let result = handle.wait();
        match result.outcome {
            Ok(hash) => println!("task {} -> {}", result.task_id, hash),
            Err(err) => println!("task {} -> {}", result.task_id, err),
        }
    }

    let stats = pool.stats();
    println!(
        "submitted {} completed {} cancelled {} rejected {}",
        stats.submitted, stats.completed, stats.cancelled, stats.rejected
    );
    pool.shutdown();
    Ok(())
}
