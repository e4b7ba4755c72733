//! Stress tests for the sync engine.
//!
//! These drive an engine from several threads at once and report how many
//! operations succeeded.

use crate::fixtures::{record_on, start_date, MemoryEngine};
use chrono::Days;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Operations per thread.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 250,
            threads: 4,
        }
    }
}

fn run_threads<F>(config: &StressConfig, op: F) -> StressTestResult
where
    F: Fn(usize, usize) -> bool + Send + Sync + 'static,
{
    let op = Arc::new(op);
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|thread_id| {
            let op = Arc::clone(&op);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let operations = config.operations;

            thread::spawn(move || {
                for i in 0..operations {
                    if op(thread_id, i) {
                        successful.fetch_add(1, Ordering::Relaxed);
                    } else {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Saves records from every thread at once.
pub fn stress_concurrent_saves(engine: Arc<MemoryEngine>, config: &StressConfig) -> StressTestResult {
    run_threads(config, move |thread_id, i| {
        let date = start_date() + Days::new(i as u64);
        let weight = 60.0 + thread_id as f64;
        engine.save_local(record_on(date, weight)).is_ok()
    })
}

/// Interleaves saves, upload passes and download passes.
///
/// Thread 0 saves; the others alternate between uploading and downloading.
pub fn stress_mixed_passes(engine: Arc<MemoryEngine>, config: &StressConfig) -> StressTestResult {
    run_threads(config, move |thread_id, i| match (thread_id, i % 2) {
        (0, _) => engine
            .save_local(record_on(start_date() + Days::new(i as u64), 70.0))
            .is_ok(),
        (_, 0) => engine.sync_to_cloud().is_ok(),
        _ => engine.sync_from_cloud().is_ok(),
    })
}
