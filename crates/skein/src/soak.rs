//! # Soak Driver
//!
//! Producer threads build strings and hand the handles over a channel;
//! consumer threads check the content and destroy them. Every string is
//! created on one thread and released on another, which is the pattern the
//! coarse pool lock has to hold up under.

#![allow(unsafe_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::bounded;

use skein_core::{Handle, PoolStats, StringPool};

/// Shape of a soak run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoakConfig {
    /// Threads creating strings.
    pub producers: usize,
    /// Threads verifying and destroying strings.
    pub consumers: usize,
    /// Strings created by each producer.
    pub strings_per_producer: usize,
    /// Channel capacity between the two sides.
    pub queue_depth: usize,
}

impl Default for SoakConfig {
    fn default() -> Self {
        Self {
            producers: 4,
            consumers: 4,
            strings_per_producer: 50_000,
            queue_depth: 1024,
        }
    }
}

/// Outcome of a soak run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoakReport {
    /// Strings handed to consumers.
    pub delivered: usize,
    /// Strings whose content did not match on the consumer side.
    pub mismatches: usize,
    /// Allocations that came back as the invalid handle.
    pub failed_allocations: usize,
    /// Pool occupancy once every thread has finished.
    pub stats: PoolStats,
}

/// Runs producers and consumers against `pool` until every string is consumed.
///
/// # Panics
///
/// Panics if a worker thread panics.
#[must_use]
pub fn run_soak(pool: &Arc<StringPool>, config: &SoakConfig) -> SoakReport {
    let (tx, rx) = bounded::<(Handle, String)>(config.queue_depth.max(1));
    let mismatches = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));

    let producers: Vec<_> = (0..config.producers)
        .map(|p| {
            let pool = Arc::clone(pool);
            let tx = tx.clone();
            let failed = Arc::clone(&failed);
            let count = config.strings_per_producer;
            thread::spawn(move || {
                for i in 0..count {
                    let stem = pool.create_from_bytes(format!("producer{p}/").as_bytes());
                    let path = pool.concat_bytes(stem, format!("item{i}").as_bytes());
                    let tagged = pool.concat_char(path, b';');
                    // SAFETY: intermediates never leave this thread.
                    unsafe {
                        pool.destroy(stem);
                        pool.destroy(path);
                    }

                    if !tagged.is_valid() {
                        failed.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                    if tx.send((tagged, format!("producer{p}/item{i};"))).is_err() {
                        break;
                    }
                }
            })
        })
        .collect();
    drop(tx);

    let consumers: Vec<_> = (0..config.consumers.max(1))
        .map(|_| {
            let pool = Arc::clone(pool);
            let rx = rx.clone();
            let mismatches = Arc::clone(&mismatches);
            thread::spawn(move || {
                let mut delivered = 0usize;
                for (handle, expected) in rx {
                    if pool.as_str(handle) != Some(expected.as_str()) {
                        mismatches.fetch_add(1, Ordering::Relaxed);
                        skein_core::pool_log!(&pool, tracing::Level::WARN, handle);
                    }
                    // SAFETY: the producer gave up the handle when it sent it.
                    unsafe { pool.destroy(handle) };
                    delivered += 1;
                }
                delivered
            })
        })
        .collect();

    for producer in producers {
        producer.join().expect("producer thread panicked");
    }
    let delivered = consumers
        .into_iter()
        .map(|c| c.join().expect("consumer thread panicked"))
        .sum();

    let report = SoakReport {
        delivered,
        mismatches: mismatches.load(Ordering::Relaxed),
        failed_allocations: failed.load(Ordering::Relaxed),
        stats: pool.stats(),
    };
    tracing::info!(
        delivered = report.delivered,
        mismatches = report.mismatches,
        failed = report.failed_allocations,
        pages = report.stats.pages,
        "soak run complete"
    );
    report
}
