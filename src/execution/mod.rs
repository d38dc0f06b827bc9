//! Worker pool for per-record estimation.
//!
//! Records are mapped on a dedicated rayon pool sized from
//! [`ExecutionConfig::max_concurrent_requests`]. With one thread (the default) records run
//! strictly one after another; with more, independent records are estimated concurrently.
//! Either way the output keeps input order.

use std::time::Instant;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use tracing::debug;

use crate::config::ExecutionConfig;

#[derive(Debug)]
pub struct ExecutionEngine {
    pool: ThreadPool,
}

impl ExecutionEngine {
    /// An engine with `threads` workers. Zero is treated as one.
    pub fn new(threads: usize) -> Result<Self, ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("estimate-{i}"))
            .build()?;
        Ok(Self { pool })
    }

    pub fn from_config(config: &ExecutionConfig) -> Result<Self, ThreadPoolBuildError> {
        Self::new(config.max_concurrent_requests)
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Apply `f` to every item. The output has the same length and order as `items`.
    pub fn map_items<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Send + Sync,
    {
        let start = Instant::now();
        let out: Vec<R> = self.pool.install(|| items.par_iter().map(f).collect());
        debug!(
            items = items.len(),
            threads = self.threads(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "estimation batch finished"
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::ExecutionEngine;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::config::ExecutionConfig;

    fn max_concurrency(engine: &ExecutionEngine, n: usize) -> usize {
        let active = AtomicUsize::new(0);
        let max_active = AtomicUsize::new(0);
        let items: Vec<usize> = (0..n).collect();

        engine.map_items(&items, |_| {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            max_active.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(2));
            active.fetch_sub(1, Ordering::SeqCst);
        });
        max_active.load(Ordering::SeqCst)
    }

    #[test]
    fn map_items_preserves_input_order() {
        let engine = ExecutionEngine::new(4).unwrap();
        let items: Vec<u64> = (0..200).collect();

        let out = engine.map_items(&items, |x| {
            // Later items finish first.
            std::thread::sleep(Duration::from_micros(200 - *x));
            x * 2
        });

        assert_eq!(out, items.iter().map(|x| x * 2).collect::<Vec<_>>());
    }

    #[test]
    fn default_config_is_strictly_sequential() {
        let engine = ExecutionEngine::from_config(&ExecutionConfig::default()).unwrap();
        assert_eq!(engine.threads(), 1);
        assert_eq!(max_concurrency(&engine, 50), 1);
    }

    #[test]
    fn concurrency_is_bounded_by_configured_requests() {
        let engine = ExecutionEngine::from_config(&ExecutionConfig {
            max_concurrent_requests: 3,
        })
        .unwrap();
        let observed = max_concurrency(&engine, 120);
        assert!(observed > 1);
        assert!(observed <= 3);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let engine = ExecutionEngine::new(2).unwrap();
        let out: Vec<u8> = engine.map_items(&[] as &[u8], |x| *x);
        assert!(out.is_empty());
    }
}
