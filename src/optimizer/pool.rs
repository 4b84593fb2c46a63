//! Worker pool scoped to a single tuning call

use crate::error::{Result, SweepError};
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Bounded pool of worker threads.
///
/// Moved into [`TunedFitter::tune`](super::TunedFitter::tune), which drops it on
/// return, so the threads never outlive the sweep that created them.
pub struct WorkerPool {
    pool: ThreadPool,
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(SweepError::ConfigError(
                "worker_count must be at least 1".to_string(),
            ));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("sweep-worker-{}", i))
            .build()?;
        Ok(Self { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `op` inside the pool; rayon parallel iterators in `op` use these workers
    pub fn install<R, F>(&self, op: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool").field("workers", &self.workers).finish()
    }
}
