use crate::config::WorkerConfig;
use crate::error::{Result, SimError};
use crate::rng::Rng;
use log::{error, info};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Trials handed to one task; each chunk owns its own seeded generator.
pub const CHUNK_SIZE: usize = 64;

/// Thread pool for the embarrassingly parallel Monte Carlo loops.
#[derive(Clone)]
pub struct SimWorker {
    pool: Arc<ThreadPool>,
    num_threads: usize,
}

impl SimWorker {
    pub fn new(requested_threads: usize) -> Result<Self> {
        let num_threads = if requested_threads == 0 {
            default_threads(1)
        } else {
            requested_threads
        };
        Self::build_pool(num_threads, 4 * 1024 * 1024)
    }

    pub fn new_with_config(config: &WorkerConfig) -> Result<Self> {
        let mut num_threads = default_threads(config.reserve_cores);
        if config.max_threads > 0 && num_threads > config.max_threads {
            num_threads = config.max_threads;
        }
        let stack_mb = if config.stack_size_mb == 0 {
            4
        } else {
            config.stack_size_mb
        };
        Self::build_pool(num_threads, stack_mb * 1024 * 1024)
    }

    fn build_pool(num_threads: usize, stack_size: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("sim-worker-{}", i))
            .stack_size(stack_size)
            .panic_handler(|err| {
                error!("Worker thread panicked: {:?}", err);
            })
            .build()
            .map_err(|e| SimError::Worker(e.to_string()))?;

        info!("Worker initialized with {} threads.", num_threads);

        Ok(Self {
            pool: Arc::new(pool),
            num_threads,
        })
    }

    /// Runs `f` inside the pool, turning a panic into an error.
    pub fn execute<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool
            .install(|| panic::catch_unwind(AssertUnwindSafe(f)))
            .map_err(|err| {
                let msg = if let Some(s) = err.downcast_ref::<&str>() {
                    format!("task panicked: {}", s)
                } else if let Some(s) = err.downcast_ref::<String>() {
                    format!("task panicked: {}", s)
                } else {
                    "task panicked with unknown error".to_string()
                };
                SimError::Worker(msg)
            })
    }

    /// Splits `total` trials into [`CHUNK_SIZE`] chunks, runs `map` on each with
    /// `Rng::fork(base_seed, chunk)` and folds the partial results with `reduce`.
    ///
    /// For a fixed seed the result does not depend on the thread count.
    pub fn map_chunks<T, M, Id, Red>(
        &self,
        total: usize,
        base_seed: u64,
        identity: Id,
        map: M,
        reduce: Red,
    ) -> Result<T>
    where
        T: Send,
        M: Fn(Range<usize>, &mut Rng) -> T + Sync,
        Id: Fn() -> T + Sync + Send,
        Red: Fn(T, T) -> T + Sync + Send,
    {
        let chunk_count = total.div_ceil(CHUNK_SIZE);
        self.execute(|| {
            (0..chunk_count)
                .into_par_iter()
                .map(|chunk| {
                    let start = chunk * CHUNK_SIZE;
                    let end = (start + CHUNK_SIZE).min(total);
                    let mut rng = Rng::fork(base_seed, chunk as u64);
                    map(start..end, &mut rng)
                })
                .reduce(&identity, &reduce)
        })
    }

    pub fn thread_count(&self) -> usize {
        self.num_threads
    }
}

fn default_threads(reserve_cores: usize) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    if cores > reserve_cores {
        cores - reserve_cores
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::Sampler;

    #[test]
    fn map_chunks_visits_every_trial_once() {
        let worker = SimWorker::new(2).unwrap();
        let count = worker
            .map_chunks(1_000, 7, || 0usize, |range, _| range.len(), |a, b| a + b)
            .unwrap();
        assert_eq!(count, 1_000);
    }

    #[test]
    fn results_do_not_depend_on_thread_count() {
        let run = |threads| {
            SimWorker::new(threads)
                .unwrap()
                .map_chunks(
                    500,
                    42,
                    || 0.0f64,
                    |range, rng| range.map(|_| rng.next_f64()).sum::<f64>(),
                    |a, b| a + b,
                )
                .unwrap()
        };
        assert!((run(1) - run(3)).abs() < 1e-9);
    }

    #[test]
    fn panics_become_errors() {
        let worker = SimWorker::new(1).unwrap();
        let res: Result<()> = worker.execute(|| panic!("boom"));
        assert!(matches!(res, Err(SimError::Worker(msg)) if msg.contains("boom")));
        assert_eq!(worker.thread_count(), 1);
    }
}
