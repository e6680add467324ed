//! Bounded worker pool for parallel dispatch
//!
//! Parallel `ask`/`create` hand agents to a dedicated rayon pool. The pool is
//! owned by the runtime (never the global rayon pool) so its size follows
//! `RuntimeConfig::worker_threads`.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use super::RuntimeConfig;
use super::agent::AgentRef;
use super::error::{ExecError, ExecResult};
use crate::interpreter::value::Value;

/// Dedicated thread pool for parallel agent dispatch
pub struct WorkerPool {
    pool: ThreadPool,
    threads: usize,
}

impl WorkerPool {
    /// Build a pool with `threads` workers (at least one)
    pub fn new(threads: usize) -> ExecResult<Self> {
        let threads = threads.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|idx| format!("herd-worker-{}", idx))
            .build()
            .map_err(|err| ExecError::Pool(err.to_string()))?;
        Ok(Self { pool, threads })
    }

    /// Number of worker threads
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Run `job` for every target on the pool, in chunks of at least
    /// `min_chunk` agents. Results come back in target order.
    pub fn run<T, F>(&self, targets: &[AgentRef], min_chunk: usize, job: F) -> Vec<T>
    where
        T: Send,
        F: Fn(&AgentRef) -> T + Send + Sync,
    {
        self.pool.install(|| {
            targets
                .par_iter()
                .with_min_len(min_chunk.max(1))
                .map(|agent| job(agent))
                .collect()
        })
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads)
            .finish()
    }
}

/// Parallel threshold requested by a `parallel:` facet value
///
/// `true` selects the configured default, an integer `n` selects `|n|`,
/// anything else (including `false` or no facet) disables parallelism and
/// yields 0. A dispatch runs sequentially whenever the number of targets does
/// not exceed the threshold.
pub fn parallel_threshold(hint: &Value, config: &RuntimeConfig) -> usize {
    match hint {
        Value::Bool(true) => config.parallel_threshold,
        Value::Int(n) => n.unsigned_abs() as usize,
        Value::Float(n) => n.abs() as usize,
        _ => 0,
    }
}

/// Whether `targets` agents should be dispatched in parallel for `threshold`
pub fn runs_in_parallel(threshold: usize, targets: usize) -> bool {
    threshold > 0 && targets > threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::agent::Agent;
    use std::collections::BTreeMap;

    #[test]
    fn test_threshold_from_hint() {
        let config = RuntimeConfig::default();
        assert_eq!(parallel_threshold(&Value::Bool(true), &config), config.parallel_threshold);
        assert_eq!(parallel_threshold(&Value::Int(-7), &config), 7);
        assert_eq!(parallel_threshold(&Value::Bool(false), &config), 0);
        assert_eq!(parallel_threshold(&Value::Nil, &config), 0);
    }

    #[test]
    fn test_small_batches_stay_sequential() {
        assert!(!runs_in_parallel(0, 100));
        assert!(!runs_in_parallel(20, 20));
        assert!(runs_in_parallel(20, 21));
    }

    #[test]
    fn test_pool_preserves_order() {
        let pool = WorkerPool::new(3).unwrap();
        let agents: Vec<AgentRef> = (0..50)
            .map(|idx| Agent::new(format!("a{}", idx), "a", None, BTreeMap::new()))
            .collect();
        let names = pool.run(&agents, 4, |agent| agent.name().to_string());
        assert_eq!(names.len(), 50);
        assert_eq!(names[0], "a0");
        assert_eq!(names[49], "a49");
    }
}
