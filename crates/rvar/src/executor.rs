//! Parallel execution of the rolling regression engine.
//!
//! Each [`WorkPartition`] is handed to one task on a dedicated rayon pool of a
//! fixed size. Partitions share nothing mutable; their records are gathered on
//! the calling thread once every task has returned and concatenated in
//! partition order.

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use rvar_data::ResidualVarianceRecord;
use rvar_regression::{CancellationToken, EngineError, EngineStats, RollingRegressionEngine};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::ExecutorError;
use crate::partition::WorkPartition;

/// Worker pool configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Number of worker threads (default: available parallelism)
    pub workers: Option<usize>,
}

impl ExecutorConfig {
    /// Configuration with a fixed number of workers.
    pub const fn with_workers(workers: usize) -> Self {
        Self {
            workers: Some(workers),
        }
    }

    /// Worker count to use, falling back to the available parallelism.
    pub fn resolved_workers(&self) -> usize {
        match self.workers {
            Some(n) if n > 0 => n,
            _ => std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
        }
    }
}

/// Accounting for one completed partition.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionOutcome {
    /// Partition index
    pub partition: usize,
    /// Securities in the partition
    pub securities: usize,
    /// Observations in the partition
    pub observations: usize,
    /// Records produced
    pub records: usize,
    /// Window accounting
    pub stats: EngineStats,
    /// Wall-clock time spent
    pub elapsed: Duration,
}

/// Concatenated results of all partitions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionOutput {
    /// Records of every partition, in partition order
    pub records: Vec<ResidualVarianceRecord>,
    /// Per-partition accounting, in partition order
    pub outcomes: Vec<PartitionOutcome>,
    /// Accounting summed over partitions
    pub stats: EngineStats,
    /// Worker threads used
    pub workers: usize,
}

/// Callback invoked from a worker thread after each partition completes.
pub type PartitionHook = Arc<dyn Fn(&PartitionOutcome) + Send + Sync>;

type Completed = (PartitionOutcome, Vec<ResidualVarianceRecord>);

/// Runs the engine over partitions on a fixed-size thread pool.
#[derive(Clone)]
pub struct ParallelExecutor {
    engine: RollingRegressionEngine,
    workers: usize,
    cancel: CancellationToken,
    on_complete: Option<PartitionHook>,
}

impl fmt::Debug for ParallelExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelExecutor")
            .field("engine", &self.engine)
            .field("workers", &self.workers)
            .field("cancel", &self.cancel)
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

impl ParallelExecutor {
    /// Create an executor.
    pub fn new(engine: RollingRegressionEngine, config: &ExecutorConfig) -> Self {
        Self {
            engine,
            workers: config.resolved_workers(),
            cancel: CancellationToken::new(),
            on_complete: None,
        }
    }

    /// Share an externally owned cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Register a callback run after each partition completes.
    pub fn on_partition_complete(mut self, hook: PartitionHook) -> Self {
        self.on_complete = Some(hook);
        self
    }

    /// Number of worker threads.
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Token that cancels outstanding partitions.
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run every partition and concatenate the results.
    ///
    /// Blocks until all partitions have returned. The first partition failure
    /// cancels the partitions still running in this call only; the shared
    /// token is never cancelled by the executor, so the executor can be reused.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::PartitionFailure`] if any partition returned an
    /// engine error or panicked, the completion hook included (the lowest
    /// failing partition index is reported), [`ExecutorError::Cancelled`] if the
    /// token was cancelled, or [`ExecutorError::ThreadPool`] if the pool cannot
    /// be built.
    pub fn execute(
        &self,
        partitions: Vec<WorkPartition>,
    ) -> Result<ExecutionOutput, ExecutorError> {
        let empty = partitions.iter().filter(|p| p.is_empty()).count();
        if empty > 0 {
            warn!(
                empty,
                partitions = partitions.len(),
                "Some partitions have no securities"
            );
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("rvar-worker-{i}"))
            .build()?;

        info!(
            partitions = partitions.len(),
            workers = self.workers,
            "Dispatching partitions"
        );

        let run = self.cancel.child();
        let results: Vec<Result<Completed, ExecutorError>> = pool.install(|| {
            partitions
                .into_par_iter()
                .map(|partition| self.run_partition(&partition, &run))
                .collect()
        });

        let mut cancelled = false;
        let mut completed = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(done) => completed.push(done),
                Err(ExecutorError::Cancelled) => cancelled = true,
                Err(e) => return Err(e),
            }
        }
        if cancelled {
            return Err(ExecutorError::Cancelled);
        }

        let total = completed.iter().map(|(_, r)| r.len()).sum();
        let mut output = ExecutionOutput {
            records: Vec::with_capacity(total),
            outcomes: Vec::with_capacity(completed.len()),
            stats: EngineStats::default(),
            workers: self.workers,
        };
        for (outcome, records) in completed {
            output.stats += outcome.stats;
            output.records.extend(records);
            output.outcomes.push(outcome);
        }

        Ok(output)
    }

    fn run_partition(
        &self,
        partition: &WorkPartition,
        run: &CancellationToken,
    ) -> Result<Completed, ExecutorError> {
        let index = partition.index();
        if run.is_cancelled() {
            return Err(ExecutorError::Cancelled);
        }

        match panic::catch_unwind(AssertUnwindSafe(|| self.process(partition, run))) {
            Ok(Ok(done)) => Ok(done),
            Ok(Err(EngineError::Cancelled)) => Err(ExecutorError::Cancelled),
            Ok(Err(e)) => Err(fail(run, index, e.to_string())),
            Err(payload) => Err(fail(run, index, panic_message(payload.as_ref()))),
        }
    }

    fn process(
        &self,
        partition: &WorkPartition,
        run: &CancellationToken,
    ) -> Result<Completed, EngineError> {
        let started = Instant::now();
        let result = self.engine.run_partition(partition.timelines(), run)?;

        let outcome = PartitionOutcome {
            partition: partition.index(),
            securities: partition.security_count(),
            observations: partition.observation_count(),
            records: result.records.len(),
            stats: result.stats,
            elapsed: started.elapsed(),
        };
        debug!(
            partition = outcome.partition,
            securities = outcome.securities,
            records = outcome.records,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "Partition complete"
        );

        if let Some(hook) = &self.on_complete {
            hook(&outcome);
        }
        Ok((outcome, result.records))
    }
}

fn fail(run: &CancellationToken, partition: usize, reason: String) -> ExecutorError {
    run.cancel();
    ExecutorError::PartitionFailure { partition, reason }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
