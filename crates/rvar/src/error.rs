//! Error types for partitioning, execution and the end-to-end pipeline.

use rvar_data::SecurityId;
use rvar_regression::EngineError;
use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Invalid partitioning parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PartitionError {
    /// Quantile step is not a positive finite number
    #[error("Invalid quantile step: {0}")]
    InvalidStep(f64),

    /// Quantile bounds are outside `[0, 1]` or not ordered
    #[error("Invalid quantile bounds: start {start}, end {end}")]
    InvalidBounds {
        /// Lower quantile
        start: f64,
        /// Upper quantile
        end: f64,
    },

    /// The strategy yields no partitions
    #[error("Partition count must be at least 1")]
    NoPartitions,

    /// The plan references a security missing from the panel
    #[error("Security {0} is not in the panel")]
    UnknownSecurity(SecurityId),

    /// A panel security is not assigned to any partition
    #[error("Security {0} is not assigned to any partition")]
    Unassigned(SecurityId),

    /// A security is assigned to more than one partition
    #[error("Security {0} is assigned to more than one partition")]
    DuplicateAssignment(SecurityId),
}

/// Failures of the parallel executor.
///
/// Any of these aborts the whole run.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// A partition returned an engine error or panicked
    #[error("Partition {partition} failed: {reason}")]
    PartitionFailure {
        /// Index of the failed partition
        partition: usize,
        /// Cause of the failure
        reason: String,
    },

    /// The run was cancelled before all partitions finished
    #[error("Execution cancelled")]
    Cancelled,

    /// The worker pool could not be created
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Errors from the end-to-end pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Engine configuration is invalid
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Partitioning parameters are invalid
    #[error("Partition error: {0}")]
    Partition(#[from] PartitionError),

    /// Parallel execution failed
    #[error("Executor error: {0}")]
    Executor(#[from] ExecutorError),
}
