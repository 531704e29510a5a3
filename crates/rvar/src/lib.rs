#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/rvar/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod executor;
pub mod partition;
pub mod pipeline;
pub mod workload;

// Re-export main types from sub-crates
pub use rvar_data as data;
pub use rvar_output as output;
pub use rvar_regression as regression;

pub use config::{PipelineConfig, Sampling};
pub use error::{ExecutorError, PartitionError, PipelineError, Result};
pub use executor::{
    ExecutionOutput, ExecutorConfig, ParallelExecutor, PartitionHook, PartitionOutcome,
};
pub use partition::{LoadProxy, PartitionPlan, PartitionStrategy, WorkPartition, quantile};
pub use pipeline::{PipelineOutput, ResidualVariancePipeline};
pub use workload::{SecurityWorkload, WorkloadIndex};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
