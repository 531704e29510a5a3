#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/rvar/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cancel;
pub mod config;
pub mod engine;
pub mod ols;
pub mod stats;
pub mod variance;

// Re-export main types
pub use cancel::CancellationToken;
pub use config::{REGRESSORS, RollingConfig, SingularPolicy};
pub use engine::{EngineError, PartitionResult, RollingRegressionEngine, WindowFit};
pub use ols::{OlsError, OlsFit, least_squares};
pub use stats::EngineStats;
pub use variance::sample_variance;
