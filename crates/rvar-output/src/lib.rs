#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/rvar/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod export;
pub mod frame;
pub mod summary;

pub use export::{CharacteristicTable, DEFAULT_CHARACTERISTIC, ExportError, ExportFormat, Exporter};
pub use summary::{PartitionSummary, RunSummary};
