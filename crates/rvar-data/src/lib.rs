#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/rvar/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod calendar;
pub mod error;
pub mod loader;
pub mod observation;
pub mod panel;
pub mod timeline;

pub use error::{DataError, InputShapeError, Result};
pub use loader::{PanelColumns, panel_from_dataframe, read_panel_csv, read_panel_csv_from};
pub use observation::{
    FACTOR_COUNT, FACTOR_NAMES, Observation, ResidualVarianceRecord, SecurityId,
};
pub use panel::Panel;
pub use timeline::SecurityTimeline;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
