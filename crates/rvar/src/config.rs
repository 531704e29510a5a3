//! Pipeline configuration.

use rvar_output::DEFAULT_CHARACTERISTIC;
use rvar_regression::RollingConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::executor::ExecutorConfig;
use crate::partition::PartitionStrategy;

/// Which records are kept in the output table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sampling {
    /// Every trading day with a full window
    #[default]
    Daily,
    /// Only each security's last trading day of a calendar month
    MonthEnd,
}

impl Sampling {
    /// Name used in summaries and config files.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::MonthEnd => "month_end",
        }
    }
}

impl fmt::Display for Sampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for a full residual-variance run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Rolling regression settings
    pub rolling: RollingConfig,
    /// Partitioning strategy (default: 5% quantiles of the ordinal)
    pub partitioning: PartitionStrategy,
    /// Worker pool settings
    pub executor: ExecutorConfig,
    /// Output sampling (default: daily)
    pub sampling: Sampling,
    /// Name of the output value column (default: `rvar_ff3`)
    pub characteristic: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rolling: RollingConfig::default(),
            partitioning: PartitionStrategy::default(),
            executor: ExecutorConfig::default(),
            sampling: Sampling::Daily,
            characteristic: DEFAULT_CHARACTERISTIC.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::LoadProxy;

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.rolling.window, 60);
        assert_eq!(config.partitioning.partition_count().unwrap(), 20);
        assert_eq!(config.executor.workers, None);
        assert_eq!(config.sampling, Sampling::Daily);
        assert_eq!(config.characteristic, "rvar_ff3");
    }

    #[test]
    fn test_partial_json() {
        let json = r#"{
            "rolling": { "window": 120 },
            "partitioning": { "strategy": "quantile", "start": 0.0, "end": 1.0, "step": 0.1, "proxy": "observation_count" },
            "sampling": "month_end"
        }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.rolling.window, 120);
        assert_eq!(config.rolling.rank_tolerance, 1e-10);
        assert_eq!(
            config.partitioning,
            PartitionStrategy::Quantile {
                start: 0.0,
                end: 1.0,
                step: 0.1,
                proxy: LoadProxy::ObservationCount
            }
        );
        assert_eq!(config.sampling, Sampling::MonthEnd);
        assert_eq!(config.characteristic, "rvar_ff3");
    }

    #[test]
    fn test_sampling_display() {
        assert_eq!(Sampling::Daily.to_string(), "daily");
        assert_eq!(Sampling::MonthEnd.to_string(), "month_end");
    }
}
