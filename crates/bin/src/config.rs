//! Pipeline configuration from a JSON file and command-line overrides.

use clap::{Args, ValueEnum};
use rvar::output::ExportFormat;
use rvar::regression::SingularPolicy;
use rvar::{LoadProxy, PartitionStrategy, PipelineConfig, Sampling};
use std::fs;
use std::path::PathBuf;

/// Partitioning strategy flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum StrategyArg {
    /// Quantile cuts of a load proxy
    Quantile,
    /// Greedy bin-packing by observation count
    Balanced,
}

/// Load proxy flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum ProxyArg {
    /// Position of the security in id order
    Ordinal,
    /// Number of observations
    ObservationCount,
}

impl From<ProxyArg> for LoadProxy {
    fn from(arg: ProxyArg) -> Self {
        match arg {
            ProxyArg::Ordinal => Self::Ordinal,
            ProxyArg::ObservationCount => Self::ObservationCount,
        }
    }
}

/// Output sampling flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum SamplingArg {
    /// Every day with a full window
    Daily,
    /// Last trading day of each month
    MonthEnd,
}

impl From<SamplingArg> for Sampling {
    fn from(arg: SamplingArg) -> Self {
        match arg {
            SamplingArg::Daily => Self::Daily,
            SamplingArg::MonthEnd => Self::MonthEnd,
        }
    }
}

/// Rank-deficient window flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum SingularArg {
    /// Keep the projection residual
    Project,
    /// Omit the record
    Skip,
}

impl From<SingularArg> for SingularPolicy {
    fn from(arg: SingularArg) -> Self {
        match arg {
            SingularArg::Project => Self::Project,
            SingularArg::Skip => Self::Skip,
        }
    }
}

/// Output file format flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum FormatArg {
    /// Comma-separated values
    Csv,
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    PrettyJson,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => Self::Csv,
            FormatArg::Json => Self::Json,
            FormatArg::PrettyJson => Self::PrettyJson,
        }
    }
}

/// Options shared by `run` and `plan`.
#[derive(Debug, Clone, Default, Args)]
pub(crate) struct PipelineArgs {
    /// JSON configuration file; flags override its values
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,

    /// Rolling window length in trading days
    #[arg(long)]
    pub(crate) window: Option<usize>,

    /// Partitioning strategy
    #[arg(long, value_enum)]
    pub(crate) strategy: Option<StrategyArg>,

    /// Quantile step (implies the quantile strategy)
    #[arg(long)]
    pub(crate) step: Option<f64>,

    /// Partition count (implies the balanced strategy)
    #[arg(long)]
    pub(crate) partitions: Option<usize>,

    /// Load proxy for quantile cuts
    #[arg(long, value_enum)]
    pub(crate) proxy: Option<ProxyArg>,

    /// Worker threads (default: available parallelism)
    #[arg(long)]
    pub(crate) workers: Option<usize>,

    /// Output sampling
    #[arg(long, value_enum)]
    pub(crate) sampling: Option<SamplingArg>,

    /// Handling of rank-deficient windows
    #[arg(long, value_enum)]
    pub(crate) singular: Option<SingularArg>,

    /// Name of the output value column
    #[arg(long)]
    pub(crate) characteristic: Option<String>,
}

impl PipelineArgs {
    /// Load the configuration file, if any, and apply the flags.
    pub(crate) fn resolve(&self) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
        let base = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .map_err(|e| format!("Failed to read config {}: {}", path.display(), e))?;
                serde_json::from_str(&text)
                    .map_err(|e| format!("Invalid config {}: {}", path.display(), e))?
            }
            None => PipelineConfig::default(),
        };
        Ok(self.apply(base))
    }

    /// Apply the flags on top of `config`.
    pub(crate) fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(window) = self.window {
            config.rolling.window = window;
        }
        if let Some(singular) = self.singular {
            config.rolling.singular_policy = singular.into();
        }
        if let Some(workers) = self.workers {
            config.executor.workers = Some(workers);
        }
        if let Some(sampling) = self.sampling {
            config.sampling = sampling.into();
        }
        if let Some(name) = &self.characteristic {
            config.characteristic.clone_from(name);
        }
        config.partitioning = self.strategy_for(config.partitioning, &config.executor);
        config
    }

    fn strategy_for(
        &self,
        current: PartitionStrategy,
        executor: &rvar::ExecutorConfig,
    ) -> PartitionStrategy {
        let strategy = self.strategy.or(match (self.step, self.partitions) {
            (Some(_), _) => Some(StrategyArg::Quantile),
            (None, Some(_)) => Some(StrategyArg::Balanced),
            (None, None) if self.proxy.is_some() => Some(StrategyArg::Quantile),
            (None, None) => None,
        });

        match strategy {
            None => current,
            Some(StrategyArg::Balanced) => {
                let partitions = self.partitions.unwrap_or(match current {
                    PartitionStrategy::Balanced { partitions } => partitions,
                    PartitionStrategy::Quantile { .. } => executor.resolved_workers(),
                });
                PartitionStrategy::Balanced { partitions }
            }
            Some(StrategyArg::Quantile) => {
                let (start, end, step, proxy) = match current {
                    PartitionStrategy::Quantile {
                        start,
                        end,
                        step,
                        proxy,
                    } => (start, end, step, proxy),
                    PartitionStrategy::Balanced { .. } => (0.0, 1.0, 0.05, LoadProxy::Ordinal),
                };
                PartitionStrategy::Quantile {
                    start,
                    end,
                    step: self.step.unwrap_or(step),
                    proxy: self.proxy.map_or(proxy, LoadProxy::from),
                }
            }
        }
    }
}
