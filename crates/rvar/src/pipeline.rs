//! End-to-end residual-variance pipeline.
//!
//! Workload indexing, partitioning, parallel execution and output sampling,
//! in that order. Input-shape violations are caught when the panel is built,
//! before anything here runs; any failure below aborts the run without output.

use chrono::NaiveDate;
use rvar_data::{Panel, ResidualVarianceRecord, SecurityId, calendar};
use rvar_output::{CharacteristicTable, PartitionSummary, RunSummary};
use rvar_regression::{CancellationToken, RollingRegressionEngine};
use std::collections::HashSet;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::{PipelineConfig, Sampling};
use crate::error::Result;
use crate::executor::{ExecutionOutput, ParallelExecutor, PartitionHook};
use crate::partition::PartitionPlan;
use crate::workload::WorkloadIndex;

/// Output of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// The characteristic table
    pub table: CharacteristicTable,
    /// Run accounting
    pub summary: RunSummary,
}

/// Computes the residual-variance characteristic for a panel.
#[derive(Clone)]
pub struct ResidualVariancePipeline {
    config: PipelineConfig,
    engine: RollingRegressionEngine,
    cancel: CancellationToken,
    on_partition_complete: Option<PartitionHook>,
}

impl std::fmt::Debug for ResidualVariancePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResidualVariancePipeline")
            .field("config", &self.config)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

impl ResidualVariancePipeline {
    /// Create a pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the rolling or partitioning configuration is invalid.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let engine = RollingRegressionEngine::new(config.rolling.clone())?;
        config.partitioning.partition_count()?;

        Ok(Self {
            config,
            engine,
            cancel: CancellationToken::new(),
            on_partition_complete: None,
        })
    }

    /// The pipeline configuration.
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Share a cancellation token with the caller.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Register a callback run after each partition completes.
    pub fn on_partition_complete(mut self, hook: PartitionHook) -> Self {
        self.on_partition_complete = Some(hook);
        self
    }

    /// Index the panel and plan its partitions without running the engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the partitioning parameters are invalid.
    pub fn plan(&self, panel: &Panel) -> Result<PartitionPlan> {
        let index = WorkloadIndex::build(panel);
        Ok(self.config.partitioning.plan(&index)?)
    }

    /// Compute the characteristic for every security of `panel`.
    ///
    /// # Errors
    ///
    /// Returns an error if partitioning fails, a partition fails, or the run is
    /// cancelled. No partial table is returned.
    pub fn run(&self, panel: Panel) -> Result<PipelineOutput> {
        let started = Instant::now();

        let index = WorkloadIndex::build(&panel);
        info!(
            securities = index.len(),
            observations = index.total_observations(),
            windows = index.total_windows(self.config.rolling.window),
            "Indexed workload"
        );

        let plan = self.config.partitioning.plan(&index)?;
        info!(
            partitions = plan.partition_count(),
            empty = plan.empty_partitions(),
            imbalance = plan.imbalance(),
            "Partitioned securities"
        );

        let month_ends = match self.config.sampling {
            Sampling::Daily => None,
            Sampling::MonthEnd => Some(month_end_keys(&panel)),
        };
        let period = panel.date_range();

        let partitions = plan.split(panel)?;

        let mut executor = ParallelExecutor::new(self.engine.clone(), &self.config.executor)
            .with_cancellation(self.cancel.clone());
        if let Some(hook) = &self.on_partition_complete {
            executor = executor.on_partition_complete(hook.clone());
        }
        let output = executor.execute(partitions)?;

        let omitted = output.stats.omitted();
        if omitted > 0 {
            warn!(
                singular = output.stats.singular_omitted,
                non_finite = output.stats.non_finite_omitted,
                "Omitted windows"
            );
        }
        if output.stats.rank_deficient > 0 {
            info!(
                rank_deficient = output.stats.rank_deficient,
                "Rank-deficient windows"
            );
        }

        let mut summary = self.summarise(&index, &output, period);
        let produced = output.records.len();
        let records = sample(output.records, month_ends.as_ref());
        let sampled_out = produced - records.len();

        summary.records = records.len();
        summary.sampled_out = sampled_out;
        summary.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            records = summary.records,
            omitted,
            sampled_out,
            elapsed_ms = summary.elapsed_ms,
            "Run complete"
        );

        Ok(PipelineOutput {
            table: CharacteristicTable::new(self.config.characteristic.clone(), records),
            summary,
        })
    }

    fn summarise(
        &self,
        index: &WorkloadIndex,
        output: &ExecutionOutput,
        period: Option<(NaiveDate, NaiveDate)>,
    ) -> RunSummary {
        let mut summary = RunSummary::new(
            self.config.characteristic.clone(),
            self.config.rolling.window,
        );
        summary.sampling = self.config.sampling.to_string();
        summary.securities = index.len();
        summary.observations = index.total_observations();
        summary.period_start = period.map(|(start, _)| start);
        summary.period_end = period.map(|(_, end)| end);
        summary.workers = output.workers;
        summary.partitions = output
            .outcomes
            .iter()
            .map(|o| PartitionSummary {
                partition: o.partition,
                securities: o.securities,
                observations: o.observations,
                records: o.records,
                omitted: o.stats.omitted(),
                elapsed_ms: o.elapsed.as_millis() as u64,
            })
            .collect();
        summary.short_securities = output.stats.short_securities;
        summary.windows = output.stats.windows;
        summary.rank_deficient = output.stats.rank_deficient;
        summary.singular_omitted = output.stats.singular_omitted;
        summary.non_finite_omitted = output.stats.non_finite_omitted;
        summary
    }
}

/// `(security, date)` of every month-end trading day in the panel.
fn month_end_keys(panel: &Panel) -> HashSet<(SecurityId, NaiveDate)> {
    panel
        .timelines()
        .iter()
        .flat_map(|t| {
            calendar::month_end_dates(t)
                .into_iter()
                .map(move |date| (t.security_id(), date))
        })
        .collect()
}

fn sample(
    records: Vec<ResidualVarianceRecord>,
    keep: Option<&HashSet<(SecurityId, NaiveDate)>>,
) -> Vec<ResidualVarianceRecord> {
    match keep {
        None => records,
        Some(keys) => records
            .into_iter()
            .filter(|r| keys.contains(&(r.security_id, r.date)))
            .collect(),
    }
}
