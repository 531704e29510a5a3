//! Run summaries.
//!
//! A [`RunSummary`] describes one pipeline run: what went in, how the work was
//! split across partitions, and how many windows produced a record or were
//! omitted and why.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::export::{ExportError, ExportFormat, Exporter};

/// Work done by a single partition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartitionSummary {
    /// Partition index.
    pub partition: usize,

    /// Securities assigned to the partition.
    pub securities: usize,

    /// Security-day observations in the partition.
    pub observations: usize,

    /// Records the partition produced.
    pub records: usize,

    /// Windows omitted (rank-deficient under the skip policy, or non-finite).
    pub omitted: usize,

    /// Wall-clock time spent on the partition, in milliseconds.
    pub elapsed_ms: u64,
}

impl PartitionSummary {
    /// Whether no securities were assigned to the partition.
    pub fn is_empty(&self) -> bool {
        self.securities == 0
    }
}

/// Summary of a full characteristic run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// Name of the characteristic column.
    pub characteristic: String,

    /// When the run finished.
    pub generated_at: DateTime<Utc>,

    /// Rolling window length in trading days.
    pub window: usize,

    /// Output sampling (`daily` or `month_end`).
    pub sampling: String,

    /// Securities in the input panel.
    pub securities: usize,

    /// Security-day observations in the input panel.
    pub observations: usize,

    /// First date in the input panel.
    pub period_start: Option<NaiveDate>,

    /// Last date in the input panel.
    pub period_end: Option<NaiveDate>,

    /// Worker threads used.
    pub workers: usize,

    /// Per-partition breakdown, in partition order.
    pub partitions: Vec<PartitionSummary>,

    /// Securities with fewer observations than the window.
    pub short_securities: usize,

    /// Full windows evaluated.
    pub windows: usize,

    /// Records written.
    pub records: usize,

    /// Windows whose design matrix was rank-deficient.
    pub rank_deficient: usize,

    /// Rank-deficient windows that were omitted.
    pub singular_omitted: usize,

    /// Windows omitted because they contained NaN or infinite values.
    pub non_finite_omitted: usize,

    /// Records dropped by month-end sampling.
    pub sampled_out: usize,

    /// Total wall-clock time, in milliseconds.
    pub elapsed_ms: u64,
}

impl RunSummary {
    /// Create an empty summary for a run of `characteristic` over `window` days.
    pub fn new(characteristic: impl Into<String>, window: usize) -> Self {
        Self {
            characteristic: characteristic.into(),
            generated_at: Utc::now(),
            window,
            sampling: "daily".to_string(),
            securities: 0,
            observations: 0,
            period_start: None,
            period_end: None,
            workers: 0,
            partitions: Vec::new(),
            short_securities: 0,
            windows: 0,
            records: 0,
            rank_deficient: 0,
            singular_omitted: 0,
            non_finite_omitted: 0,
            sampled_out: 0,
            elapsed_ms: 0,
        }
    }

    /// Number of partitions that received no securities.
    pub fn empty_partitions(&self) -> usize {
        self.partitions.iter().filter(|p| p.is_empty()).count()
    }

    /// Windows evaluated but not written.
    pub fn omitted(&self) -> usize {
        self.singular_omitted + self.non_finite_omitted
    }

    /// Fraction of evaluated windows that produced a record before sampling.
    pub fn coverage(&self) -> f64 {
        if self.windows == 0 {
            0.0
        } else {
            (self.windows - self.omitted()) as f64 / self.windows as f64
        }
    }

    fn period(&self) -> String {
        match (self.period_start, self.period_end) {
            (Some(start), Some(end)) => format!("{start} to {end}"),
            _ => "n/a".to_string(),
        }
    }

    /// Format the summary as an ASCII table.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("\nResidual Variance Run: {}\n", self.characteristic));
        output.push_str(&format!(
            "Period: {} | Window: {} days | Sampling: {}\n",
            self.period(),
            self.window,
            self.sampling
        ));
        output.push_str(&"=".repeat(80));
        output.push('\n');

        output.push_str(&format!(
            "{:<12} {:>12} {:>14} {:>12} {:>12} {:>12}\n",
            "Partition", "Securities", "Observations", "Records", "Omitted", "Time (ms)"
        ));
        output.push_str(&"-".repeat(80));
        output.push('\n');

        for p in &self.partitions {
            output.push_str(&format!(
                "{:<12} {:>12} {:>14} {:>12} {:>12} {:>12}\n",
                p.partition, p.securities, p.observations, p.records, p.omitted, p.elapsed_ms
            ));
        }

        output.push_str(&"-".repeat(80));
        output.push('\n');
        output.push_str(&format!(
            "{:<12} {:>12} {:>14} {:>12} {:>12} {:>12}\n",
            "Total",
            self.securities,
            self.observations,
            self.records,
            self.omitted(),
            self.elapsed_ms
        ));
        output.push_str(&"=".repeat(80));
        output.push('\n');

        output.push_str(&format!("Workers:               {}\n", self.workers));
        output.push_str(&format!(
            "Empty partitions:      {}\n",
            self.empty_partitions()
        ));
        output.push_str(&format!(
            "Short securities:      {}\n",
            self.short_securities
        ));
        output.push_str(&format!("Windows evaluated:     {}\n", self.windows));
        output.push_str(&format!("Rank-deficient:        {}\n", self.rank_deficient));
        output.push_str(&format!(
            "Omitted (singular):    {}\n",
            self.singular_omitted
        ));
        output.push_str(&format!(
            "Omitted (non-finite):  {}\n",
            self.non_finite_omitted
        ));
        output.push_str(&format!("Sampled out:           {}\n", self.sampled_out));
        output.push_str(&format!(
            "Coverage:              {:.2}%\n",
            self.coverage() * 100.0
        ));

        output
    }

    /// Format the summary as Markdown.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "# Residual Variance Run: {}\n\n",
            self.characteristic
        ));
        output.push_str(&format!("**Period:** {}\n\n", self.period()));
        output.push_str(&format!(
            "**Window:** {} days, **Sampling:** {}, **Workers:** {}\n\n",
            self.window, self.sampling, self.workers
        ));

        output.push_str("| Partition | Securities | Observations | Records | Omitted | Time (ms) |\n");
        output.push_str("|-----------|------------|--------------|---------|---------|-----------|\n");
        for p in &self.partitions {
            output.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} |\n",
                p.partition, p.securities, p.observations, p.records, p.omitted, p.elapsed_ms
            ));
        }
        output.push('\n');

        output.push_str("## Summary\n\n");
        output.push_str(&format!("- **Records:** {}\n", self.records));
        output.push_str(&format!("- **Windows:** {}\n", self.windows));
        output.push_str(&format!(
            "- **Rank-deficient:** {}\n",
            self.rank_deficient
        ));
        output.push_str(&format!(
            "- **Omitted:** {} (singular {}, non-finite {})\n",
            self.omitted(),
            self.singular_omitted,
            self.non_finite_omitted
        ));
        output.push_str(&format!(
            "- **Short securities:** {}\n",
            self.short_securities
        ));
        output.push_str(&format!("- **Sampled out:** {}\n", self.sampled_out));

        output
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} records from {} securities ({} windows, {} omitted) in {} ms",
            self.characteristic,
            self.records,
            self.securities,
            self.windows,
            self.omitted(),
            self.elapsed_ms
        )
    }
}

impl Exporter for RunSummary {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
            ExportFormat::Csv => {
                let mut wtr = csv::Writer::from_writer(vec![]);
                wtr.write_record([
                    "partition",
                    "securities",
                    "observations",
                    "records",
                    "omitted",
                    "elapsed_ms",
                ])?;
                for p in &self.partitions {
                    wtr.write_record([
                        p.partition.to_string(),
                        p.securities.to_string(),
                        p.observations.to_string(),
                        p.records.to_string(),
                        p.omitted.to_string(),
                        p.elapsed_ms.to_string(),
                    ])?;
                }
                let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
                String::from_utf8(bytes).map_err(|e| ExportError::InvalidFormat(e.to_string()))
            }
        }
    }
}
