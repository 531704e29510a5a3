//! Partitioning of securities into disjoint units of parallel work.
//!
//! A security's timeline is never split: every rolling window needs the full
//! history of its own security, so partitions are sets of whole securities.
//! Two strategies are available:
//!
//! - [`PartitionStrategy::Quantile`] cuts the securities at quantiles of a load
//!   proxy. Partition `j` holds the securities whose proxy value lies in
//!   `(q(start + j * step), q(start + (j + 1) * step)]`, with the first interval
//!   closed on the left so the minimum is included.
//! - [`PartitionStrategy::Balanced`] packs securities greedily by observation
//!   count, heaviest first, into the currently lightest partition.

use rvar_data::{Panel, SecurityId, SecurityTimeline};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use tracing::debug;

use crate::error::PartitionError;
use crate::workload::{SecurityWorkload, WorkloadIndex};

/// Load proxy used by the quantile strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadProxy {
    /// Position of the security in panel order
    #[default]
    Ordinal,
    /// Number of observations of the security
    ObservationCount,
}

impl LoadProxy {
    fn value(self, workload: &SecurityWorkload) -> f64 {
        match self {
            Self::Ordinal => workload.ordinal as f64,
            Self::ObservationCount => workload.observation_count as f64,
        }
    }
}

/// How securities are split into partitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum PartitionStrategy {
    /// Quantile cuts of a load proxy
    Quantile {
        /// First quantile (default: 0)
        start: f64,
        /// Last quantile (default: 1)
        end: f64,
        /// Quantile step (default: 0.05, i.e. 20 partitions)
        step: f64,
        /// Load proxy to cut (default: ordinal)
        proxy: LoadProxy,
    },
    /// Greedy bin-packing by observation count
    Balanced {
        /// Number of partitions
        partitions: usize,
    },
}

impl Default for PartitionStrategy {
    fn default() -> Self {
        Self::quantile(0.05)
    }
}

impl PartitionStrategy {
    /// Quantile cuts over `[0, 1]` on the ordinal proxy.
    pub const fn quantile(step: f64) -> Self {
        Self::Quantile {
            start: 0.0,
            end: 1.0,
            step,
            proxy: LoadProxy::Ordinal,
        }
    }

    /// Greedy bin-packing into `partitions` groups.
    pub const fn balanced(partitions: usize) -> Self {
        Self::Balanced { partitions }
    }

    /// Number of partitions the strategy produces.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters are invalid or yield no partitions.
    pub fn partition_count(&self) -> Result<usize, PartitionError> {
        match *self {
            Self::Quantile {
                start, end, step, ..
            } => {
                if !step.is_finite() || step <= 0.0 {
                    return Err(PartitionError::InvalidStep(step));
                }
                if !(0.0..=1.0).contains(&start) || !(0.0..=1.0).contains(&end) || start >= end {
                    return Err(PartitionError::InvalidBounds { start, end });
                }
                let count = ((end - start) / step + 1e-9).floor() as usize;
                if count == 0 {
                    return Err(PartitionError::NoPartitions);
                }
                Ok(count)
            }
            Self::Balanced { partitions: 0 } => Err(PartitionError::NoPartitions),
            Self::Balanced { partitions } => Ok(partitions),
        }
    }

    /// Assign every indexed security to exactly one partition.
    ///
    /// # Errors
    ///
    /// Returns an error if the strategy parameters are invalid.
    pub fn plan(&self, index: &WorkloadIndex) -> Result<PartitionPlan, PartitionError> {
        let count = self.partition_count()?;
        let slots = match *self {
            Self::Quantile {
                start, step, proxy, ..
            } => quantile_slots(index.securities(), count, start, step, proxy),
            Self::Balanced { .. } => balanced_slots(index.securities(), count),
        };

        let mut members: Vec<Vec<&SecurityWorkload>> = vec![Vec::new(); count];
        for (workload, slot) in index.securities().iter().zip(slots) {
            members[slot].push(workload);
        }

        let mut assignments = Vec::with_capacity(count);
        let mut loads = Vec::with_capacity(count);
        for mut group in members {
            group.sort_by_key(|w| w.ordinal);
            loads.push(group.iter().map(|w| w.observation_count).sum());
            assignments.push(group.iter().map(|w| w.security_id).collect());
        }

        let plan = PartitionPlan { assignments, loads };
        debug!(
            partitions = plan.partition_count(),
            empty = plan.empty_partitions(),
            max_load = plan.max_load(),
            "Planned partitions"
        );
        Ok(plan)
    }
}

/// Quantile slot of each security, in index order.
fn quantile_slots(
    securities: &[SecurityWorkload],
    count: usize,
    start: f64,
    step: f64,
    proxy: LoadProxy,
) -> Vec<usize> {
    let values: Vec<f64> = securities.iter().map(|w| proxy.value(w)).collect();
    let mut sorted = values.clone();
    sorted.sort_by(f64::total_cmp);

    // cuts[j + 1] is the inclusive upper edge of partition j
    let cuts: Vec<f64> = (0..=count)
        .map(|j| quantile(&sorted, (start + j as f64 * step).min(1.0)))
        .collect();

    values
        .iter()
        .map(|&v| {
            (0..count)
                .find(|&j| v <= cuts[j + 1])
                .unwrap_or(count - 1)
        })
        .collect()
}

/// Longest-processing-time assignment of each security, in index order.
fn balanced_slots(securities: &[SecurityWorkload], count: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..securities.len()).collect();
    order.sort_by(|&a, &b| {
        securities[b]
            .observation_count
            .cmp(&securities[a].observation_count)
            .then(securities[a].ordinal.cmp(&securities[b].ordinal))
    });

    let mut heap: BinaryHeap<Reverse<(usize, usize)>> =
        (0..count).map(|slot| Reverse((0, slot))).collect();
    let mut slots = vec![0; securities.len()];

    for i in order {
        if let Some(Reverse((load, slot))) = heap.pop() {
            slots[i] = slot;
            heap.push(Reverse((load + securities[i].observation_count, slot)));
        }
    }
    slots
}

/// Sample quantile with linear interpolation between order statistics.
///
/// `sorted` must be ascending. Returns NaN for an empty slice.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}

/// Security ids per partition, with the observation load of each partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPlan {
    assignments: Vec<Vec<SecurityId>>,
    loads: Vec<usize>,
}

impl PartitionPlan {
    /// Security ids of each partition, in panel order within a partition.
    pub fn assignments(&self) -> &[Vec<SecurityId>] {
        &self.assignments
    }

    /// Observation count of each partition.
    pub fn loads(&self) -> &[usize] {
        &self.loads
    }

    /// Number of partitions, including empty ones.
    pub fn partition_count(&self) -> usize {
        self.assignments.len()
    }

    /// Number of partitions with no securities.
    pub fn empty_partitions(&self) -> usize {
        self.assignments.iter().filter(|a| a.is_empty()).count()
    }

    /// Number of assigned securities.
    pub fn security_count(&self) -> usize {
        self.assignments.iter().map(Vec::len).sum()
    }

    /// Largest partition load.
    pub fn max_load(&self) -> usize {
        self.loads.iter().copied().max().unwrap_or(0)
    }

    /// Ratio of the largest load to the mean load (1.0 is perfect balance).
    pub fn imbalance(&self) -> f64 {
        let total: usize = self.loads.iter().sum();
        if total == 0 {
            return 1.0;
        }
        let mean = total as f64 / self.loads.len() as f64;
        self.max_load() as f64 / mean
    }

    /// Move each security's timeline into its partition.
    ///
    /// # Errors
    ///
    /// Returns an error unless every panel security appears in exactly one
    /// partition of the plan.
    pub fn split(&self, panel: Panel) -> Result<Vec<WorkPartition>, PartitionError> {
        let mut timelines: HashMap<SecurityId, SecurityTimeline> = panel
            .into_timelines()
            .into_iter()
            .map(|t| (t.security_id(), t))
            .collect();
        let mut assigned: HashMap<SecurityId, usize> = HashMap::with_capacity(timelines.len());

        let mut partitions = Vec::with_capacity(self.assignments.len());
        for (index, ids) in self.assignments.iter().enumerate() {
            let mut group = Vec::with_capacity(ids.len());
            for &id in ids {
                if assigned.insert(id, index).is_some() {
                    return Err(PartitionError::DuplicateAssignment(id));
                }
                let timeline = timelines
                    .remove(&id)
                    .ok_or(PartitionError::UnknownSecurity(id))?;
                group.push(timeline);
            }
            partitions.push(WorkPartition {
                index,
                timelines: group,
            });
        }

        if let Some(id) = timelines.keys().min() {
            return Err(PartitionError::Unassigned(*id));
        }
        Ok(partitions)
    }
}

/// A disjoint set of whole security timelines processed as one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkPartition {
    index: usize,
    timelines: Vec<SecurityTimeline>,
}

impl WorkPartition {
    /// Create a partition from timelines.
    pub const fn new(index: usize, timelines: Vec<SecurityTimeline>) -> Self {
        Self { index, timelines }
    }

    /// Partition index.
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Timelines of the partition.
    pub fn timelines(&self) -> &[SecurityTimeline] {
        &self.timelines
    }

    /// Security ids of the partition.
    pub fn security_ids(&self) -> Vec<SecurityId> {
        self.timelines.iter().map(|t| t.security_id()).collect()
    }

    /// Number of securities.
    pub fn security_count(&self) -> usize {
        self.timelines.len()
    }

    /// Total number of observations.
    pub fn observation_count(&self) -> usize {
        self.timelines.iter().map(SecurityTimeline::len).sum()
    }

    /// Whether the partition holds no securities.
    pub fn is_empty(&self) -> bool {
        self.timelines.is_empty()
    }
}
