//! Per-security workload index.
//!
//! The index is a pure function of the panel: the same panel always yields the
//! same ordinals and counts.

use chrono::NaiveDate;
use rvar_data::{Panel, SecurityId, SecurityTimeline, calendar};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Workload attributes of one security.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityWorkload {
    /// Security identifier
    pub security_id: SecurityId,
    /// 0-based position of the security in panel order
    pub ordinal: usize,
    /// Number of daily observations
    pub observation_count: usize,
    /// Number of calendar months with at least one observation
    pub month_count: usize,
    /// First observation date
    pub first_date: NaiveDate,
    /// Last observation date
    pub last_date: NaiveDate,
}

impl SecurityWorkload {
    /// Number of full windows of length `window` in the timeline.
    pub const fn window_count(&self, window: usize) -> usize {
        if window == 0 || self.observation_count < window {
            0
        } else {
            self.observation_count - window + 1
        }
    }

    fn from_timeline(ordinal: usize, timeline: &SecurityTimeline) -> Option<Self> {
        Some(Self {
            security_id: timeline.security_id(),
            ordinal,
            observation_count: timeline.len(),
            month_count: calendar::month_count(timeline),
            first_date: timeline.first_date()?,
            last_date: timeline.last_date()?,
        })
    }
}

/// Workload attributes of every security in a panel, in panel order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkloadIndex {
    securities: Vec<SecurityWorkload>,
    positions: HashMap<SecurityId, usize>,
}

impl WorkloadIndex {
    /// Index every security of `panel`.
    pub fn build(panel: &Panel) -> Self {
        let securities: Vec<SecurityWorkload> = panel
            .timelines()
            .iter()
            .enumerate()
            .filter_map(|(ordinal, timeline)| SecurityWorkload::from_timeline(ordinal, timeline))
            .collect();
        let positions = securities
            .iter()
            .enumerate()
            .map(|(i, w)| (w.security_id, i))
            .collect();

        Self {
            securities,
            positions,
        }
    }

    /// Workloads in panel order.
    pub fn securities(&self) -> &[SecurityWorkload] {
        &self.securities
    }

    /// Workload of one security.
    pub fn get(&self, security_id: SecurityId) -> Option<&SecurityWorkload> {
        self.positions
            .get(&security_id)
            .map(|&i| &self.securities[i])
    }

    /// Number of indexed securities.
    pub fn len(&self) -> usize {
        self.securities.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.securities.is_empty()
    }

    /// Sum of observation counts.
    pub fn total_observations(&self) -> usize {
        self.securities.iter().map(|w| w.observation_count).sum()
    }

    /// Sum of full windows of length `window` over all securities.
    pub fn total_windows(&self, window: usize) -> usize {
        self.securities.iter().map(|w| w.window_count(window)).sum()
    }
}
