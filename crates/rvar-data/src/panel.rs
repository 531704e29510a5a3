//! The full security-day panel.

use chrono::NaiveDate;
use std::collections::HashSet;

use crate::error::InputShapeError;
use crate::observation::{Observation, SecurityId};
use crate::timeline::SecurityTimeline;

/// A validated set of security timelines.
///
/// Timelines are held in a fixed order (ascending security id when built from
/// raw rows); that order defines each security's ordinal position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Panel {
    timelines: Vec<SecurityTimeline>,
}

impl Panel {
    /// Build a panel from unordered rows.
    ///
    /// Rows are sorted by `(security_id, date)` and grouped per security.
    ///
    /// # Errors
    ///
    /// Returns [`InputShapeError::DuplicateDate`] if a security has two rows on
    /// the same date.
    pub fn from_observations(mut rows: Vec<Observation>) -> Result<Self, InputShapeError> {
        rows.sort_by(|a, b| {
            a.security_id
                .cmp(&b.security_id)
                .then_with(|| a.date.cmp(&b.date))
        });

        let mut timelines = Vec::new();
        let mut current: Vec<Observation> = Vec::new();

        for row in rows {
            if let Some(last) = current.last()
                && last.security_id != row.security_id
            {
                let id = last.security_id;
                timelines.push(SecurityTimeline::new(id, std::mem::take(&mut current))?);
            }
            current.push(row);
        }
        if let Some(last) = current.last() {
            let id = last.security_id;
            timelines.push(SecurityTimeline::new(id, current)?);
        }

        Ok(Self { timelines })
    }

    /// Build a panel from already-grouped timelines, keeping their order.
    ///
    /// # Errors
    ///
    /// Returns [`InputShapeError::DuplicateSecurity`] if two timelines share a security id.
    pub fn from_timelines(timelines: Vec<SecurityTimeline>) -> Result<Self, InputShapeError> {
        let mut seen = HashSet::with_capacity(timelines.len());
        for timeline in &timelines {
            if !seen.insert(timeline.security_id()) {
                return Err(InputShapeError::DuplicateSecurity(timeline.security_id()));
            }
        }
        Ok(Self { timelines })
    }

    /// Timelines in panel order.
    pub fn timelines(&self) -> &[SecurityTimeline] {
        &self.timelines
    }

    /// Consume the panel, yielding its timelines.
    pub fn into_timelines(self) -> Vec<SecurityTimeline> {
        self.timelines
    }

    /// Timeline of one security.
    pub fn get(&self, security_id: SecurityId) -> Option<&SecurityTimeline> {
        self.timelines
            .iter()
            .find(|t| t.security_id() == security_id)
    }

    /// Security ids in panel order.
    pub fn security_ids(&self) -> Vec<SecurityId> {
        self.timelines.iter().map(|t| t.security_id()).collect()
    }

    /// Number of securities.
    pub fn security_count(&self) -> usize {
        self.timelines.len()
    }

    /// Total number of security-day observations.
    pub fn observation_count(&self) -> usize {
        self.timelines.iter().map(SecurityTimeline::len).sum()
    }

    /// Whether the panel contains no securities.
    pub fn is_empty(&self) -> bool {
        self.timelines.is_empty()
    }

    /// Earliest and latest date across all securities.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let start = self.timelines.iter().filter_map(|t| t.first_date()).min()?;
        let end = self.timelines.iter().filter_map(|t| t.last_date()).max()?;
        Some((start, end))
    }
}
