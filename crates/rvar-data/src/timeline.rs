//! Per-security ordered observation sequences.

use chrono::NaiveDate;

use crate::error::InputShapeError;
use crate::observation::{Observation, SecurityId};

/// The ordered daily observations of one security.
///
/// Dates are strictly increasing. The position of an observation in the
/// sequence is its `observation_index`: the number of prior trading days
/// recorded for the security.
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityTimeline {
    security_id: SecurityId,
    observations: Vec<Observation>,
}

impl SecurityTimeline {
    /// Create a timeline, validating identity and date ordering.
    ///
    /// # Errors
    ///
    /// Returns an [`InputShapeError`] if the sequence is empty, contains an
    /// observation of another security, or its dates are not strictly increasing.
    pub fn new(
        security_id: SecurityId,
        observations: Vec<Observation>,
    ) -> Result<Self, InputShapeError> {
        if observations.is_empty() {
            return Err(InputShapeError::EmptyTimeline(security_id));
        }

        for obs in &observations {
            if obs.security_id != security_id {
                return Err(InputShapeError::ForeignObservation {
                    expected: security_id,
                    found: obs.security_id,
                });
            }
        }

        for pair in observations.windows(2) {
            let (previous, current) = (pair[0].date, pair[1].date);
            if current == previous {
                return Err(InputShapeError::DuplicateDate {
                    security_id,
                    date: current,
                });
            }
            if current < previous {
                return Err(InputShapeError::NonIncreasingDate {
                    security_id,
                    previous,
                    current,
                });
            }
        }

        Ok(Self {
            security_id,
            observations,
        })
    }

    /// Security identifier.
    pub const fn security_id(&self) -> SecurityId {
        self.security_id
    }

    /// Observations in date order.
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Number of observations (`observation_count`).
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the timeline has no observations. Always false for a validated timeline.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Date of the first observation.
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.observations.first().map(|o| o.date)
    }

    /// Date of the last observation.
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.observations.last().map(|o| o.date)
    }

    /// Observations paired with their `observation_index`.
    pub fn indexed(&self) -> impl Iterator<Item = (usize, &Observation)> {
        self.observations.iter().enumerate()
    }

    /// The `observation_index` of the observation on `date`, if any.
    pub fn observation_index(&self, date: NaiveDate) -> Option<usize> {
        self.observations
            .binary_search_by_key(&date, |o| o.date)
            .ok()
    }

    /// The `len` observations ending at `end` (inclusive), or `None` when
    /// fewer than `len` observations precede and include `end`.
    pub fn window(&self, end: usize, len: usize) -> Option<&[Observation]> {
        if len == 0 || end >= self.observations.len() || end + 1 < len {
            return None;
        }
        Some(&self.observations[end + 1 - len..=end])
    }
}
