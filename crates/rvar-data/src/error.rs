//! Error types for panel operations.

use chrono::NaiveDate;
use thiserror::Error;

use crate::SecurityId;

/// Result type for panel operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Violations of the per-security timeline invariants.
///
/// Any of these is fatal: a run aborts before partitioning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputShapeError {
    /// The same security appears twice on one date.
    #[error("Duplicate observation for security {security_id} on {date}")]
    DuplicateDate {
        /// Offending security
        security_id: SecurityId,
        /// Repeated date
        date: NaiveDate,
    },

    /// Dates within a timeline are not strictly increasing.
    #[error("Dates for security {security_id} are not increasing: {current} follows {previous}")]
    NonIncreasingDate {
        /// Offending security
        security_id: SecurityId,
        /// Date of the preceding observation
        previous: NaiveDate,
        /// Date of the out-of-order observation
        current: NaiveDate,
    },

    /// An observation was placed in another security's timeline.
    #[error("Observation for security {found} found in timeline of security {expected}")]
    ForeignObservation {
        /// Security the timeline belongs to
        expected: SecurityId,
        /// Security carried by the observation
        found: SecurityId,
    },

    /// The same security was supplied as two separate timelines.
    #[error("Security {0} appears in more than one timeline")]
    DuplicateSecurity(SecurityId),

    /// A timeline has no observations.
    #[error("Timeline for security {0} is empty")]
    EmptyTimeline(SecurityId),
}

/// Errors that can occur while loading or validating a panel.
#[derive(Debug, Error)]
pub enum DataError {
    /// Timeline invariant violation
    #[error("Input shape error: {0}")]
    InputShape(#[from] InputShapeError),

    /// CSV reading error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Data parsing error
    #[error("Data parsing error: {0}")]
    Parse(String),

    /// A required input column is absent
    #[error("Missing column: {0}")]
    MissingColumn(String),
}
