//! Security-day observations and the records produced from them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Integer security identifier (CRSP `permno` style).
pub type SecurityId = i64;

/// Number of factors in the three-factor model.
pub const FACTOR_COUNT: usize = 3;

/// Column names of the factor returns, in regression order.
pub const FACTOR_NAMES: [&str; FACTOR_COUNT] = ["mktrf", "smb", "hml"];

/// One trading day of one security.
///
/// Missing inputs are carried as NaN so that the day still occupies its
/// position in the security's timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Security identifier
    pub security_id: SecurityId,
    /// Trading date
    pub date: NaiveDate,
    /// Security return minus the risk-free rate
    pub excess_return: f64,
    /// Factor returns: market excess, size, value
    pub factors: [f64; FACTOR_COUNT],
}

impl Observation {
    /// Create a new observation.
    pub const fn new(
        security_id: SecurityId,
        date: NaiveDate,
        excess_return: f64,
        factors: [f64; FACTOR_COUNT],
    ) -> Self {
        Self {
            security_id,
            date,
            excess_return,
            factors,
        }
    }

    /// Whether the excess return and every factor value are finite.
    pub fn is_complete(&self) -> bool {
        self.excess_return.is_finite() && self.factors.iter().all(|f| f.is_finite())
    }
}

/// Residual variance of one security on one day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResidualVarianceRecord {
    /// Security identifier
    pub security_id: SecurityId,
    /// Date of the last observation in the window
    pub date: NaiveDate,
    /// Sample variance of the window's regression residuals
    pub residual_variance: f64,
}

impl ResidualVarianceRecord {
    /// Create a new record.
    pub const fn new(security_id: SecurityId, date: NaiveDate, residual_variance: f64) -> Self {
        Self {
            security_id,
            date,
            residual_variance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observation_completeness() {
        let date = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
        let complete = Observation::new(10001, date, 0.01, [0.005, -0.002, 0.001]);
        assert!(complete.is_complete());

        let missing_factor = Observation::new(10001, date, 0.01, [f64::NAN, -0.002, 0.001]);
        assert!(!missing_factor.is_complete());

        let missing_return = Observation::new(10001, date, f64::NAN, [0.005, -0.002, 0.001]);
        assert!(!missing_return.is_complete());
    }

    #[test]
    fn test_factor_names_order() {
        assert_eq!(FACTOR_NAMES, ["mktrf", "smb", "hml"]);
    }
}
