//! Engine configuration.

use rvar_data::FACTOR_COUNT;
use serde::{Deserialize, Serialize};

use crate::engine::EngineError;
use crate::ols::DEFAULT_RANK_TOLERANCE;

/// Columns of the design matrix: intercept plus one per factor.
pub const REGRESSORS: usize = FACTOR_COUNT + 1;

/// What to do with a window whose design matrix is rank-deficient.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SingularPolicy {
    /// Use the residual of the projection onto the detected column space
    #[default]
    Project,
    /// Omit the window's record
    Skip,
}

/// Configuration for the rolling regression engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollingConfig {
    /// Window length in trading days (default: 60)
    pub window: usize,
    /// Relative tolerance for rank detection (default: 1e-10)
    pub rank_tolerance: f64,
    /// Handling of rank-deficient windows (default: project)
    pub singular_policy: SingularPolicy,
}

impl Default for RollingConfig {
    fn default() -> Self {
        Self {
            window: 60,
            rank_tolerance: DEFAULT_RANK_TOLERANCE,
            singular_policy: SingularPolicy::Project,
        }
    }
}

impl RollingConfig {
    /// Smallest window that leaves a residual degree of freedom.
    pub const MIN_WINDOW: usize = REGRESSORS + 1;

    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidWindow`] if the window cannot identify the
    /// model with at least one residual degree of freedom, or
    /// [`EngineError::InvalidTolerance`] if the tolerance is negative or not finite.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.window < Self::MIN_WINDOW {
            return Err(EngineError::InvalidWindow {
                window: self.window,
                minimum: Self::MIN_WINDOW,
            });
        }
        if !self.rank_tolerance.is_finite() || self.rank_tolerance < 0.0 {
            return Err(EngineError::InvalidTolerance(self.rank_tolerance));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_config_default() {
        let config = RollingConfig::default();
        assert_eq!(config.window, 60);
        assert_eq!(config.rank_tolerance, 1e-10);
        assert_eq!(config.singular_policy, SingularPolicy::Project);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_window_too_short() {
        let config = RollingConfig {
            window: REGRESSORS,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidWindow { window: 4, minimum: 5 })
        ));
    }

    #[test]
    fn test_invalid_tolerance() {
        let config = RollingConfig {
            rank_tolerance: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidTolerance(_))
        ));
    }

    #[test]
    fn test_partial_config_deserialization() {
        let config: RollingConfig =
            serde_json::from_str(r#"{"window": 20, "singular_policy": "skip"}"#).unwrap();
        assert_eq!(config.window, 20);
        assert_eq!(config.singular_policy, SingularPolicy::Skip);
        assert_eq!(config.rank_tolerance, DEFAULT_RANK_TOLERANCE);
    }
}
