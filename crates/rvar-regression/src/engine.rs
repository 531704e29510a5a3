//! Rolling regression engine.
//!
//! For every security with at least `window` observations, and every
//! observation index `i >= window - 1`, the excess returns of the window
//! `[i - window + 1, i]` are regressed on an intercept and the factor returns.
//! The sample variance of the residuals is recorded against the date of
//! observation `i`.

use ndarray::{Array1, Array2};
use rvar_data::{Observation, ResidualVarianceRecord, SecurityTimeline};
use thiserror::Error;
use tracing::{debug, trace};

use crate::cancel::CancellationToken;
use crate::config::{REGRESSORS, RollingConfig, SingularPolicy};
use crate::ols::{OlsError, least_squares};
use crate::stats::EngineStats;
use crate::variance::sample_variance;

/// Partition-level engine errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Window too short to fit the model
    #[error("Invalid window length {window}: need at least {minimum} observations")]
    InvalidWindow {
        /// Configured window
        window: usize,
        /// Smallest usable window
        minimum: usize,
    },

    /// Rank tolerance is negative or not finite
    #[error("Invalid rank tolerance: {0}")]
    InvalidTolerance(f64),

    /// Cancellation was requested
    #[error("Computation cancelled")]
    Cancelled,
}

/// A successful window fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowFit {
    /// Sample variance of the residuals
    pub residual_variance: f64,
    /// Numerical rank of the design matrix
    pub rank: usize,
}

/// Records and accounting for one partition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionResult {
    /// Records per security in input order, dates ascending within a security
    pub records: Vec<ResidualVarianceRecord>,
    /// Window accounting
    pub stats: EngineStats,
}

/// Fits rolling three-factor regressions over security timelines.
#[derive(Debug, Clone, Default)]
pub struct RollingRegressionEngine {
    config: RollingConfig,
}

impl RollingRegressionEngine {
    /// Create an engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: RollingConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Engine configuration.
    pub const fn config(&self) -> &RollingConfig {
        &self.config
    }

    /// Window length.
    pub const fn window(&self) -> usize {
        self.config.window
    }

    /// Fit one window and return the residual variance.
    ///
    /// # Errors
    ///
    /// Returns [`OlsError::NonFinite`] if any value in the window is missing,
    /// and [`OlsError::RankDeficient`] for a rank-deficient window under
    /// [`SingularPolicy::Skip`].
    pub fn fit_window(&self, window: &[Observation]) -> Result<WindowFit, OlsError> {
        if !window.iter().all(Observation::is_complete) {
            return Err(OlsError::NonFinite);
        }

        let n = window.len();
        let mut x = Array2::<f64>::ones((n, REGRESSORS));
        let mut y = Array1::<f64>::zeros(n);
        for (i, obs) in window.iter().enumerate() {
            y[i] = obs.excess_return;
            for (j, &factor) in obs.factors.iter().enumerate() {
                x[[i, j + 1]] = factor;
            }
        }

        let fit = least_squares(x.view(), y.view(), self.config.rank_tolerance)?;
        if !fit.is_full_rank() && self.config.singular_policy == SingularPolicy::Skip {
            return Err(OlsError::RankDeficient {
                rank: fit.rank,
                columns: REGRESSORS,
            });
        }

        let residual_variance =
            sample_variance(fit.residuals.view()).ok_or(OlsError::EmptyData)?;
        Ok(WindowFit {
            residual_variance,
            rank: fit.rank,
        })
    }

    /// Fit every full window of one timeline, appending records to `records`.
    ///
    /// Dates are strictly increasing by construction of [`SecurityTimeline`].
    /// Per-window failures are counted in `stats`.
    pub fn process_timeline(
        &self,
        timeline: &SecurityTimeline,
        records: &mut Vec<ResidualVarianceRecord>,
        stats: &mut EngineStats,
    ) {
        let security_id = timeline.security_id();
        let observations = timeline.observations();
        let window = self.config.window;

        stats.securities += 1;
        if observations.len() < window {
            stats.short_securities += 1;
            return;
        }

        for end in (window - 1)..observations.len() {
            let slice = &observations[end + 1 - window..=end];
            stats.windows += 1;
            match self.fit_window(slice) {
                Ok(fit) => {
                    if fit.rank < REGRESSORS {
                        stats.rank_deficient += 1;
                    }
                    records.push(ResidualVarianceRecord::new(
                        security_id,
                        slice[window - 1].date,
                        fit.residual_variance,
                    ));
                    stats.records += 1;
                }
                Err(OlsError::NonFinite) => stats.non_finite_omitted += 1,
                Err(_) => stats.singular_omitted += 1,
            }
        }
    }

    /// Process a set of timelines sequentially.
    ///
    /// The token is polled before each security.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Cancelled`] if the token is cancelled.
    pub fn run_partition(
        &self,
        timelines: &[SecurityTimeline],
        cancel: &CancellationToken,
    ) -> Result<PartitionResult, EngineError> {
        let window = self.config.window;
        let capacity = timelines
            .iter()
            .map(|t| (t.len() + 1).saturating_sub(window))
            .sum();

        let mut result = PartitionResult {
            records: Vec::with_capacity(capacity),
            stats: EngineStats::default(),
        };

        for timeline in timelines {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            self.process_timeline(timeline, &mut result.records, &mut result.stats);
            trace!(
                security_id = timeline.security_id(),
                observations = timeline.len(),
                "Processed security"
            );
        }

        debug!(
            securities = result.stats.securities,
            records = result.stats.records,
            omitted = result.stats.omitted(),
            "Partition finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rvar_data::SecurityId;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use chrono::{Days, NaiveDate};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rstest::rstest;

    fn date(offset: usize) -> NaiveDate {
        NaiveDate::from_ymd_opt(2015, 1, 1)
            .unwrap()
            .checked_add_days(Days::new(offset as u64))
            .unwrap()
    }

    fn random_timeline(id: SecurityId, len: usize, seed: u64) -> SecurityTimeline {
        let mut rng = StdRng::seed_from_u64(seed);
        let observations = (0..len)
            .map(|i| {
                let factors = [
                    rng.gen_range(-0.03..0.03),
                    rng.gen_range(-0.01..0.01),
                    rng.gen_range(-0.01..0.01),
                ];
                let noise: f64 = rng.gen_range(-0.02..0.02);
                let exret = 0.0002 + 1.1 * factors[0] + 0.4 * factors[1] - 0.2 * factors[2] + noise;
                Observation::new(id, date(i), exret, factors)
            })
            .collect();
        SecurityTimeline::new(id, observations).unwrap()
    }

    fn engine(window: usize) -> RollingRegressionEngine {
        RollingRegressionEngine::new(RollingConfig {
            window,
            ..Default::default()
        })
        .unwrap()
    }

    /// Residual variance via `(I - X (X'X)^-1 X') y`.
    fn hat_matrix_variance(window: &[Observation]) -> f64 {
        let n = window.len();
        let mut x = Array2::<f64>::ones((n, REGRESSORS));
        let mut y = Array1::<f64>::zeros(n);
        for (i, obs) in window.iter().enumerate() {
            y[i] = obs.excess_return;
            for j in 0..3 {
                x[[i, j + 1]] = obs.factors[j];
            }
        }
        let xtx_inv = invert(&x.t().dot(&x));
        let hat = x.dot(&xtx_inv).dot(&x.t());
        let residuals = &y - &hat.dot(&y);
        sample_variance(residuals.view()).unwrap()
    }

    /// Gauss-Jordan inverse with partial pivoting.
    fn invert(a: &Array2<f64>) -> Array2<f64> {
        let n = a.nrows();
        let mut m = a.clone();
        let mut inv = Array2::<f64>::eye(n);
        for col in 0..n {
            let pivot = (col..n)
                .max_by(|&i, &j| m[[i, col]].abs().total_cmp(&m[[j, col]].abs()))
                .unwrap();
            for j in 0..n {
                m.swap([col, j], [pivot, j]);
                inv.swap([col, j], [pivot, j]);
            }
            let d = m[[col, col]];
            for j in 0..n {
                m[[col, j]] /= d;
                inv[[col, j]] /= d;
            }
            for row in 0..n {
                if row != col {
                    let f = m[[row, col]];
                    for j in 0..n {
                        m[[row, j]] -= f * m[[col, j]];
                        inv[[row, j]] -= f * inv[[col, j]];
                    }
                }
            }
        }
        inv
    }

    #[rstest]
    #[case(59, 0)]
    #[case(60, 1)]
    #[case(61, 2)]
    #[case(120, 61)]
    fn test_record_count_by_length(#[case] len: usize, #[case] expected: usize) {
        let timeline = random_timeline(1, len, 42);
        let result = engine(60)
            .run_partition(&[timeline], &CancellationToken::new())
            .unwrap();

        assert_eq!(result.records.len(), expected);
        assert_eq!(result.stats.records, expected);
        assert_eq!(result.stats.short_securities, usize::from(len < 60));
    }

    #[test]
    fn test_record_dated_at_window_end() {
        let timeline = random_timeline(9, 75, 3);
        let result = engine(60)
            .run_partition(std::slice::from_ref(&timeline), &CancellationToken::new())
            .unwrap();

        for (k, record) in result.records.iter().enumerate() {
            assert_eq!(record.security_id, 9);
            assert_eq!(record.date, timeline.observations()[59 + k].date);
        }
    }

    #[test]
    fn test_matches_hat_matrix_formula() {
        let timeline = random_timeline(1, 90, 11);
        let eng = engine(60);
        let mut records = Vec::new();
        let mut stats = EngineStats::default();
        eng.process_timeline(&timeline, &mut records, &mut stats);

        assert_eq!(records.len(), 31);
        for (k, record) in records.iter().enumerate() {
            let window = timeline.window(59 + k, 60).unwrap();
            assert_relative_eq!(
                record.residual_variance,
                hat_matrix_variance(window),
                max_relative = 1e-8
            );
        }
    }

    #[test]
    fn test_exact_linear_combination_has_zero_variance() {
        let mut rng = StdRng::seed_from_u64(5);
        let observations: Vec<Observation> = (0..60)
            .map(|i| {
                let f = [
                    rng.gen_range(-0.05..0.05),
                    rng.gen_range(-0.05..0.05),
                    rng.gen_range(-0.05..0.05),
                ];
                let exret = 0.001 + 0.9 * f[0] - 0.5 * f[1] + 0.25 * f[2];
                Observation::new(1, date(i), exret, f)
            })
            .collect();

        let fit = engine(60).fit_window(&observations).unwrap();
        assert_eq!(fit.rank, REGRESSORS);
        assert_abs_diff_eq!(fit.residual_variance, 0.0, epsilon = 1e-20);
    }

    #[test]
    fn test_fixed_loadings_alternating_returns() {
        let observations: Vec<Observation> = (0..60)
            .map(|i| {
                let exret = if i % 2 == 0 { 1.0 } else { -1.0 };
                Observation::new(1, date(i), exret, [1.0, 0.0, 0.0])
            })
            .collect();
        let timeline = SecurityTimeline::new(1, observations).unwrap();

        let result = engine(60)
            .run_partition(&[timeline], &CancellationToken::new())
            .unwrap();

        assert_eq!(result.records.len(), 1);
        let variance = result.records[0].residual_variance;
        assert!(variance.is_finite());
        assert!(variance >= 0.0);
        assert_relative_eq!(variance, 60.0 / 59.0, epsilon = 1e-12);
        assert_eq!(result.stats.rank_deficient, 1);
    }

    #[test]
    fn test_skip_policy_omits_singular_windows() {
        let observations: Vec<Observation> = (0..62)
            .map(|i| {
                let exret = if i % 2 == 0 { 1.0 } else { -1.0 };
                Observation::new(1, date(i), exret, [1.0, 0.0, 0.0])
            })
            .collect();
        let timeline = SecurityTimeline::new(1, observations).unwrap();
        let eng = RollingRegressionEngine::new(RollingConfig {
            singular_policy: SingularPolicy::Skip,
            ..Default::default()
        })
        .unwrap();

        let result = eng
            .run_partition(&[timeline], &CancellationToken::new())
            .unwrap();
        assert!(result.records.is_empty());
        assert_eq!(result.stats.windows, 3);
        assert_eq!(result.stats.singular_omitted, 3);
    }

    #[test]
    fn test_missing_values_omit_covering_windows() {
        let timeline = random_timeline(1, 65, 8);
        let mut observations = timeline.observations().to_vec();
        observations[2].factors[1] = f64::NAN;
        let timeline = SecurityTimeline::new(1, observations).unwrap();

        let result = engine(60)
            .run_partition(std::slice::from_ref(&timeline), &CancellationToken::new())
            .unwrap();

        // Windows ending at 59, 60, 61 contain index 2
        assert_eq!(result.stats.non_finite_omitted, 3);
        assert_eq!(result.records.len(), 3);
        assert_eq!(result.records[0].date, timeline.observations()[62].date);
    }

    #[test]
    fn test_cancelled_token_stops_partition() {
        let token = CancellationToken::new();
        token.cancel();
        let err = engine(60)
            .run_partition(&[random_timeline(1, 70, 1)], &token)
            .unwrap_err();
        assert_eq!(err, EngineError::Cancelled);
    }

    #[test]
    fn test_deterministic_output() {
        let timelines = vec![random_timeline(1, 80, 21), random_timeline(2, 100, 22)];
        let eng = engine(30);
        let first = eng
            .run_partition(&timelines, &CancellationToken::new())
            .unwrap();
        let second = eng
            .run_partition(&timelines, &CancellationToken::new())
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_window_rejected() {
        let err = RollingRegressionEngine::new(RollingConfig {
            window: 3,
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidWindow { .. }));
    }
}
