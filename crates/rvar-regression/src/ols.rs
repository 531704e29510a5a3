//! Ordinary least squares via column-pivoted Householder QR.
//!
//! The design matrix is factorised as `X P = Q R` with `P` a column permutation
//! chosen so that the diagonal of `R` is non-increasing in magnitude. Columns
//! whose remaining norm falls below `tolerance * max_j ||x_j||` are treated as
//! linearly dependent, which gives the numerical rank. The basic solution on the
//! leading `rank` pivoted columns spans the same column space as `X`, so the
//! residual `y - X b` is the orthogonal projection residual whether or not `X`
//! has full column rank.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, s};
use thiserror::Error;

/// Default relative tolerance for rank detection.
pub const DEFAULT_RANK_TOLERANCE: f64 = 1e-10;

/// Errors from a single least-squares fit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OlsError {
    /// Response length does not match the design matrix
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Rows in the design matrix
        expected: usize,
        /// Length of the response
        actual: usize,
    },

    /// No rows or no columns
    #[error("Empty design matrix")]
    EmptyData,

    /// NaN or infinite input
    #[error("Design matrix or response contains non-finite values")]
    NonFinite,

    /// Design matrix is not of full column rank
    #[error("Design matrix has rank {rank}, expected {columns}")]
    RankDeficient {
        /// Detected numerical rank
        rank: usize,
        /// Number of columns
        columns: usize,
    },
}

/// Result of a least-squares fit.
#[derive(Debug, Clone)]
pub struct OlsFit {
    /// Estimated coefficients, in the column order of the design matrix.
    /// Coefficients of dependent columns are zero.
    pub coefficients: Array1<f64>,
    /// `y - X b`
    pub residuals: Array1<f64>,
    /// Numerical rank of the design matrix
    pub rank: usize,
}

impl OlsFit {
    /// Whether the design matrix had full column rank.
    pub fn is_full_rank(&self) -> bool {
        self.rank == self.coefficients.len()
    }
}

/// Solve `min_b ||y - X b||` for an `n x p` design matrix.
///
/// # Errors
///
/// Returns an error if the dimensions disagree, the input is empty, or any
/// value is non-finite. Rank deficiency is reported through [`OlsFit::rank`],
/// not as an error.
pub fn least_squares(
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
    tolerance: f64,
) -> Result<OlsFit, OlsError> {
    let (n, p) = x.dim();
    if y.len() != n {
        return Err(OlsError::DimensionMismatch {
            expected: n,
            actual: y.len(),
        });
    }
    if n == 0 || p == 0 {
        return Err(OlsError::EmptyData);
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(OlsError::NonFinite);
    }

    let mut r = x.to_owned();
    let mut qtb = y.to_owned();
    let mut perm: Vec<usize> = (0..p).collect();

    let scale = (0..p)
        .map(|j| trailing_norm(&r, j, 0))
        .fold(0.0, f64::max);
    let threshold = tolerance * scale;

    let mut reflector = vec![0.0; n];
    let mut rank = 0;

    for k in 0..n.min(p) {
        let mut pivot = k;
        let mut pivot_norm = trailing_norm(&r, k, k);
        for j in (k + 1)..p {
            let norm = trailing_norm(&r, j, k);
            if norm > pivot_norm {
                pivot = j;
                pivot_norm = norm;
            }
        }

        if pivot_norm <= threshold || pivot_norm == 0.0 {
            break;
        }

        if pivot != k {
            for i in 0..n {
                r.swap([i, k], [i, pivot]);
            }
            perm.swap(k, pivot);
        }

        // H = I - 2 v v' / (v' v) maps r[k.., k] onto alpha * e1
        let alpha = if r[[k, k]] >= 0.0 {
            -pivot_norm
        } else {
            pivot_norm
        };
        let len = n - k;
        let v = &mut reflector[..len];
        for (i, vi) in v.iter_mut().enumerate() {
            *vi = r[[k + i, k]];
        }
        v[0] -= alpha;
        let v_norm2: f64 = v.iter().map(|a| a * a).sum();

        r[[k, k]] = alpha;
        for i in (k + 1)..n {
            r[[i, k]] = 0.0;
        }

        for j in (k + 1)..p {
            let dot: f64 = v.iter().enumerate().map(|(i, vi)| vi * r[[k + i, j]]).sum();
            let f = 2.0 * dot / v_norm2;
            for (i, vi) in v.iter().enumerate() {
                r[[k + i, j]] -= f * vi;
            }
        }

        let dot: f64 = v.iter().enumerate().map(|(i, vi)| vi * qtb[k + i]).sum();
        let f = 2.0 * dot / v_norm2;
        for (i, vi) in v.iter().enumerate() {
            qtb[k + i] -= f * vi;
        }

        rank = k + 1;
    }

    let z = back_substitute(&r, &qtb, rank);
    let mut coefficients = Array1::zeros(p);
    for (k, &column) in perm.iter().enumerate().take(rank) {
        coefficients[column] = z[k];
    }

    let fitted = x.dot(&coefficients);
    let residuals = y.to_owned() - &fitted;

    Ok(OlsFit {
        coefficients,
        residuals,
        rank,
    })
}

/// Euclidean norm of `m[from.., j]`.
fn trailing_norm(m: &Array2<f64>, j: usize, from: usize) -> f64 {
    m.slice(s![from.., j])
        .iter()
        .map(|v| v * v)
        .sum::<f64>()
        .sqrt()
}

/// Solve the leading `rank x rank` upper-triangular system `R z = Q'y`.
fn back_substitute(r: &Array2<f64>, qtb: &Array1<f64>, rank: usize) -> Vec<f64> {
    let mut z = vec![0.0; rank];
    for i in (0..rank).rev() {
        let mut sum = qtb[i];
        for j in (i + 1)..rank {
            sum -= r[[i, j]] * z[j];
        }
        z[i] = sum / r[[i, i]];
    }
    z
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_simple_line_fit() {
        // y = 1 + 2x exactly
        let x = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0]];
        let y = array![1.0, 3.0, 5.0, 7.0];

        let fit = least_squares(x.view(), y.view(), DEFAULT_RANK_TOLERANCE).unwrap();
        assert!(fit.is_full_rank());
        assert_abs_diff_eq!(fit.coefficients[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(fit.coefficients[1], 2.0, epsilon = 1e-12);
        for r in fit.residuals.iter() {
            assert_abs_diff_eq!(*r, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_noisy_fit_residuals_orthogonal_to_design() {
        let x = array![
            [1.0, 0.3, -1.2],
            [1.0, -0.7, 0.4],
            [1.0, 1.1, 0.9],
            [1.0, 0.2, -0.3],
            [1.0, -1.4, 1.6],
            [1.0, 0.8, 0.1]
        ];
        let y = array![0.5, -0.2, 1.3, 0.1, -0.9, 0.7];

        let fit = least_squares(x.view(), y.view(), DEFAULT_RANK_TOLERANCE).unwrap();
        assert_eq!(fit.rank, 3);

        let xt_e = x.t().dot(&fit.residuals);
        for v in xt_e.iter() {
            assert_abs_diff_eq!(*v, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_rank_deficient_projects_onto_column_space() {
        // Second column duplicates the intercept, third is all zeros
        let x = array![
            [1.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
            [1.0, 1.0, 0.0]
        ];
        let y = array![1.0, -1.0, 1.0, -1.0];

        let fit = least_squares(x.view(), y.view(), DEFAULT_RANK_TOLERANCE).unwrap();
        assert_eq!(fit.rank, 1);
        assert!(!fit.is_full_rank());
        // Projection onto the constant vector leaves y - mean(y)
        for (r, yi) in fit.residuals.iter().zip(y.iter()) {
            assert_abs_diff_eq!(*r, *yi, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(fit.coefficients[2], 0.0);
    }

    #[test]
    fn test_collinear_columns_detected() {
        // Third column = 2 * second column
        let x = array![
            [1.0, 0.5, 1.0],
            [1.0, -0.25, -0.5],
            [1.0, 1.5, 3.0],
            [1.0, 0.0, 0.0],
            [1.0, 2.0, 4.0]
        ];
        let y = array![0.3, 0.1, 0.9, -0.2, 1.4];

        let fit = least_squares(x.view(), y.view(), DEFAULT_RANK_TOLERANCE).unwrap();
        assert_eq!(fit.rank, 2);

        let xt_e = x.t().dot(&fit.residuals);
        for v in xt_e.iter() {
            assert_abs_diff_eq!(*v, 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_dimension_mismatch() {
        let x = array![[1.0, 0.0], [1.0, 1.0]];
        let y = array![1.0, 2.0, 3.0];
        assert_eq!(
            least_squares(x.view(), y.view(), DEFAULT_RANK_TOLERANCE).unwrap_err(),
            OlsError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        );
    }

    #[test]
    fn test_non_finite_rejected() {
        let x = array![[1.0, 0.0], [1.0, f64::NAN], [1.0, 2.0]];
        let y = array![1.0, 2.0, 3.0];
        assert_eq!(
            least_squares(x.view(), y.view(), DEFAULT_RANK_TOLERANCE).unwrap_err(),
            OlsError::NonFinite
        );
    }

    #[test]
    fn test_empty_rejected() {
        let x = Array2::<f64>::zeros((0, 2));
        let y = Array1::<f64>::zeros(0);
        assert_eq!(
            least_squares(x.view(), y.view(), DEFAULT_RANK_TOLERANCE).unwrap_err(),
            OlsError::EmptyData
        );
    }
}
