//! Residual variance.

use ndarray::ArrayView1;

/// Sample variance with Bessel's correction (divides by `n - 1`).
///
/// Returns `None` for fewer than two values.
pub fn sample_variance(values: ArrayView1<'_, f64>) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let mean = values.mean()?;
    Some(values.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0))
}
