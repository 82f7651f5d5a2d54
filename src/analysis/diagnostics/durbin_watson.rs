use super::{DiagnosticError, Result};
use ndarray::ArrayView1;

/// Durbin-Watson statistic: sum of squared successive differences over the
/// sum of squares. Lies in [0, 4]; values near 2 mean no first-order
/// autocorrelation.
pub fn durbin_watson(resid: ArrayView1<f64>) -> Result<f64> {
    if resid.len() < 2 {
        return Err(DiagnosticError::InsufficientObservations {
            test: "Durbin-Watson",
            required: 2,
            actual: resid.len(),
        });
    }

    let denominator = resid.dot(&resid);
    if denominator == 0.0 {
        return Err(DiagnosticError::Degenerate(
            "residuals are identically zero".to_string(),
        ));
    }

    let numerator: f64 = resid
        .iter()
        .zip(resid.iter().skip(1))
        .map(|(prev, next)| (next - prev).powi(2))
        .sum();

    Ok(numerator / denominator)
}
