use super::{DiagnosticError, Result};
use crate::analysis::distributions;
use ndarray::ArrayView1;
use ndarray_stats::SummaryStatisticsExt;

/// Statistic and p-value of a moment-based normality test, together with
/// the sample skewness and (non-excess) kurtosis it was computed from.
#[derive(Debug, Clone, Copy)]
pub struct NormalityTest {
    pub statistic: f64,
    pub p_value: f64,
    pub skew: f64,
    pub kurtosis: f64,
}

fn moments(x: ArrayView1<f64>) -> Result<(f64, f64)> {
    let empty = |_| DiagnosticError::InsufficientObservations {
        test: "moments",
        required: 1,
        actual: 0,
    };
    let skew = x.skewness().map_err(empty)?;
    let kurtosis = x.kurtosis().map_err(empty)?;
    if !skew.is_finite() || !kurtosis.is_finite() {
        return Err(DiagnosticError::Degenerate(
            "sample has zero variance".to_string(),
        ));
    }
    Ok((skew, kurtosis))
}

/// Jarque-Bera test: JB = n/6 * (S^2 + (K - 3)^2 / 4), chi-squared(2).
pub fn jarque_bera(x: ArrayView1<f64>) -> Result<NormalityTest> {
    let n = x.len();
    if n < 2 {
        return Err(DiagnosticError::InsufficientObservations {
            test: "Jarque-Bera",
            required: 2,
            actual: n,
        });
    }
    let (skew, kurtosis) = moments(x)?;
    let statistic = n as f64 / 6.0 * (skew.powi(2) + (kurtosis - 3.0).powi(2) / 4.0);
    let p_value = distributions::chi_squared_sf(statistic, 2.0)?;
    Ok(NormalityTest {
        statistic,
        p_value,
        skew,
        kurtosis,
    })
}

/// D'Agostino's skewness z-score.
fn skew_test(skew: f64, n: f64) -> f64 {
    let y = skew * ((n + 1.0) * (n + 3.0) / (6.0 * (n - 2.0))).sqrt();
    let beta2 = 3.0 * (n * n + 27.0 * n - 70.0) * (n + 1.0) * (n + 3.0)
        / ((n - 2.0) * (n + 5.0) * (n + 7.0) * (n + 9.0));
    let w2 = -1.0 + (2.0 * (beta2 - 1.0)).sqrt();
    let delta = 1.0 / (0.5 * w2.ln()).sqrt();
    let alpha = (2.0 / (w2 - 1.0)).sqrt();
    let y = if y == 0.0 { 1.0 } else { y };
    delta * (y / alpha + ((y / alpha).powi(2) + 1.0).sqrt()).ln()
}

/// Anscombe-Glynn kurtosis z-score.
fn kurtosis_test(kurtosis: f64, n: f64) -> f64 {
    let expected = 3.0 * (n - 1.0) / (n + 1.0);
    let variance =
        24.0 * n * (n - 2.0) * (n - 3.0) / ((n + 1.0).powi(2) * (n + 3.0) * (n + 5.0));
    let x = (kurtosis - expected) / variance.sqrt();
    let sqrt_beta1 = 6.0 * (n * n - 5.0 * n + 2.0) / ((n + 7.0) * (n + 9.0))
        * (6.0 * (n + 3.0) * (n + 5.0) / (n * (n - 2.0) * (n - 3.0))).sqrt();
    let a = 6.0
        + 8.0 / sqrt_beta1 * (2.0 / sqrt_beta1 + (1.0 + 4.0 / sqrt_beta1.powi(2)).sqrt());
    let term1 = 1.0 - 2.0 / (9.0 * a);
    let denom = 1.0 + x * (2.0 / (a - 4.0)).sqrt();
    let term2 = denom.signum() * ((1.0 - 2.0 / a) / denom.abs()).cbrt();
    (term1 - term2) / (2.0 / (9.0 * a)).sqrt()
}

/// D'Agostino-Pearson omnibus test: squared skewness and kurtosis z-scores,
/// chi-squared(2). Needs at least 8 observations.
pub fn omnibus(x: ArrayView1<f64>) -> Result<NormalityTest> {
    let n = x.len();
    if n < 8 {
        return Err(DiagnosticError::InsufficientObservations {
            test: "Omnibus",
            required: 8,
            actual: n,
        });
    }
    let (skew, kurtosis) = moments(x)?;
    let nf = n as f64;
    let statistic = skew_test(skew, nf).powi(2) + kurtosis_test(kurtosis, nf).powi(2);
    let p_value = distributions::chi_squared_sf(statistic, 2.0)?;
    Ok(NormalityTest {
        statistic,
        p_value,
        skew,
        kurtosis,
    })
}
