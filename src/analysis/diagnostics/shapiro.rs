use super::{DiagnosticError, Result};
use crate::analysis::distributions::{self, poly};
use ndarray::ArrayView1;
use std::f64::consts::{FRAC_1_SQRT_2, PI};
use tracing::warn;

// Royston (1995) polynomial approximations
const C1: [f64; 6] = [0.0, 0.221157, -0.147981, -2.071190, 4.434685, -2.706056];
const C2: [f64; 6] = [0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633];
const C3: [f64; 4] = [0.5440, -0.39978, 0.025054, -6.714e-4];
const C4: [f64; 4] = [1.3822, -0.77857, 0.062767, -0.0020322];
const C5: [f64; 4] = [-1.5861, -0.31082, -0.083751, 0.0038915];
const C6: [f64; 3] = [-0.4803, -0.082676, 0.0030302];
const G: [f64; 2] = [-2.273, 0.459];

const MAX_EXACT_N: usize = 5000;

#[derive(Debug, Clone, Copy)]
pub struct ShapiroWilk {
    pub statistic: f64,
    pub p_value: f64,
}

/// Shapiro-Wilk test of normality (Royston's algorithm).
pub fn shapiro_wilk(x: ArrayView1<f64>) -> Result<ShapiroWilk> {
    let n = x.len();
    if n < 3 {
        return Err(DiagnosticError::InsufficientObservations {
            test: "Shapiro-Wilk",
            required: 3,
            actual: n,
        });
    }
    if n > MAX_EXACT_N {
        warn!(n, "Shapiro-Wilk p-value may be inaccurate above 5000 observations");
    }

    let mut sorted = x.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let range = sorted[n - 1] - sorted[0];
    if !(range > 1e-19) {
        return Err(DiagnosticError::Degenerate(
            "all values are identical".to_string(),
        ));
    }

    let weights = weights(n)?;
    let mean = sorted.iter().sum::<f64>() / n as f64;
    let ss: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
    let numerator: f64 = weights.iter().zip(&sorted).map(|(w, v)| w * v).sum();
    let statistic = (numerator * numerator / ss).min(1.0);
    let p_value = p_value(statistic, n)?;

    Ok(ShapiroWilk { statistic, p_value })
}

/// Antisymmetric coefficients applied to the ordered sample.
fn weights(n: usize) -> Result<Vec<f64>> {
    if n == 3 {
        return Ok(vec![-FRAC_1_SQRT_2, 0.0, FRAC_1_SQRT_2]);
    }

    let an25 = n as f64 + 0.25;
    let m = (1..=n)
        .map(|i| distributions::normal_quantile((i as f64 - 0.375) / an25))
        .collect::<std::result::Result<Vec<f64>, _>>()?;
    let summ2: f64 = m.iter().map(|v| v * v).sum();
    let ssumm2 = summ2.sqrt();
    let rsn = 1.0 / (n as f64).sqrt();

    let mut w = vec![0.0; n];
    let a1 = m[n - 1] / ssumm2 + poly(&C1, rsn);
    w[n - 1] = a1;
    w[0] = -a1;

    let (first, fac) = if n > 5 {
        let a2 = m[n - 2] / ssumm2 + poly(&C2, rsn);
        w[n - 2] = a2;
        w[1] = -a2;
        let fac = ((summ2 - 2.0 * m[n - 1].powi(2) - 2.0 * m[n - 2].powi(2))
            / (1.0 - 2.0 * a1.powi(2) - 2.0 * a2.powi(2)))
        .sqrt();
        (2, fac)
    } else {
        let fac = ((summ2 - 2.0 * m[n - 1].powi(2)) / (1.0 - 2.0 * a1.powi(2))).sqrt();
        (1, fac)
    };
    for i in first..n - first {
        w[i] = m[i] / fac;
    }

    Ok(w)
}

fn p_value(w: f64, n: usize) -> Result<f64> {
    if n == 3 {
        let p = 6.0 / PI * (w.sqrt().asin() - (0.75f64).sqrt().asin());
        return Ok(p.clamp(0.0, 1.0));
    }
    if w >= 1.0 {
        return Ok(1.0);
    }

    let an = n as f64;
    let mut y = (1.0 - w).ln();
    let (m, s) = if n <= 11 {
        let gamma = poly(&G, an);
        if y >= gamma {
            return Ok(0.0);
        }
        y = -(gamma - y).ln();
        (poly(&C3, an), poly(&C4, an).exp())
    } else {
        let xx = an.ln();
        (poly(&C5, xx), poly(&C6, xx).exp())
    };

    Ok(distributions::normal_sf((y - m) / s)?.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array1};

    #[test]
    fn test_three_equally_spaced_points() {
        let result = shapiro_wilk(array![1.0, 2.0, 3.0].view()).unwrap();
        assert_relative_eq!(result.statistic, 1.0, epsilon = 1e-12);
        assert_relative_eq!(result.p_value, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_reference_values_small_sample() {
        // scipy.stats.shapiro([1, 2, 3, 4, 5])
        let result = shapiro_wilk(array![1.0, 2.0, 3.0, 4.0, 5.0].view()).unwrap();
        assert_relative_eq!(result.statistic, 0.986762, epsilon = 1e-5);
        assert_relative_eq!(result.p_value, 0.967174, epsilon = 1e-4);
    }

    #[test]
    fn test_skewed_sample_rejected() {
        let x = array![148.0, 154.0, 158.0, 160.0, 161.0, 162.0, 166.0, 170.0, 182.0, 195.0, 236.0];
        let result = shapiro_wilk(x.view()).unwrap();
        assert_relative_eq!(result.statistic, 0.78881, epsilon = 1e-4);
        assert!(result.p_value < 0.02);
    }

    #[test]
    fn test_normal_scores_accepted() {
        // Expected normal order statistics are as normal as a sample gets
        let n = 40;
        let x: Array1<f64> = (1..=n)
            .map(|i| distributions::normal_quantile((i as f64 - 0.375) / (n as f64 + 0.25)).unwrap())
            .collect();
        let result = shapiro_wilk(x.view()).unwrap();
        assert!(result.statistic > 0.98);
        assert!(result.p_value > 0.5);
    }

    #[test]
    fn test_identical_values_rejected() {
        assert!(matches!(
            shapiro_wilk(array![2.0, 2.0, 2.0, 2.0].view()),
            Err(DiagnosticError::Degenerate(_))
        ));
    }
}
