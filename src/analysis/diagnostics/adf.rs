use super::{DiagnosticError, Result};
use crate::analysis::distributions::{self, poly};
use crate::analysis::ols::{least_squares, log_likelihood};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Deterministic terms included in the test regression.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdfRegression {
    #[serde(rename = "n")]
    NoConstant,
    #[default]
    #[serde(rename = "c")]
    Constant,
    #[serde(rename = "ct")]
    ConstantTrend,
}

impl AdfRegression {
    fn ntrend(self) -> usize {
        match self {
            AdfRegression::NoConstant => 0,
            AdfRegression::Constant => 1,
            AdfRegression::ConstantTrend => 2,
        }
    }
}

/// Lag-length selection rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Autolag {
    #[default]
    Aic,
    Bic,
    /// Use the maximum lag as given.
    #[serde(rename = "none", alias = "fixed")]
    Fixed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdfSettings {
    #[serde(default)]
    pub regression: AdfRegression,
    #[serde(default)]
    pub autolag: Autolag,
    /// Upper bound of the lag search; derived from the sample size when absent.
    #[serde(default)]
    pub max_lag: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CriticalValues {
    pub one: f64,
    pub five: f64,
    pub ten: f64,
}

#[derive(Debug, Clone)]
pub struct AdfTest {
    pub statistic: f64,
    pub p_value: f64,
    pub used_lag: usize,
    pub nobs: usize,
    pub critical_values: CriticalValues,
    /// Best information criterion of the lag search, when one was run.
    pub ic_best: Option<f64>,
}

/// MacKinnon (1994) response-surface coefficients for a single series.
struct PValueSurface {
    max: f64,
    min: f64,
    star: f64,
    small_p: [f64; 3],
    large_p: [f64; 4],
}

fn surface(regression: AdfRegression) -> PValueSurface {
    match regression {
        AdfRegression::NoConstant => PValueSurface {
            max: f64::INFINITY,
            min: -19.04,
            star: -1.04,
            small_p: [0.6344, 1.2378, 0.032496],
            large_p: [0.4797, 0.93557, -0.06999, 0.033066],
        },
        AdfRegression::Constant => PValueSurface {
            max: 2.74,
            min: -18.83,
            star: -1.61,
            small_p: [2.1659, 1.4412, 0.038269],
            large_p: [1.7339, 0.93202, -0.12745, -0.010368],
        },
        AdfRegression::ConstantTrend => PValueSurface {
            max: 0.7,
            min: -16.18,
            star: -2.89,
            small_p: [3.2512, 1.6047, 0.049588],
            large_p: [2.5261, 0.61654, -0.37956, -0.060285],
        },
    }
}

/// Approximate p-value of a Dickey-Fuller tau statistic.
pub fn mackinnon_p(statistic: f64, regression: AdfRegression) -> Result<f64> {
    let table = surface(regression);
    if statistic > table.max {
        return Ok(1.0);
    }
    if statistic < table.min {
        return Ok(0.0);
    }
    let z = if statistic <= table.star {
        poly(&table.small_p, statistic)
    } else {
        poly(&table.large_p, statistic)
    };
    Ok(distributions::normal_cdf(z)?)
}

/// MacKinnon (2010) finite-sample critical values.
pub fn mackinnon_crit(regression: AdfRegression, nobs: usize) -> CriticalValues {
    let coefficients: [[f64; 4]; 3] = match regression {
        AdfRegression::NoConstant => [
            [-2.56574, -2.2358, -3.627, 0.0],
            [-1.94100, -0.2686, -3.365, 31.223],
            [-1.61682, 0.2656, -2.714, 25.364],
        ],
        AdfRegression::Constant => [
            [-3.43035, -6.5393, -16.786, -79.433],
            [-2.86154, -2.8903, -4.234, -40.040],
            [-2.56677, -1.5384, -2.809, 0.0],
        ],
        AdfRegression::ConstantTrend => [
            [-3.95877, -9.0531, -28.428, -134.155],
            [-3.41049, -4.3904, -9.036, -45.374],
            [-3.12705, -2.5856, -3.925, -22.380],
        ],
    };
    let inv = 1.0 / nobs as f64;
    CriticalValues {
        one: poly(&coefficients[0], inv),
        five: poly(&coefficients[1], inv),
        ten: poly(&coefficients[2], inv),
    }
}

/// Regression of the differenced series on its lagged level, `lags` lagged
/// differences and the deterministic terms, using rows `trim..` of the
/// differenced series.
fn adf_regression(
    x: ArrayView1<f64>,
    xdiff: &[f64],
    lags: usize,
    trim: usize,
    regression: AdfRegression,
) -> (Array2<f64>, Array1<f64>) {
    let rows = xdiff.len() - trim;
    let k = 1 + lags + regression.ntrend();
    let mut exog = Array2::zeros((rows, k));
    let mut endog = Array1::zeros(rows);

    for (i, t) in (trim..xdiff.len()).enumerate() {
        endog[i] = xdiff[t];
        exog[[i, 0]] = x[t];
        for j in 1..=lags {
            exog[[i, j]] = xdiff[t - j];
        }
        match regression {
            AdfRegression::NoConstant => {}
            AdfRegression::Constant => exog[[i, lags + 1]] = 1.0,
            AdfRegression::ConstantTrend => {
                exog[[i, lags + 1]] = 1.0;
                exog[[i, lags + 2]] = (i + 1) as f64;
            }
        }
    }

    (exog, endog)
}

/// Default upper bound of the lag search (Schwert's rule), capped so the
/// regression keeps enough observations.
fn default_max_lag(nobs: usize, ntrend: usize) -> Option<usize> {
    let schwert = (12.0 * (nobs as f64 / 100.0).powf(0.25)).ceil() as usize;
    (nobs / 2)
        .checked_sub(ntrend + 1)
        .map(|cap| schwert.min(cap))
}

/// Augmented Dickey-Fuller unit-root test. Null hypothesis: the series has
/// a unit root.
pub fn adfuller(x: ArrayView1<f64>, settings: &AdfSettings) -> Result<AdfTest> {
    let nobs = x.len();
    let ntrend = settings.regression.ntrend();
    let cap = (nobs / 2).checked_sub(ntrend + 1);

    let max_lag = match (settings.max_lag, cap) {
        (_, None) => {
            return Err(DiagnosticError::InsufficientObservations {
                test: "ADF",
                required: 2 * (ntrend + 1),
                actual: nobs,
            })
        }
        (Some(lag), Some(cap)) if lag > cap => {
            return Err(DiagnosticError::InvalidSetting(format!(
                "max_lag must be at most {cap} for {nobs} observations"
            )))
        }
        (Some(lag), Some(_)) => lag,
        (None, Some(_)) => default_max_lag(nobs, ntrend).unwrap_or(0),
    };

    let xdiff: Vec<f64> = x
        .iter()
        .zip(x.iter().skip(1))
        .map(|(prev, next)| next - prev)
        .collect();

    let (used_lag, ic_best) = match settings.autolag {
        Autolag::Fixed => (max_lag, None),
        Autolag::Aic | Autolag::Bic => {
            let (lag, ic) = select_lag(x, &xdiff, max_lag, settings)?;
            (lag, Some(ic))
        }
    };

    let (exog, endog) = adf_regression(x, &xdiff, used_lag, used_lag, settings.regression);
    let (rows, k) = exog.dim();
    if rows <= k {
        return Err(DiagnosticError::InsufficientObservations {
            test: "ADF",
            required: k + 1,
            actual: rows,
        });
    }

    let fit = least_squares(exog.view(), endog.view())?;
    let sigma2 = fit.ssr() / (rows - k) as f64;
    let se = (fit.normalized_cov[[0, 0]] * sigma2).sqrt();
    let statistic = fit.coefficients[0] / se;
    let p_value = mackinnon_p(statistic, settings.regression)?;

    debug!(statistic, p_value, used_lag, nobs = rows, "ADF test");

    Ok(AdfTest {
        statistic,
        p_value,
        used_lag,
        nobs: rows,
        critical_values: mackinnon_crit(settings.regression, rows),
        ic_best,
    })
}

/// Pick the lag order minimizing the information criterion. All candidate
/// regressions share the sample left after dropping `max_lag` rows.
fn select_lag(
    x: ArrayView1<f64>,
    xdiff: &[f64],
    max_lag: usize,
    settings: &AdfSettings,
) -> Result<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;

    for lag in 0..=max_lag {
        let (exog, endog) = adf_regression(x, xdiff, lag, max_lag, settings.regression);
        let (rows, k) = exog.dim();
        let fit = match least_squares(exog.view(), endog.view()) {
            Ok(fit) => fit,
            Err(err) => {
                debug!(lag, error = %err, "skipping lag");
                continue;
            }
        };
        let llf = log_likelihood(fit.ssr(), rows);
        let penalty = match settings.autolag {
            Autolag::Bic => (rows as f64).ln() * k as f64,
            _ => 2.0 * k as f64,
        };
        let ic = -2.0 * llf + penalty;
        if best.map_or(true, |(_, best_ic)| ic < best_ic) {
            best = Some((lag, ic));
        }
    }

    best.ok_or_else(|| {
        DiagnosticError::Degenerate("no lag order produced a usable regression".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pvalue_at_five_percent_critical_value() {
        let p = mackinnon_p(-2.8621, AdfRegression::Constant).unwrap();
        assert!((p - 0.05).abs() < 0.005, "p = {p}");
    }

    #[test]
    fn test_pvalue_bounds() {
        assert_eq!(mackinnon_p(3.0, AdfRegression::Constant).unwrap(), 1.0);
        assert_eq!(mackinnon_p(-20.0, AdfRegression::Constant).unwrap(), 0.0);
        let p = mackinnon_p(-1.0, AdfRegression::ConstantTrend).unwrap();
        assert!(p > 0.9 && p < 1.0);
    }

    #[test]
    fn test_asymptotic_critical_values() {
        let crit = mackinnon_crit(AdfRegression::Constant, 1_000_000);
        assert_relative_eq!(crit.one, -3.43035, epsilon = 1e-4);
        assert_relative_eq!(crit.five, -2.86154, epsilon = 1e-4);
        assert_relative_eq!(crit.ten, -2.56677, epsilon = 1e-4);
    }

    #[test]
    fn test_default_max_lag() {
        assert_eq!(default_max_lag(100, 1), Some(12));
        assert_eq!(default_max_lag(12, 1), Some(4));
        assert_eq!(default_max_lag(3, 1), None);
    }

    #[test]
    fn test_regression_layout() {
        let x = Array1::from(vec![1.0, 3.0, 2.0, 5.0, 4.0]);
        let xdiff = vec![2.0, -1.0, 3.0, -1.0];
        let (exog, endog) = adf_regression(x.view(), &xdiff, 1, 1, AdfRegression::ConstantTrend);
        assert_eq!(exog.dim(), (3, 4));
        assert_eq!(endog.to_vec(), vec![-1.0, 3.0, -1.0]);
        // level, lagged difference, constant, trend
        assert_eq!(exog.row(0).to_vec(), vec![3.0, 2.0, 1.0, 1.0]);
        assert_eq!(exog.row(2).to_vec(), vec![5.0, 3.0, 1.0, 3.0]);
    }

    #[test]
    fn test_reference_dickey_fuller_statistic() {
        // x_t = 0.5 x_{t-1} + ((7t mod 11) - 5) / 3, no augmentation lags
        let mut x = Array1::zeros(30);
        for t in 1..30 {
            x[t] = 0.5 * x[t - 1] + ((t * 7) % 11) as f64 / 3.0 - 5.0 / 3.0;
        }
        let settings = AdfSettings {
            regression: AdfRegression::Constant,
            autolag: Autolag::Fixed,
            max_lag: Some(0),
        };

        let test = adfuller(x.view(), &settings).unwrap();
        assert_eq!(test.used_lag, 0);
        assert_eq!(test.nobs, 29);
        assert!(test.ic_best.is_none());
        assert_relative_eq!(test.statistic, -5.487902107682425, epsilon = 1e-8);
        assert_relative_eq!(test.p_value, 2.208657367164246e-6, max_relative = 1e-6);
    }

    #[test]
    fn test_too_short_series() {
        let x = Array1::from(vec![1.0, 2.0, 1.5]);
        assert!(matches!(
            adfuller(x.view(), &AdfSettings::default()),
            Err(DiagnosticError::InsufficientObservations { .. })
        ));
    }
}
