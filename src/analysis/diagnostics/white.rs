use super::{DiagnosticError, Result};
use crate::analysis::design::DesignMatrix;
use crate::analysis::distributions;
use crate::analysis::ols::{least_squares, OlsError};
use ndarray::ArrayView1;
use tracing::debug;

/// Relative remainder below which an auxiliary column counts as a linear
/// combination of the columns before it.
const COLLINEARITY_TOLERANCE: f64 = 1e-8;

#[derive(Debug, Clone)]
pub struct WhiteTest {
    pub lm_statistic: f64,
    pub lm_pvalue: f64,
    /// F form of the test; absent when the auxiliary regression is saturated.
    pub f_statistic: Option<f64>,
    pub f_pvalue: Option<f64>,
    pub df: usize,
}

/// White's test for heteroskedasticity.
///
/// Squared residuals are regressed on every cross-product of the design
/// columns (levels, squares and interactions when `exog` has a constant).
/// LM = n * R^2 is chi-squared with one degree of freedom per non-constant
/// auxiliary regressor. Null hypothesis: homoskedasticity.
pub fn het_white(resid: ArrayView1<f64>, exog: &DesignMatrix) -> Result<WhiteTest> {
    let nobs = resid.len();
    if exog.nrows() != nobs {
        return Err(OlsError::DimensionMismatch {
            response: nobs,
            design: exog.nrows(),
        }
        .into());
    }

    let aux = exog.cross_products().independent_columns(COLLINEARITY_TOLERANCE);
    let k_constant = aux.k_constant().min(1);
    let k = aux.ncols();
    if k <= k_constant {
        return Err(DiagnosticError::Degenerate(
            "auxiliary regression has no slope terms".to_string(),
        ));
    }
    debug!(regressors = k, "White auxiliary regression");

    let resid_sq = resid.mapv(|e| e * e);
    let fit = least_squares(aux.view(), resid_sq.view())?;

    let tss = if k_constant > 0 {
        let mean = resid_sq.mean().unwrap_or(0.0);
        resid_sq.iter().map(|&v| (v - mean).powi(2)).sum::<f64>()
    } else {
        resid_sq.dot(&resid_sq)
    };
    if tss <= 0.0 {
        return Err(DiagnosticError::Degenerate(
            "squared residuals have no variation".to_string(),
        ));
    }

    let r_squared = (1.0 - fit.ssr() / tss).clamp(0.0, 1.0);
    let df = k - k_constant;
    let lm_statistic = nobs as f64 * r_squared;
    let lm_pvalue = distributions::chi_squared_sf(lm_statistic, df as f64)?;

    let df_resid = nobs - k;
    let (f_statistic, f_pvalue) = if df_resid > 0 {
        let f = (r_squared / df as f64) / ((1.0 - r_squared) / df_resid as f64);
        let p = distributions::f_sf(f, df as f64, df_resid as f64)?;
        (Some(f), Some(p))
    } else {
        (None, None)
    };

    Ok(WhiteTest {
        lm_statistic,
        lm_pvalue,
        f_statistic,
        f_pvalue,
        df,
    })
}
