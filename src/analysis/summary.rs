use super::diagnostics::{durbin_watson, jarque_bera, omnibus, NormalityTest};
use super::ols::OlsResults;
use chrono::{Local, NaiveDateTime};
use std::fmt;

const HALF: usize = 39;
const LARGE_CONDITION_NUMBER: f64 = 1000.0;

/// Printable regression summary: model statistics, coefficient table and
/// residual moments.
pub struct RegressionSummary<'a> {
    results: &'a OlsResults,
    omnibus: Option<NormalityTest>,
    jarque_bera: Option<NormalityTest>,
    durbin_watson: Option<f64>,
    generated: NaiveDateTime,
}

impl<'a> RegressionSummary<'a> {
    pub fn new(results: &'a OlsResults) -> Self {
        let resid = results.resid.view();
        Self {
            results,
            omnibus: omnibus(resid).ok(),
            jarque_bera: jarque_bera(resid).ok(),
            durbin_watson: durbin_watson(resid).ok(),
            generated: Local::now().naive_local(),
        }
    }
}

fn pair(label: &str, value: String) -> String {
    let width = HALF.saturating_sub(label.len()).max(1);
    format!("{label}{value:>width$}")
}

fn row(f: &mut fmt::Formatter<'_>, left: String, right: String) -> fmt::Result {
    writeln!(f, "{left:<width$}{right}", width = HALF)
}

fn num(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.precision$}"),
        Some(v) => format!("{v}"),
        None => "nan".to_string(),
    }
}

fn sci(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.3e}")
    } else {
        format!("{value}")
    }
}

impl fmt::Display for RegressionSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.results;
        let name_width = r.names().iter().map(|n| n.len()).max().unwrap_or(0).max(10);
        let width = (name_width + 66).max(2 * HALF);
        let heavy = "=".repeat(width);
        let light = "-".repeat(width);

        writeln!(f, "{:^width$}", "OLS Regression Results")?;
        writeln!(f, "{heavy}")?;
        row(
            f,
            pair("Dep. Variable:", r.response_name.clone()),
            pair("R-squared:", num(Some(r.r_squared), 3)),
        )?;
        row(
            f,
            pair("Model:", "OLS".to_string()),
            pair("Adj. R-squared:", num(Some(r.adj_r_squared), 3)),
        )?;
        row(
            f,
            pair("Method:", "Least Squares".to_string()),
            pair("F-statistic:", num(Some(r.f_statistic), 4)),
        )?;
        row(
            f,
            pair("Date:", self.generated.format("%a, %d %b %Y").to_string()),
            pair("Prob (F-statistic):", sci(r.f_pvalue)),
        )?;
        row(
            f,
            pair("Time:", self.generated.format("%H:%M:%S").to_string()),
            pair("Log-Likelihood:", num(Some(r.llf), 3)),
        )?;
        row(
            f,
            pair("No. Observations:", r.nobs.to_string()),
            pair("AIC:", num(Some(r.aic), 2)),
        )?;
        row(
            f,
            pair("Df Residuals:", r.df_resid.to_string()),
            pair("BIC:", num(Some(r.bic), 2)),
        )?;
        row(f, pair("Df Model:", r.df_model.to_string()), String::new())?;
        row(
            f,
            pair("Covariance Type:", "nonrobust".to_string()),
            String::new(),
        )?;
        writeln!(f, "{heavy}")?;

        writeln!(
            f,
            "{:<name_width$} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
            "", "coef", "std err", "t", "P>|t|", "[0.025", "0.975]"
        )?;
        writeln!(f, "{light}")?;
        for (j, name) in r.names().iter().enumerate() {
            writeln!(
                f,
                "{:<name_width$} {:>10.4} {:>10.3} {:>10.3} {:>10.3} {:>10.3} {:>10.3}",
                name,
                r.params[j],
                r.bse[j],
                r.tvalues[j],
                r.pvalues[j],
                r.conf_int[[j, 0]],
                r.conf_int[[j, 1]],
            )?;
        }
        writeln!(f, "{heavy}")?;

        row(
            f,
            pair("Omnibus:", num(self.omnibus.map(|t| t.statistic), 3)),
            pair("Durbin-Watson:", num(self.durbin_watson, 3)),
        )?;
        row(
            f,
            pair("Prob(Omnibus):", num(self.omnibus.map(|t| t.p_value), 3)),
            pair(
                "Jarque-Bera (JB):",
                num(self.jarque_bera.map(|t| t.statistic), 3),
            ),
        )?;
        row(
            f,
            pair("Skew:", num(self.jarque_bera.map(|t| t.skew), 3)),
            pair(
                "Prob(JB):",
                self.jarque_bera
                    .map(|t| sci(t.p_value))
                    .unwrap_or_else(|| "nan".to_string()),
            ),
        )?;
        row(
            f,
            pair("Kurtosis:", num(self.jarque_bera.map(|t| t.kurtosis), 3)),
            pair("Cond. No.", sci(r.condition_number)),
        )?;
        writeln!(f, "{heavy}")?;

        writeln!(f)?;
        writeln!(f, "Notes:")?;
        writeln!(
            f,
            "[1] Standard Errors assume that the covariance matrix of the errors is correctly specified."
        )?;
        let mut note = 2;
        if r.is_rank_deficient() {
            writeln!(
                f,
                "[{note}] The design matrix is rank deficient (rank {} of {} columns). Collinear columns: {}.",
                r.rank,
                r.design.ncols(),
                r.collinear.join(", ")
            )?;
            writeln!(f, "Coefficients are the minimum-norm least-squares solution.")?;
            note += 1;
        }
        if r.condition_number > LARGE_CONDITION_NUMBER {
            writeln!(
                f,
                "[{note}] The condition number is large, {}. This might indicate that there are",
                sci(r.condition_number)
            )?;
            writeln!(f, "strong multicollinearity or other numerical problems.")?;
        }
        Ok(())
    }
}
