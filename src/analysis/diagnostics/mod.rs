pub mod adf;
pub mod durbin_watson;
pub mod normality;
pub mod shapiro;
pub mod white;

pub use adf::{adfuller, AdfRegression, AdfSettings, AdfTest, Autolag, CriticalValues};
pub use durbin_watson::durbin_watson;
pub use normality::{jarque_bera, omnibus, NormalityTest};
pub use shapiro::{shapiro_wilk, ShapiroWilk};
pub use white::{het_white, WhiteTest};

use super::distributions::DistributionError;
use super::ols::{OlsError, OlsResults};
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum DiagnosticError {
    #[error("{test} needs at least {required} observations, got {actual}")]
    InsufficientObservations {
        test: &'static str,
        required: usize,
        actual: usize,
    },
    #[error("Degenerate input: {0}")]
    Degenerate(String),
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),
    #[error("Auxiliary regression failed: {0}")]
    Regression(#[from] OlsError),
    #[error(transparent)]
    Distribution(#[from] DistributionError),
}

pub type Result<T> = std::result::Result<T, DiagnosticError>;

/// Outcome of the four residual tests. Each test is evaluated on its own, so
/// one failure leaves the others intact.
#[derive(Debug)]
pub struct DiagnosticReport {
    pub white: Result<WhiteTest>,
    pub durbin_watson: Result<f64>,
    pub shapiro_wilk: Result<ShapiroWilk>,
    pub adf: Result<AdfTest>,
}

impl DiagnosticReport {
    pub fn failures(&self) -> usize {
        [
            self.white.is_err(),
            self.durbin_watson.is_err(),
            self.shapiro_wilk.is_err(),
            self.adf.is_err(),
        ]
        .iter()
        .filter(|&&failed| failed)
        .count()
    }
}

#[derive(Debug, Default)]
pub struct DiagnosticsRunner {
    adf: AdfSettings,
}

impl DiagnosticsRunner {
    pub fn new(adf: AdfSettings) -> Self {
        Self { adf }
    }

    pub fn run(&self, results: &OlsResults) -> DiagnosticReport {
        let resid = results.resid.view();

        let report = DiagnosticReport {
            white: logged("White", || het_white(resid, &results.design)),
            durbin_watson: logged("Durbin-Watson", || durbin_watson(resid)),
            shapiro_wilk: logged("Shapiro-Wilk", || shapiro_wilk(resid)),
            adf: logged("ADF", || adfuller(resid, &self.adf)),
        };
        info!(failures = report.failures(), "residual diagnostics complete");
        report
    }
}

fn logged<T>(test: &str, run: impl FnOnce() -> Result<T>) -> Result<T> {
    let outcome = run();
    if let Err(err) = &outcome {
        warn!(test, error = %err, "diagnostic test failed");
    }
    outcome
}

impl fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.white {
            Ok(test) => writeln!(f, "White’s test p-value: {}", test.lm_pvalue)?,
            Err(err) => writeln!(f, "White’s test failed: {err}")?,
        }
        match &self.durbin_watson {
            Ok(stat) => writeln!(f, "Durbin-Watson statistic: {stat}")?,
            Err(err) => writeln!(f, "Durbin-Watson statistic failed: {err}")?,
        }
        match &self.shapiro_wilk {
            Ok(test) => writeln!(f, "Shapiro-Wilk test p-value: {}", test.p_value)?,
            Err(err) => writeln!(f, "Shapiro-Wilk test failed: {err}")?,
        }
        match &self.adf {
            Ok(test) => writeln!(f, "ADF test p-value: {}", test.p_value)?,
            Err(err) => writeln!(f, "ADF test failed: {err}")?,
        }
        Ok(())
    }
}
