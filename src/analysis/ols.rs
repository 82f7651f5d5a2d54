use super::design::{DesignError, DesignMatrix, RegressionInput};
use super::distributions::{self, DistributionError};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use ndarray_linalg::{Diag, Eigh, SolveTriangular, QR, SVD, UPLO};
use ndarray_stats::QuantileExt;
use std::f64::consts::PI;
use thiserror::Error;
use tracing::{debug, warn};

/// Smallest admissible |R_jj| of the QR factor of the column-normalized design.
pub const RANK_TOLERANCE: f64 = 1e-10;

#[derive(Debug, Error)]
pub enum OlsError {
    #[error("Linear algebra error: {0}")]
    LinAlgError(#[from] ndarray_linalg::error::LinalgError),
    #[error(transparent)]
    Design(#[from] DesignError),
    #[error(transparent)]
    Distribution(#[from] DistributionError),
    #[error("Response has {response} observations, design matrix has {design}")]
    DimensionMismatch { response: usize, design: usize },
    #[error("{nobs} observations are not enough to estimate {params} parameters")]
    InsufficientObservations { nobs: usize, params: usize },
    #[error("Design matrix is rank deficient: column '{name}' (index {index}) is collinear with earlier columns")]
    RankDeficient { index: usize, name: String },
    #[error("SVD returned no singular vectors")]
    MissingSingularVectors,
}

pub type Result<T> = std::result::Result<T, OlsError>;

/// Bare least-squares solution, without inference.
#[derive(Debug, Clone)]
pub struct LeastSquares {
    pub coefficients: Array1<f64>,
    pub residuals: Array1<f64>,
    /// (X'X)^-1
    pub normalized_cov: Array2<f64>,
}

impl LeastSquares {
    pub fn ssr(&self) -> f64 {
        self.residuals.dot(&self.residuals)
    }
}

/// Solve `min ||y - X b||^2` through a QR factorization of the
/// column-normalized design. Collinear columns are reported, never absorbed.
pub fn least_squares(x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<LeastSquares> {
    let (n_obs, k) = x.dim();
    if y.len() != n_obs {
        return Err(OlsError::DimensionMismatch {
            response: y.len(),
            design: n_obs,
        });
    }
    if n_obs < k || k == 0 {
        return Err(OlsError::InsufficientObservations {
            nobs: n_obs,
            params: k,
        });
    }

    let norms: Array1<f64> = x
        .columns()
        .into_iter()
        .map(|col| col.dot(&col).sqrt())
        .collect();
    if let Some(index) = norms.iter().position(|&norm| norm == 0.0) {
        return Err(rank_deficient(index));
    }
    let scaled = &x / &norms;

    let (q, r) = scaled.qr()?;
    if let Some(index) = (0..k).find(|&j| r[[j, j]].abs() < RANK_TOLERANCE) {
        return Err(rank_deficient(index));
    }

    let qty = q.t().dot(&y);
    let scaled_coefficients = r.solve_triangular(UPLO::Upper, Diag::NonUnit, &qty)?;
    let coefficients = &scaled_coefficients / &norms;
    let residuals = &y - &x.dot(&coefficients);

    // (X'X)^-1 = D^-1 R^-1 R^-T D^-1 with D = diag(norms)
    let r_inv = r.solve_triangular(UPLO::Upper, Diag::NonUnit, &Array2::<f64>::eye(k))?;
    let mut normalized_cov = r_inv.dot(&r_inv.t());
    for ((i, j), value) in normalized_cov.indexed_iter_mut() {
        *value /= norms[i] * norms[j];
    }

    Ok(LeastSquares {
        coefficients,
        residuals,
        normalized_cov,
    })
}

/// Minimum-norm least squares through an SVD of the column-normalized
/// design, for designs that may be rank deficient. All-zero columns get a
/// zero coefficient and zero variance. Returns the solution and the rank.
pub fn minimum_norm_least_squares(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
) -> Result<(LeastSquares, usize)> {
    let (n_obs, k) = x.dim();
    if y.len() != n_obs {
        return Err(OlsError::DimensionMismatch {
            response: y.len(),
            design: n_obs,
        });
    }

    let norms: Vec<f64> = x
        .columns()
        .into_iter()
        .map(|col| col.dot(&col).sqrt())
        .collect();
    let active: Vec<usize> = (0..k).filter(|&j| norms[j] > 0.0).collect();

    let mut coefficients = Array1::<f64>::zeros(k);
    let mut normalized_cov = Array2::<f64>::zeros((k, k));
    let mut rank = 0;

    if !active.is_empty() {
        let scale: Array1<f64> = active.iter().map(|&j| norms[j]).collect();
        let scaled = &x.select(Axis(1), &active) / &scale;
        let (u, s, vt) = match scaled.svd(true, true)? {
            (Some(u), s, Some(vt)) => (u, s, vt),
            _ => return Err(OlsError::MissingSingularVectors),
        };

        let largest = s.iter().copied().fold(0.0, f64::max);
        rank = s.iter().filter(|&&v| v > RANK_TOLERANCE * largest).count();

        let m = active.len();
        let mut beta = Array1::<f64>::zeros(m);
        let mut cov = Array2::<f64>::zeros((m, m));
        for i in 0..rank {
            let v = vt.row(i);
            beta.scaled_add(u.column(i).dot(&y) / s[i], &v);
            let inv_sq = 1.0 / (s[i] * s[i]);
            for a in 0..m {
                for b in 0..m {
                    cov[[a, b]] += v[a] * v[b] * inv_sq;
                }
            }
        }

        for (a, &j) in active.iter().enumerate() {
            coefficients[j] = beta[a] / scale[a];
            for (b, &l) in active.iter().enumerate() {
                normalized_cov[[j, l]] = cov[[a, b]] / (scale[a] * scale[b]);
            }
        }
    }

    let residuals = &y - &x.dot(&coefficients);
    Ok((
        LeastSquares {
            coefficients,
            residuals,
            normalized_cov,
        },
        rank,
    ))
}

fn rank_deficient(index: usize) -> OlsError {
    OlsError::RankDeficient {
        index,
        name: format!("x{index}"),
    }
}

/// Gaussian log-likelihood of a least-squares fit at the ML variance.
pub fn log_likelihood(ssr: f64, nobs: usize) -> f64 {
    let n = nobs as f64;
    -n / 2.0 * ((2.0 * PI).ln() + (ssr / n).ln() + 1.0)
}

/// A fitted ordinary-least-squares model.
#[derive(Debug, Clone)]
pub struct OlsResults {
    pub response_name: String,
    pub design: DesignMatrix,
    pub response: Array1<f64>,
    pub nobs: usize,
    pub k_constant: usize,
    pub df_model: usize,
    pub df_resid: usize,
    /// Numerical rank of the design; below the column count when collinear.
    pub rank: usize,
    /// Columns that are linear combinations of the columns before them.
    pub collinear: Vec<String>,
    pub params: Array1<f64>,
    pub bse: Array1<f64>,
    pub tvalues: Array1<f64>,
    pub pvalues: Array1<f64>,
    /// Lower and upper bounds of the 95% confidence interval, one row per parameter.
    pub conf_int: Array2<f64>,
    pub fitted_values: Array1<f64>,
    pub resid: Array1<f64>,
    pub normalized_cov: Array2<f64>,
    pub scale: f64,
    pub ssr: f64,
    pub ess: f64,
    pub tss: f64,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub f_statistic: f64,
    pub f_pvalue: f64,
    pub llf: f64,
    pub aic: f64,
    pub bic: f64,
    pub condition_number: f64,
}

pub struct Ols;

impl Ols {
    pub fn fit(input: &RegressionInput) -> Result<OlsResults> {
        let design = &input.design;
        let y = &input.response;
        let nobs = design.nrows();
        let k = design.ncols();

        if y.len() != nobs {
            return Err(OlsError::DimensionMismatch {
                response: y.len(),
                design: nobs,
            });
        }
        if nobs <= k {
            return Err(OlsError::InsufficientObservations { nobs, params: k });
        }

        let (solution, rank, collinear) = match least_squares(design.view(), y.view()) {
            Ok(solution) => (solution, k, Vec::new()),
            Err(OlsError::RankDeficient { .. }) => {
                let (solution, rank) = minimum_norm_least_squares(design.view(), y.view())?;
                let collinear: Vec<String> = design
                    .dependent_columns(RANK_TOLERANCE)
                    .into_iter()
                    .map(|j| design.names()[j].clone())
                    .collect();
                warn!(
                    rank,
                    columns = k,
                    collinear = ?collinear,
                    "design matrix is rank deficient, using the minimum-norm solution"
                );
                (solution, rank, collinear)
            }
            Err(err) => return Err(err),
        };

        let k_constant = design.k_constant().min(1);
        let df_model = rank.saturating_sub(k_constant);
        let df_resid = nobs - rank;
        let df = df_resid as f64;

        let resid = solution.residuals.clone();
        let fitted_values = y - &resid;
        let ssr = solution.ssr();
        let scale = ssr / df;

        let bse = solution.normalized_cov.diag().mapv(|v| (v * scale).sqrt());
        let params = solution.coefficients.clone();
        let tvalues = &params / &bse;
        let pvalues = tvalues
            .iter()
            .map(|&t| distributions::students_t_two_sided(t, df))
            .collect::<std::result::Result<Array1<f64>, _>>()?;

        let t_crit = distributions::students_t_quantile(0.975, df)?;
        let mut conf_int = Array2::zeros((k, 2));
        for j in 0..k {
            conf_int[[j, 0]] = params[j] - t_crit * bse[j];
            conf_int[[j, 1]] = params[j] + t_crit * bse[j];
        }

        let tss = if k_constant > 0 {
            let mean = y.mean().unwrap_or(0.0);
            y.iter().map(|&v| (v - mean).powi(2)).sum::<f64>()
        } else {
            y.dot(y)
        };
        let ess = tss - ssr;
        let r_squared = 1.0 - ssr / tss;
        let adj_r_squared = 1.0 - (nobs - k_constant) as f64 / df * (1.0 - r_squared);

        let (f_statistic, f_pvalue) = if df_model > 0 {
            let f = (ess / df_model as f64) / (ssr / df);
            (f, distributions::f_sf(f, df_model as f64, df)?)
        } else {
            (f64::NAN, f64::NAN)
        };

        let llf = log_likelihood(ssr, nobs);
        let aic = -2.0 * llf + 2.0 * rank as f64;
        let bic = -2.0 * llf + (nobs as f64).ln() * rank as f64;
        let condition_number = condition_number(design.view())?;

        debug!(
            nobs,
            df_model,
            df_resid,
            r_squared,
            condition_number,
            "fitted OLS model"
        );

        Ok(OlsResults {
            response_name: input.response_name.clone(),
            design: design.clone(),
            response: y.clone(),
            nobs,
            k_constant,
            df_model,
            df_resid,
            rank,
            collinear,
            params,
            bse,
            tvalues,
            pvalues,
            conf_int,
            fitted_values,
            resid,
            normalized_cov: solution.normalized_cov,
            scale,
            ssr,
            ess,
            tss,
            r_squared,
            adj_r_squared,
            f_statistic,
            f_pvalue,
            llf,
            aic,
            bic,
            condition_number,
        })
    }
}

impl OlsResults {
    pub fn names(&self) -> &[String] {
        self.design.names()
    }

    pub fn is_rank_deficient(&self) -> bool {
        self.rank < self.design.ncols()
    }

    /// Coefficient of a named regressor.
    pub fn param(&self, name: &str) -> Option<f64> {
        self.names()
            .iter()
            .position(|n| n == name)
            .map(|j| self.params[j])
    }

    pub fn predict(&self, exog: ArrayView2<f64>) -> Array1<f64> {
        exog.dot(&self.params)
    }
}

/// sqrt(largest / smallest eigenvalue) of X'X; infinite for singular X'X.
pub fn condition_number(x: ArrayView2<f64>) -> Result<f64> {
    let xtx = x.t().dot(&x);
    let (eigvals, _) = xtx.eigh(UPLO::Upper)?;
    let largest = *eigvals.max_skipnan();
    let smallest = *eigvals.min_skipnan();
    if smallest <= 0.0 {
        return Ok(f64::INFINITY);
    }
    Ok((largest / smallest).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_least_squares_simple_line() {
        // y = 1 + 2x with symmetric errors (+0.1, -0.1, -0.1, +0.1)
        let x = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0]];
        let y = array![1.1, 2.9, 4.9, 7.1];
        let fit = least_squares(x.view(), y.view()).unwrap();

        assert_relative_eq!(fit.coefficients[0], 1.0, epsilon = 1e-10);
        assert_relative_eq!(fit.coefficients[1], 2.0, epsilon = 1e-10);
        assert_relative_eq!(fit.ssr(), 0.04, epsilon = 1e-10);
        // (X'X)^-1 for x = 0..3: [[7/10, -3/10], [-3/10, 1/5]]
        assert_relative_eq!(fit.normalized_cov[[0, 0]], 0.7, epsilon = 1e-10);
        assert_relative_eq!(fit.normalized_cov[[0, 1]], -0.3, epsilon = 1e-10);
        assert_relative_eq!(fit.normalized_cov[[1, 1]], 0.2, epsilon = 1e-10);
    }

    #[test]
    fn test_zero_column_is_rank_deficient() {
        let x = array![[1.0, 0.0], [1.0, 0.0], [1.0, 0.0]];
        let y = array![1.0, 2.0, 3.0];
        let err = least_squares(x.view(), y.view()).unwrap_err();
        assert!(matches!(err, OlsError::RankDeficient { index: 1, .. }));
    }

    #[test]
    fn test_minimum_norm_zeroes_empty_column() {
        // y = 1 + 2x, middle column all zeros
        let x = array![[1.0, 0.0, 1.0], [1.0, 0.0, 2.0], [1.0, 0.0, 3.0], [1.0, 0.0, 5.0]];
        let y = array![3.0, 5.0, 7.0, 11.0];
        let (fit, rank) = minimum_norm_least_squares(x.view(), y.view()).unwrap();

        assert_eq!(rank, 2);
        assert_relative_eq!(fit.coefficients[0], 1.0, epsilon = 1e-10);
        assert_eq!(fit.coefficients[1], 0.0);
        assert_relative_eq!(fit.coefficients[2], 2.0, epsilon = 1e-10);
        assert!(fit.normalized_cov.row(1).iter().all(|&v| v == 0.0));
        assert!(fit.ssr() < 1e-20);
    }

    #[test]
    fn test_minimum_norm_splits_duplicated_column() {
        let x = array![[1.0, 1.0, 1.0], [1.0, 2.0, 2.0], [1.0, 4.0, 4.0], [1.0, 7.0, 7.0]];
        let y = array![2.0, 3.0, 5.0, 8.0];
        let (fit, rank) = minimum_norm_least_squares(x.view(), y.view()).unwrap();

        assert_eq!(rank, 2);
        assert_relative_eq!(fit.coefficients[0], 1.0, epsilon = 1e-10);
        assert_relative_eq!(fit.coefficients[1], 0.5, epsilon = 1e-10);
        assert_relative_eq!(fit.coefficients[2], 0.5, epsilon = 1e-10);
    }

    #[test]
    fn test_log_likelihood_matches_formula() {
        let llf = log_likelihood(4.0, 4);
        let expected = -2.0 * ((2.0 * PI).ln() + 1.0);
        assert_relative_eq!(llf, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_condition_number_of_orthogonal_design() {
        let x = array![[1.0, 1.0], [1.0, -1.0], [1.0, 1.0], [1.0, -1.0]];
        assert_relative_eq!(condition_number(x.view()).unwrap(), 1.0, epsilon = 1e-10);
    }
}
