use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor, Normal, StudentsT};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Invalid distribution parameters: {0}")]
pub struct DistributionError(String);

pub type Result<T> = std::result::Result<T, DistributionError>;

fn invalid(err: impl std::fmt::Display) -> DistributionError {
    DistributionError(err.to_string())
}

fn standard_normal() -> Result<Normal> {
    Normal::new(0.0, 1.0).map_err(invalid)
}

/// Survival value at the edges of the support, where the CDF routines are not needed.
fn degenerate_sf(x: f64) -> Option<f64> {
    if x.is_nan() {
        Some(f64::NAN)
    } else if x == f64::INFINITY {
        Some(0.0)
    } else {
        None
    }
}

/// Two-sided p-value of a t statistic.
pub fn students_t_two_sided(t: f64, df: f64) -> Result<f64> {
    if let Some(p) = degenerate_sf(t.abs()) {
        return Ok(p);
    }
    let dist = StudentsT::new(0.0, 1.0, df).map_err(invalid)?;
    Ok(2.0 * dist.sf(t.abs()))
}

pub fn students_t_quantile(p: f64, df: f64) -> Result<f64> {
    let dist = StudentsT::new(0.0, 1.0, df).map_err(invalid)?;
    Ok(dist.inverse_cdf(p))
}

pub fn chi_squared_sf(x: f64, df: f64) -> Result<f64> {
    if let Some(p) = degenerate_sf(x) {
        return Ok(p);
    }
    let dist = ChiSquared::new(df).map_err(invalid)?;
    Ok(dist.sf(x))
}

pub fn f_sf(x: f64, df_num: f64, df_den: f64) -> Result<f64> {
    if let Some(p) = degenerate_sf(x) {
        return Ok(p);
    }
    let dist = FisherSnedecor::new(df_num, df_den).map_err(invalid)?;
    Ok(dist.sf(x))
}

pub fn normal_cdf(x: f64) -> Result<f64> {
    Ok(standard_normal()?.cdf(x))
}

pub fn normal_sf(x: f64) -> Result<f64> {
    Ok(standard_normal()?.sf(x))
}

pub fn normal_quantile(p: f64) -> Result<f64> {
    Ok(standard_normal()?.inverse_cdf(p))
}

/// Evaluate `c[0] + c[1] x + c[2] x^2 + ...`.
pub fn poly(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_poly_horner() {
        assert_relative_eq!(poly(&[1.0, 2.0, 3.0], 2.0), 17.0);
        assert_relative_eq!(poly(&[], 2.0), 0.0);
    }

    #[test]
    fn test_reference_values() {
        assert_relative_eq!(normal_cdf(0.0).unwrap(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(normal_quantile(0.975).unwrap(), 1.959964, epsilon = 1e-5);
        // chi2(2) survival is exp(-x/2)
        assert_relative_eq!(
            chi_squared_sf(3.0, 2.0).unwrap(),
            (-1.5f64).exp(),
            epsilon = 1e-10
        );
        assert_relative_eq!(students_t_two_sided(0.0, 10.0).unwrap(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(students_t_quantile(0.975, 10.0).unwrap(), 2.228139, epsilon = 1e-5);
    }

    #[test]
    fn test_degenerate_statistics() {
        assert_eq!(students_t_two_sided(f64::INFINITY, 5.0).unwrap(), 0.0);
        assert!(students_t_two_sided(f64::NAN, 5.0).unwrap().is_nan());
        assert_eq!(f_sf(f64::INFINITY, 2.0, 5.0).unwrap(), 0.0);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(chi_squared_sf(1.0, -1.0).is_err());
        assert!(f_sf(1.0, 0.0, 5.0).is_err());
    }
}
