use crate::data::Dataset;
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};
use thiserror::Error;

pub const CONSTANT: &str = "const";

#[derive(Debug, Error)]
pub enum DesignError {
    #[error("Expected {expected} column names, got {actual}")]
    NameCount { expected: usize, actual: usize },
    #[error("Response has {response} observations, design matrix has {design}")]
    LengthMismatch { response: usize, design: usize },
}

pub type Result<T> = std::result::Result<T, DesignError>;

/// Named regressor columns, one row per observation.
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    names: Vec<String>,
    data: Array2<f64>,
}

impl DesignMatrix {
    pub fn new(names: Vec<String>, data: Array2<f64>) -> Result<Self> {
        if names.len() != data.ncols() {
            return Err(DesignError::NameCount {
                expected: data.ncols(),
                actual: names.len(),
            });
        }
        Ok(Self { names, data })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn view(&self) -> ArrayView2<f64> {
        self.data.view()
    }

    pub fn column(&self, j: usize) -> ArrayView1<f64> {
        self.data.column(j)
    }

    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    /// Prepend a column of ones named `const`.
    pub fn with_constant(&self) -> Self {
        let n_obs = self.nrows();
        let mut data = Array2::ones((n_obs, self.ncols() + 1));
        data.slice_mut(s![.., 1..]).assign(&self.data);

        let mut names = Vec::with_capacity(self.names.len() + 1);
        names.push(CONSTANT.to_string());
        names.extend(self.names.iter().cloned());
        Self { names, data }
    }

    /// Number of columns that hold a single non-zero value.
    pub fn k_constant(&self) -> usize {
        self.data
            .columns()
            .into_iter()
            .filter(|col| is_constant(col))
            .count()
    }

    pub fn select(&self, columns: &[usize]) -> Self {
        Self {
            names: columns.iter().map(|&j| self.names[j].clone()).collect(),
            data: self.data.select(Axis(1), columns),
        }
    }

    /// Products `x_i * x_j` for every `i <= j`. With a constant column this
    /// covers the levels, their squares and all interactions.
    pub fn cross_products(&self) -> Self {
        let k = self.ncols();
        let mut names = Vec::with_capacity(k * (k + 1) / 2);
        let mut columns = Vec::with_capacity(k * (k + 1) / 2);

        for i in 0..k {
            for j in i..k {
                let product = &self.data.column(i) * &self.data.column(j);
                columns.push(product);
                names.push(product_name(&self.names[i], &self.names[j]));
            }
        }

        let mut data = Array2::zeros((self.nrows(), columns.len()));
        for (j, column) in columns.iter().enumerate() {
            data.column_mut(j).assign(column);
        }
        Self { names, data }
    }

    /// Drop columns that are linear combinations of earlier ones.
    ///
    /// Columns are normalized and orthogonalized in order (Gram-Schmidt, two
    /// passes); a column whose remainder has norm below `tolerance` is dropped.
    pub fn independent_columns(&self, tolerance: f64) -> Self {
        self.select(&self.independent_indices(tolerance))
    }

    /// Indices of the columns `independent_columns` would drop, all-zero
    /// columns included.
    pub fn dependent_columns(&self, tolerance: f64) -> Vec<usize> {
        let kept = self.independent_indices(tolerance);
        (0..self.ncols()).filter(|j| !kept.contains(j)).collect()
    }

    fn independent_indices(&self, tolerance: f64) -> Vec<usize> {
        let mut basis: Vec<Array1<f64>> = Vec::new();
        let mut kept = Vec::new();

        for (j, column) in self.data.columns().into_iter().enumerate() {
            let norm = column.dot(&column).sqrt();
            if norm == 0.0 {
                continue;
            }
            let mut current = column.to_owned() / norm;
            for _ in 0..2 {
                for prev in &basis {
                    let proj = project(&current.view(), &prev.view());
                    current = &current - &proj;
                }
            }
            let remainder = current.dot(&current).sqrt();
            if remainder > tolerance {
                basis.push(current / remainder);
                kept.push(j);
            }
        }

        kept
    }
}

fn product_name(a: &str, b: &str) -> String {
    match (a, b) {
        (CONSTANT, CONSTANT) => CONSTANT.to_string(),
        (CONSTANT, other) | (other, CONSTANT) => other.to_string(),
        (a, b) if a == b => format!("{a}^2"),
        (a, b) => format!("{a}*{b}"),
    }
}

fn project(v: &ArrayView1<f64>, u: &ArrayView1<f64>) -> Array1<f64> {
    let dot = v.dot(u);
    let norm_sq = u.dot(u);
    if norm_sq > 0.0 {
        u * (dot / norm_sq)
    } else {
        Array1::zeros(v.len())
    }
}

fn is_constant(column: &ArrayView1<f64>) -> bool {
    match column.get(0) {
        Some(&first) => first != 0.0 && column.iter().all(|&x| x == first),
        None => false,
    }
}

/// Response vector and design matrix ready for estimation.
#[derive(Debug, Clone)]
pub struct RegressionInput {
    pub response_name: String,
    pub response: Array1<f64>,
    pub design: DesignMatrix,
}

pub struct ModelBuilder;

impl ModelBuilder {
    /// Use every predictor of the dataset, with an intercept in front.
    pub fn build(dataset: &Dataset) -> Result<RegressionInput> {
        let design = DesignMatrix::new(
            dataset.predictor_names.clone(),
            dataset.predictors.clone(),
        )?
        .with_constant();
        Self::from_parts(&dataset.response_name, dataset.response.clone(), design)
    }

    pub fn from_parts(
        response_name: &str,
        response: Array1<f64>,
        design: DesignMatrix,
    ) -> Result<RegressionInput> {
        if response.len() != design.nrows() {
            return Err(DesignError::LengthMismatch {
                response: response.len(),
                design: design.nrows(),
            });
        }
        Ok(RegressionInput {
            response_name: response_name.to_string(),
            response,
            design,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn design() -> DesignMatrix {
        DesignMatrix::new(
            vec!["a".into(), "b".into()],
            array![[1.0, 2.0], [2.0, 1.0], [3.0, 5.0], [4.0, 3.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_with_constant_prepends_ones() {
        let x = design().with_constant();
        assert_eq!(x.names(), &["const", "a", "b"]);
        assert_eq!(x.column(0).to_vec(), vec![1.0; 4]);
        assert_eq!(x.column(2).to_vec(), vec![2.0, 1.0, 5.0, 3.0]);
        assert_eq!(x.k_constant(), 1);
    }

    #[test]
    fn test_cross_products_layout() {
        let x = design().with_constant().cross_products();
        assert_eq!(
            x.names(),
            &["const", "a", "b", "a^2", "a*b", "b^2"]
        );
        assert_eq!(x.column(4).to_vec(), vec![2.0, 2.0, 15.0, 12.0]);
    }

    #[test]
    fn test_independent_columns_drops_duplicates() {
        let x = DesignMatrix::new(
            vec!["a".into(), "a2".into(), "b".into(), "zero".into()],
            array![
                [1.0, 2.0, 2.0, 0.0],
                [2.0, 4.0, 1.0, 0.0],
                [3.0, 6.0, 5.0, 0.0],
                [4.0, 8.0, 3.0, 0.0]
            ],
        )
        .unwrap();
        let kept = x.independent_columns(1e-8);
        assert_eq!(kept.names(), &["a", "b"]);
        assert_eq!(x.dependent_columns(1e-8), vec![1, 3]);
    }

    #[test]
    fn test_length_mismatch() {
        let err = ModelBuilder::from_parts("y", array![1.0, 2.0], design()).unwrap_err();
        assert!(matches!(
            err,
            DesignError::LengthMismatch {
                response: 2,
                design: 4
            }
        ));
    }
}
