pub mod loader;
pub mod period;

use chrono::NaiveDate;
use ndarray::{Array1, Array2};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),
    #[error("Delimiter '{0}' is not a single ASCII character")]
    InvalidDelimiter(char),
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(PathBuf),
    #[error("Workbook {0} has no worksheets")]
    EmptyWorkbook(PathBuf),
    #[error("Missing required column: {0}")]
    MissingColumn(String),
    #[error("Missing value in column '{column}' at row {row}")]
    MissingValue { column: String, row: usize },
    #[error("Non-numeric value '{value}' in column '{column}' at row {row}")]
    NonNumeric {
        column: String,
        row: usize,
        value: String,
    },
    #[error("Cannot parse period '{value}' in column '{column}' at row {row}")]
    PeriodParse {
        column: String,
        row: usize,
        value: String,
    },
    #[error("Duplicate period {period} in {table}")]
    DuplicatePeriod { table: String, period: NaiveDate },
    #[error(
        "Periods do not match: missing from response {missing_in_response:?}, \
         missing from predictors {missing_in_predictors:?}"
    )]
    PeriodMismatch {
        missing_in_response: Vec<NaiveDate>,
        missing_in_predictors: Vec<NaiveDate>,
    },
    #[error("Row count mismatch: response has {response} rows, predictors have {predictors}")]
    RowCountMismatch { response: usize, predictors: usize },
    #[error("No observations after alignment")]
    MissingData,
}

pub type Result<T> = std::result::Result<T, DataError>;

/// A single cell as read from a delimited file or a worksheet.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
    Date(NaiveDate),
    Empty,
}

impl Cell {
    pub fn from_text(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Cell::Empty;
        }
        match raw.parse::<f64>() {
            Ok(value) => Cell::Number(value),
            Err(_) => Cell::Text(raw.to_string()),
        }
    }
}

/// Ordered rows of cells under named headers, in source order.
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows,
        }
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, column: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| DataError::MissingColumn(column.to_string()))
    }

    pub fn verify_required_columns(&self, columns: &[String]) -> Result<()> {
        for column in columns {
            self.column_index(column)?;
        }
        Ok(())
    }

    /// Extract a column as floats. Empty and non-numeric cells are errors.
    pub fn numeric_column(&self, column: &str) -> Result<Array1<f64>> {
        let idx = self.column_index(column)?;
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| match row.get(idx).unwrap_or(&Cell::Empty) {
                Cell::Number(value) => Ok(*value),
                Cell::Empty => Err(DataError::MissingValue {
                    column: column.to_string(),
                    row: i + 1,
                }),
                Cell::Text(text) => Err(DataError::NonNumeric {
                    column: column.to_string(),
                    row: i + 1,
                    value: text.clone(),
                }),
                Cell::Date(date) => Err(DataError::NonNumeric {
                    column: column.to_string(),
                    row: i + 1,
                    value: date.to_string(),
                }),
            })
            .collect()
    }

    /// Keep only the rows at `order`, in that order.
    pub fn reorder(&self, order: &[usize]) -> Table {
        Table {
            name: self.name.clone(),
            headers: self.headers.clone(),
            rows: order.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }
}

/// Observations after alignment: row i of `response` and `predictors`
/// belong to the same period.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub periods: Option<Vec<NaiveDate>>,
    pub response_name: String,
    pub response: Array1<f64>,
    pub predictor_names: Vec<String>,
    pub predictors: Array2<f64>,
}

impl Dataset {
    pub fn nobs(&self) -> usize {
        self.response.len()
    }
}
