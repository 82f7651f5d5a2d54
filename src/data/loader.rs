use super::period::{from_serial, parse_date, parse_period, Frequency};
use super::{Cell, DataError, Dataset, Result, Table};
use crate::config::{AlignmentConfig, PredictorConfig, ResponseConfig};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where a table lives and how to read it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSource {
    pub path: PathBuf,
    /// Worksheet to read from a workbook; the first sheet when absent.
    #[serde(default)]
    pub sheet: Option<String>,
    /// Field separator for delimited files; tab for `.tsv`, comma otherwise.
    #[serde(default)]
    pub delimiter: Option<char>,
}

impl TableSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sheet: None,
            delimiter: None,
        }
    }

    /// Separator byte handed to the CSV reader.
    pub fn delimiter_byte(&self) -> Result<u8> {
        let delimiter = self.delimiter.unwrap_or_else(|| {
            match self.path.extension().and_then(|e| e.to_str()) {
                Some(ext) if ext.eq_ignore_ascii_case("tsv") => '\t',
                _ => ',',
            }
        });
        if delimiter.is_ascii() {
            Ok(delimiter as u8)
        } else {
            Err(DataError::InvalidDelimiter(delimiter))
        }
    }
}

enum Format {
    Delimited,
    Spreadsheet,
}

fn detect_format(path: &Path) -> Result<Format> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" | "txt" | "tsv" => Ok(Format::Delimited),
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(Format::Spreadsheet),
        _ => Err(DataError::UnsupportedFormat(path.to_path_buf())),
    }
}

pub struct DataLoader;

impl DataLoader {
    /// Load a table from a delimited file or a workbook, chosen by extension.
    pub fn load_table(source: &TableSource) -> Result<Table> {
        let table = match detect_format(&source.path)? {
            Format::Delimited => Self::read_delimited(&source.path, source.delimiter_byte()?)?,
            Format::Spreadsheet => Self::read_spreadsheet(&source.path, source.sheet.as_deref())?,
        };
        info!(
            path = %source.path.display(),
            rows = table.nrows(),
            columns = table.headers.len(),
            "loaded table"
        );
        Ok(table)
    }

    fn read_delimited(path: &Path, delimiter: u8) -> Result<Table> {
        if !path.exists() {
            return Err(DataError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
            });
        }
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let headers: Vec<String> = rdr.headers()?.iter().map(|s| s.to_string()).collect();
        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result?;
            rows.push(record.iter().map(Cell::from_text).collect());
        }

        Ok(Table::new(path.display().to_string(), headers, rows))
    }

    fn read_spreadsheet(path: &Path, sheet: Option<&str>) -> Result<Table> {
        let mut workbook = open_workbook_auto(path)?;
        let sheet_name = match sheet {
            Some(name) => name.to_string(),
            None => workbook
                .sheet_names()
                .first()
                .cloned()
                .ok_or_else(|| DataError::EmptyWorkbook(path.to_path_buf()))?,
        };
        debug!(sheet = %sheet_name, "reading worksheet");
        let range = workbook.worksheet_range(&sheet_name)?;

        let mut rows = range.rows();
        let headers: Vec<String> = rows
            .next()
            .map(|header| header.iter().map(|c| c.to_string().trim().to_string()).collect())
            .unwrap_or_default();
        let rows: Vec<Vec<Cell>> = rows
            .filter(|row| row.iter().any(|c| !matches!(c, Data::Empty)))
            .map(|row| row.iter().map(convert_cell).collect())
            .collect();

        Ok(Table::new(
            format!("{}[{}]", path.display(), sheet_name),
            headers,
            rows,
        ))
    }

    /// Read both tables and build the aligned dataset.
    pub fn load_dataset(
        response: &ResponseConfig,
        predictors: &PredictorConfig,
        alignment: &AlignmentConfig,
    ) -> Result<Dataset> {
        let response_table = Self::load_table(&response.source)?;
        let predictor_table = Self::load_table(&predictors.source)?;
        Self::align(
            &response_table,
            &response.column,
            &predictor_table,
            &predictors.columns,
            alignment.time_index.as_deref(),
            alignment.frequency,
        )
    }

    /// Match response rows to predictor rows.
    ///
    /// With a time index both tables are joined on their normalized periods,
    /// which must be identical sets; without one the tables are matched by
    /// position and must have the same number of rows.
    pub fn align(
        response: &Table,
        response_column: &str,
        predictors: &Table,
        predictor_columns: &[String],
        time_index: Option<&str>,
        frequency: Frequency,
    ) -> Result<Dataset> {
        response.verify_required_columns(&[response_column.to_string()])?;
        predictors.verify_required_columns(predictor_columns)?;

        let (response, predictors, periods) = match time_index {
            Some(index) => {
                let (response_periods, response_order) =
                    Self::period_order(response, index, frequency)?;
                let (predictor_periods, predictor_order) =
                    Self::period_order(predictors, index, frequency)?;
                Self::verify_same_periods(&response_periods, &predictor_periods)?;
                debug!(periods = response_periods.len(), "joined tables on time index");
                (
                    response.reorder(&response_order),
                    predictors.reorder(&predictor_order),
                    Some(response_periods),
                )
            }
            None => {
                if response.nrows() != predictors.nrows() {
                    return Err(DataError::RowCountMismatch {
                        response: response.nrows(),
                        predictors: predictors.nrows(),
                    });
                }
                (response.clone(), predictors.clone(), None)
            }
        };

        if response.nrows() == 0 {
            return Err(DataError::MissingData);
        }

        let y = response.numeric_column(response_column)?;
        let mut x = Array2::<f64>::zeros((predictors.nrows(), predictor_columns.len()));
        for (j, column) in predictor_columns.iter().enumerate() {
            x.index_axis_mut(Axis(1), j)
                .assign(&predictors.numeric_column(column)?);
        }

        Ok(Dataset {
            periods,
            response_name: response_column.to_string(),
            response: y,
            predictor_names: predictor_columns.to_vec(),
            predictors: x,
        })
    }

    /// Parse the index column and return the sorted periods with the row
    /// order that produces them.
    fn period_order(
        table: &Table,
        column: &str,
        frequency: Frequency,
    ) -> Result<(Vec<NaiveDate>, Vec<usize>)> {
        let idx = table.column_index(column)?;
        let mut keyed = Vec::with_capacity(table.nrows());
        for (i, row) in table.rows.iter().enumerate() {
            let cell = row.get(idx).unwrap_or(&Cell::Empty);
            let period = parse_period(cell, frequency).ok_or_else(|| DataError::PeriodParse {
                column: column.to_string(),
                row: i + 1,
                value: cell_text(cell),
            })?;
            keyed.push((period, i));
        }
        keyed.sort();

        for pair in keyed.windows(2) {
            if pair[0].0 == pair[1].0 {
                return Err(DataError::DuplicatePeriod {
                    table: table.name.clone(),
                    period: pair[0].0,
                });
            }
        }

        Ok(keyed.into_iter().unzip())
    }

    fn verify_same_periods(response: &[NaiveDate], predictors: &[NaiveDate]) -> Result<()> {
        if response == predictors {
            return Ok(());
        }
        let response_set: BTreeSet<_> = response.iter().copied().collect();
        let predictor_set: BTreeSet<_> = predictors.iter().copied().collect();
        Err(DataError::PeriodMismatch {
            missing_in_response: predictor_set.difference(&response_set).copied().collect(),
            missing_in_predictors: response_set.difference(&predictor_set).copied().collect(),
        })
    }
}

fn convert_cell(cell: &Data) -> Cell {
    match cell {
        Data::Int(value) => Cell::Number(*value as f64),
        Data::Float(value) => Cell::Number(*value),
        Data::String(text) => Cell::from_text(text),
        Data::DateTime(dt) => from_serial(dt.as_f64())
            .map(Cell::Date)
            .unwrap_or(Cell::Empty),
        Data::DateTimeIso(text) => parse_date(text)
            .map(Cell::Date)
            .unwrap_or_else(|| Cell::Text(text.clone())),
        Data::Empty => Cell::Empty,
        other => Cell::Text(other.to_string()),
    }
}

fn cell_text(cell: &Cell) -> String {
    match cell {
        Cell::Number(value) => value.to_string(),
        Cell::Text(text) => text.clone(),
        Cell::Date(date) => date.to_string(),
        Cell::Empty => String::new(),
    }
}
