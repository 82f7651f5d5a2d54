use super::Cell;
use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y", "%m/%d/%Y", "%Y%m%d"];
// 9999-12-31, the last date a spreadsheet can hold
const MAX_SERIAL: f64 = 2_958_465.0;
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Granularity used to match rows between the two tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Monthly,
    Daily,
}

impl Frequency {
    pub fn normalize(self, date: NaiveDate) -> NaiveDate {
        match self {
            Frequency::Daily => date,
            Frequency::Monthly => date.with_day(1).unwrap_or(date),
        }
    }
}

/// Days since 1899-12-30, the spreadsheet epoch (accounts for the 1900 leap-year bug).
pub fn from_serial(serial: f64) -> Option<NaiveDate> {
    if !(1.0..=MAX_SERIAL).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(TimeDelta::try_days(serial.floor() as i64)?)
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.date());
        }
    }
    // Year-month only, e.g. "2021-03"
    NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d").ok()
}

/// Turn an index cell into a normalized period key.
pub fn parse_period(cell: &Cell, frequency: Frequency) -> Option<NaiveDate> {
    let date = match cell {
        Cell::Date(date) => Some(*date),
        Cell::Text(text) => parse_date(text),
        Cell::Number(serial) => {
            // 8-digit numbers read from text files are most likely YYYYMMDD
            if (19_000_101.0..=21_001_231.0).contains(serial) {
                parse_date(&format!("{}", *serial as i64))
            } else {
                from_serial(*serial)
            }
        }
        Cell::Empty => None,
    }?;
    Some(frequency.normalize(date))
}
