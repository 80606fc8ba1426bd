//! Cell value parsing for spreadsheet exports.
//!
//! Parsers return `Option`: `None` always means "could not parse" and is
//! never conflated with zero. [`parse_cell`] adds the third state, a blank
//! cell, so row parsers can tell missing data from malformed data.

use chrono::{Duration, NaiveDate};

/// A parsed spreadsheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell<T> {
    Blank,
    Value(T),
    Invalid(String),
}

impl<T> Cell<T> {
    pub fn value(self) -> Option<T> {
        match self {
            Cell::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// Trims `raw` and runs `parse` unless the cell is blank.
pub fn parse_cell<T>(raw: &str, parse: impl Fn(&str) -> Option<T>) -> Cell<T> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Cell::Blank;
    }
    match parse(trimmed) {
        Some(v) => Cell::Value(v),
        None => Cell::Invalid(trimmed.to_string()),
    }
}

/// Parses a locale-formatted number or monetary amount.
///
/// - `R$`, spaces and no-break spaces are ignored; `-x` and `(x)` are negative.
/// - With both `.` and `,` present, the last one is the decimal separator.
/// - A single `,` is decimal; repeated `,` are thousands separators.
/// - Repeated `.` are thousands separators. A single `.` is decimal, except
///   in an `R$` amount where exactly three digits follow it (`R$ 1.234`).
pub fn parse_amount(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let has_currency = trimmed.contains("R$");
    let mut body: String = trimmed
        .replace("R$", "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let mut negative = false;
    if body.starts_with('(') && body.ends_with(')') && body.len() >= 2 {
        negative = true;
        body = body[1..body.len() - 1].to_string();
    }
    if let Some(rest) = body.strip_prefix('-') {
        negative = !negative;
        body = rest.to_string();
    }

    if !body.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    if body.contains(['e', 'E']) && !body.contains(',') {
        return body.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| sign(v, negative));
    }

    if !body.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',') {
        return None;
    }

    let dots = body.matches('.').count();
    let commas = body.matches(',').count();

    let normalized = match (dots, commas) {
        (0, 0) => body,
        (d, c) if d > 0 && c > 0 => {
            let last_dot = body.rfind('.')?;
            let last_comma = body.rfind(',')?;
            if last_comma > last_dot {
                if c > 1 {
                    return None;
                }
                body.replace('.', "").replace(',', ".")
            } else {
                if d > 1 {
                    return None;
                }
                body.replace(',', "")
            }
        }
        (0, 1) => body.replace(',', "."),
        (0, _) => body.replace(',', ""),
        (1, 0) => {
            let decimals = body.len() - body.find('.')? - 1;
            if has_currency && decimals == 3 {
                body.replace('.', "")
            } else {
                body
            }
        }
        _ => body.replace('.', ""),
    };

    normalized
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| sign(v, negative))
}

fn sign(v: f64, negative: bool) -> f64 {
    if negative { -v } else { v }
}

/// Parses a latitude/longitude, rejecting values outside `[-limit, limit]`.
pub fn parse_coordinate(raw: &str, limit: f64) -> Option<f64> {
    parse_amount(raw).filter(|v| v.abs() <= limit)
}

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d", "%d.%m.%Y"];

// Excel serials in this window cover 1954..2119; smaller integers are far
// more likely to be years or counts than dates.
const EXCEL_SERIAL_MIN: f64 = 20_000.0;
const EXCEL_SERIAL_MAX: f64 = 80_000.0;

/// Parses a date, accepting ISO and `dd/mm/yyyy` styles with an optional
/// time part, and Excel serial day numbers.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    let date_part = s.split(|c| c == ' ' || c == 'T').next().unwrap_or(s);

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(date_part, fmt) {
            return Some(d);
        }
    }

    let serial = s.parse::<f64>().ok()?;
    if (EXCEL_SERIAL_MIN..=EXCEL_SERIAL_MAX).contains(&serial) {
        return excel_serial_to_date(serial);
    }
    None
}

/// Converts an Excel 1900-system serial to a date (fractional time dropped).
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.floor() as i64))
}
