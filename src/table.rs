//! In-memory tables decoded from CSV or XLSX bytes.

use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};
use chrono::Duration;

use crate::error::{PipelineError, Result};
use crate::parser::excel_serial_to_date;
use crate::source::SourceFormat;

/// A decoded sheet: header row plus data rows as trimmed strings.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// 1-based line in the source, header included.
    pub line: usize,
    pub cells: Vec<String>,
}

impl Row {
    /// Cell at `index`, or `""` when the column is absent or the row is short.
    pub fn get(&self, index: Option<usize>) -> &str {
        index
            .and_then(|i| self.cells.get(i))
            .map(String::as_str)
            .unwrap_or("")
    }

    fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.trim().is_empty())
    }
}

impl Table {
    pub fn decode(name: &str, format: SourceFormat, bytes: &[u8]) -> Result<Self> {
        match format {
            SourceFormat::Csv => Self::from_csv_bytes(name, bytes),
            SourceFormat::Xlsx => Self::from_xlsx_bytes(name, bytes),
        }
    }

    pub fn from_csv_bytes(name: &str, bytes: &[u8]) -> Result<Self> {
        let text = decode_text(bytes);
        let delimiter = sniff_delimiter(&text);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| PipelineError::decode(name, e))?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let record = record.map_err(|e| PipelineError::decode(name, e))?;
            let line = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(idx + 2);
            let row = Row {
                line,
                cells: record.iter().map(str::to_string).collect(),
            };
            if !row.is_blank() {
                rows.push(row);
            }
        }

        Ok(Table {
            name: name.to_string(),
            headers,
            rows,
        })
    }

    /// Reads the first worksheet.
    pub fn from_xlsx_bytes(name: &str, bytes: &[u8]) -> Result<Self> {
        let mut workbook: Xlsx<_> =
            Xlsx::new(Cursor::new(bytes.to_vec())).map_err(|e| PipelineError::decode(name, e))?;
        let sheet = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| PipelineError::decode(name, "workbook has no worksheets"))?;
        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|e| PipelineError::decode(name, e))?;

        let first_line = range.start().map_or(0, |(row, _)| row as usize) + 1;
        let mut sheet_rows = range.rows();
        let headers: Vec<String> = match sheet_rows.next() {
            Some(cells) => cells.iter().map(render_cell).collect(),
            None => Vec::new(),
        };

        let rows = sheet_rows
            .enumerate()
            .map(|(idx, cells)| Row {
                line: first_line + idx + 1,
                cells: cells.iter().map(render_cell).collect(),
            })
            .filter(|row| !row.is_blank())
            .collect();

        Ok(Table {
            name: name.to_string(),
            headers,
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// UTF-8 with the BOM removed, falling back to Latin-1.
fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Picks `;`, `\t` or `,` by which appears most in the header line.
fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let count = |c: char| header.matches(c).count();
    let (semicolons, tabs, commas) = (count(';'), count('\t'), count(','));
    if semicolons > commas && semicolons >= tabs {
        b';'
    } else if tabs > commas {
        b'\t'
    } else {
        b','
    }
}

fn render_cell(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => render_float(*f),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => render_serial(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => e.to_string(),
    }
}

fn render_float(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

fn render_serial(serial: f64) -> String {
    let Some(date) = excel_serial_to_date(serial) else {
        return render_float(serial);
    };
    let seconds = (serial.fract() * 86_400.0).round() as i64;
    if seconds == 0 {
        return date.format("%Y-%m-%d").to_string();
    }
    match date.and_hms_opt(0, 0, 0) {
        Some(midnight) => (midnight + Duration::seconds(seconds))
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => date.format("%Y-%m-%d").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semicolon_csv_with_bom_and_blank_rows() {
        let bytes = b"\xEF\xBB\xBFPlaca;OPM;Valor\nabc1234;3 BPM;R$ 1.234,56\n;;\nXYZ9876;1 CPMI;10\n";
        let table = Table::from_csv_bytes("fuel", bytes).unwrap();
        assert_eq!(table.headers, vec!["Placa", "OPM", "Valor"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].cells[2], "R$ 1.234,56");
        assert_eq!(table.rows[0].line, 2);
        assert_eq!(table.rows[1].line, 4);
    }

    #[test]
    fn test_comma_csv_with_quoted_field_and_short_row() {
        let bytes = b"placa,opm,valor\n\"ABC-1234\",\"1\xC2\xAA CIA, 5\xC2\xBA BPM\",\"1,5\"\nQWE1A23\n";
        let table = Table::from_csv_bytes("fuel", bytes).unwrap();
        assert_eq!(table.rows[0].cells[1], "1ª CIA, 5º BPM");
        assert_eq!(table.rows[0].cells[2], "1,5");
        assert_eq!(table.rows[1].get(Some(2)), "");
        assert_eq!(table.rows[1].get(None), "");
    }

    #[test]
    fn test_latin1_fallback() {
        // "Lotação" in Latin-1.
        let bytes = b"Lota\xE7\xE3o;Nome\nDLOG;Silva\n";
        let table = Table::from_csv_bytes("personnel", bytes).unwrap();
        assert_eq!(table.headers[0], "Lotação");
    }

    #[test]
    fn test_sniff_delimiter() {
        assert_eq!(sniff_delimiter("a;b;c\n1,2;3;4"), b';');
        assert_eq!(sniff_delimiter("a,b,c"), b',');
        assert_eq!(sniff_delimiter("a\tb\tc"), b'\t');
        assert_eq!(sniff_delimiter(""), b',');
    }

    #[test]
    fn test_render_cells() {
        assert_eq!(render_cell(&Data::Float(12.0)), "12");
        assert_eq!(render_cell(&Data::Float(12.5)), "12.5");
        assert_eq!(render_cell(&Data::String(" 3 BPM ".into())), "3 BPM");
        assert_eq!(render_serial(45730.0), "2025-03-14");
        assert_eq!(render_serial(45730.5), "2025-03-14 12:00:00");
    }

    #[test]
    fn test_garbage_xlsx_is_a_decode_error() {
        let err = Table::from_xlsx_bytes("fleet", b"PK\x03\x04not really").unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }
}
