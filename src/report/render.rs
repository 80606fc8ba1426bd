use std::fmt::Write as _;

use tabled::{Table, Tabled, settings::Style};

/// Markdown table of the first `max_rows` rows, or `(no rows)`.
pub fn render_table<T>(rows: &[T], max_rows: usize) -> String
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        return "(no rows)".to_string();
    }
    let mut out = Table::new(slice).with(Style::markdown()).to_string();
    if rows.len() > max_rows {
        let _ = write!(out, "\n... {} more rows", rows.len() - max_rows);
    }
    out
}

pub fn preview_table<T>(title: &str, note: Option<&str>, rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("\n{title}");
    if let Some(n) = note {
        println!("({n})");
    }
    println!();
    println!("{}\n", render_table(rows, max_rows));
}

/// `1234567.891` with 2 decimals → `1,234,567.89`.
pub fn thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if value < 0.0 && formatted.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };
    match frac_part {
        Some(f) => format!("{sign}{grouped}.{f}"),
        None => format!("{sign}{grouped}"),
    }
}

pub fn money(value: f64) -> String {
    format!("R$ {}", thousands(value, 2))
}

pub fn fixed(value: f64) -> String {
    format!("{value:.2}")
}

pub fn optional(value: Option<f64>) -> String {
    value.map(fixed).unwrap_or_default()
}
