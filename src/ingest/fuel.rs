use std::collections::HashSet;

use tracing::debug;

use super::{Parsed, manifest_for, optional_value, text_or_na};
use crate::error::Result;
use crate::model::{FuelRecord, NOT_AVAILABLE, RowFlag};
use crate::normalize::{fold_text, normalize_plate};
use crate::parser::{parse_amount, parse_date};
use crate::schema::{Concept, DeclaredSchema, SourceKind};
use crate::table::Table;

#[derive(Debug, Clone, PartialEq)]
pub enum FuelLayout {
    /// Fuel-type and liters columns, one record per row.
    Long,
    /// One liters column per fuel (`Gasolina (Lts)`, `Diesel S10 (Lts)`, ...).
    Wide { columns: Vec<(usize, String)> },
}

// Parenthesised units that mark a per-fuel liters column.
const LITER_UNITS: [&str; 4] = ["LTS", "LT", "L", "LITROS"];
// Names in front of a liters unit that are totals or quantities, not fuels.
const NOT_FUELS: [&str; 5] = ["TOTAL", "QUANTIDADE", "QTD", "LITROS", "VOLUME"];

/// Finds per-fuel liters columns. They are returned as reserved, together
/// with `Total (Lts)`, so column detection never assigns them.
pub fn detect_layout(headers: &[String]) -> (FuelLayout, HashSet<usize>) {
    let mut columns = Vec::new();
    let mut reserved = HashSet::new();
    for (idx, header) in headers.iter().enumerate() {
        let Some(fuel) = liters_column_fuel(header) else {
            continue;
        };
        let folded = fold_text(&fuel);
        if folded == "TOTAL" {
            reserved.insert(idx);
        } else if !NOT_FUELS.contains(&folded.as_str()) {
            reserved.insert(idx);
            columns.push((idx, fuel));
        }
    }

    if columns.is_empty() {
        (FuelLayout::Long, reserved)
    } else {
        (FuelLayout::Wide { columns }, reserved)
    }
}

fn liters_column_fuel(header: &str) -> Option<String> {
    let trimmed = header.trim();
    let inner = trimmed.strip_suffix(')')?;
    let open = inner.rfind('(')?;
    let unit = fold_text(&inner[open + 1..]);
    if !LITER_UNITS.contains(&unit.as_str()) {
        return None;
    }
    let fuel = inner[..open].trim();
    (!fuel.is_empty()).then(|| fuel.to_string())
}

/// Parses fuel records in either layout.
///
/// In the wide layout every fuel column with non-zero liters becomes its own
/// record and the row amount is split in proportion to liters. A row with no
/// liters at all still yields one `N/A` record, so every source row is
/// represented. Its liters are zero, or `None` when a liters cell failed to
/// parse.
pub fn parse_fuel(table: &Table, declared: &DeclaredSchema) -> Result<Parsed<FuelRecord>> {
    let (layout, reserved) = detect_layout(&table.headers);
    let manifest = manifest_for(table, SourceKind::Fuel, declared, &reserved)?;
    if layout == FuelLayout::Long {
        manifest.require(Concept::Liters)?;
    }

    let plate = manifest.index(Concept::Plate);
    let unit = manifest.index(Concept::Unit);
    let fuel_type = manifest.index(Concept::FuelType);
    let liters = manifest.index(Concept::Liters);
    let amount = manifest.index(Concept::AmountSpent);
    let date = manifest.index(Concept::Date);
    let header = move |idx: Option<usize>| {
        idx.and_then(|i| table.headers.get(i))
            .map(String::as_str)
            .unwrap_or("")
    };

    let mut records = Vec::with_capacity(table.len());
    for row in &table.rows {
        let mut flags = Vec::new();
        let plate_raw = row.get(plate).trim().to_string();
        if normalize_plate(&plate_raw).is_empty() {
            flags.push(RowFlag::MissingPlate);
        }
        let unit_raw = row.get(unit).trim().to_string();
        let amount_spent = optional_value(row.get(amount), header(amount), parse_amount, &mut flags);
        let day = optional_value(row.get(date), header(date), parse_date, &mut flags);

        let record = |fuel_type: String, liters: Option<f64>, amount_spent: Option<f64>, flags: Vec<RowFlag>| {
            FuelRecord {
                source_row: row.line,
                plate: plate_raw.clone(),
                unit: unit_raw.clone(),
                fuel_type,
                liters,
                amount_spent,
                date: day,
                flags,
            }
        };

        match &layout {
            FuelLayout::Long => {
                let l = optional_value(row.get(liters), header(liters), parse_amount, &mut flags);
                records.push(record(text_or_na(row.get(fuel_type)), l, amount_spent, flags));
            }
            FuelLayout::Wide { columns } => {
                let mut parts = Vec::new();
                let mut invalid = false;
                for (idx, fuel) in columns {
                    let before = flags.len();
                    let value = optional_value(row.get(Some(*idx)), &table.headers[*idx], parse_amount, &mut flags);
                    invalid |= flags.len() > before;
                    if let Some(l) = value.filter(|l| *l != 0.0) {
                        parts.push((fuel.clone(), l));
                    }
                }

                // Zero only when every liters cell was blank or zero.
                if parts.is_empty() {
                    let liters = (!invalid).then_some(0.0);
                    records.push(record(NOT_AVAILABLE.to_string(), liters, amount_spent, flags));
                    continue;
                }

                let total: f64 = parts.iter().map(|(_, l)| l).sum();
                let n = parts.len() as f64;
                for (fuel, l) in parts {
                    let share = if total != 0.0 { l / total } else { 1.0 / n };
                    records.push(record(fuel, Some(l), amount_spent.map(|a| a * share), flags.clone()));
                }
            }
        }
    }

    debug!(
        source = %table.name,
        rows = table.len(),
        records = records.len(),
        wide = matches!(layout, FuelLayout::Wide { .. }),
        "Fuel records parsed"
    );

    Ok(Parsed {
        manifest,
        records,
        skipped: 0,
    })
}
