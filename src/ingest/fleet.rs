use tracing::debug;

use super::{Parsed, manifest_for, optional_value, text_or_na};
use crate::error::Result;
use crate::model::{FleetRecord, OwnershipKind, RowFlag};
use crate::normalize::{fold_text, normalize_plate};
use crate::parser::parse_amount;
use crate::schema::{Concept, DeclaredSchema, SourceKind};
use crate::table::Table;
use std::collections::HashSet;

/// Reads an ownership cell: `LOCADO`/`LOCAÇÃO` and `PRÓPRIO`/`PROPRIEDADE`
/// spellings, plus `SIM`/`NÃO` when the column itself is named `LOCADO`.
/// A leading `NÃO` negates the spelling (`NÃO LOCADO` is owned).
pub fn parse_ownership(raw: &str, column: &str) -> Option<OwnershipKind> {
    let value = fold_text(raw);
    let (negated, rest) = match value.split_once(' ') {
        Some(("NAO", rest)) => (true, rest),
        _ => (false, value.as_str()),
    };
    let kind = if rest.contains("LOC") || rest.contains("ALUG") {
        Some(OwnershipKind::Leased)
    } else if rest.contains("PROP") {
        Some(OwnershipKind::Owned)
    } else {
        None
    };
    if let Some(kind) = kind {
        return Some(match (negated, kind) {
            (false, kind) => kind,
            (true, OwnershipKind::Leased) => OwnershipKind::Owned,
            (true, OwnershipKind::Owned) => OwnershipKind::Leased,
        });
    }
    if fold_text(column).contains("LOCAD") {
        return match value.as_str() {
            "SIM" | "S" | "X" => Some(OwnershipKind::Leased),
            "NAO" | "N" => Some(OwnershipKind::Owned),
            _ => None,
        };
    }
    None
}

/// Parses the fleet roster. Rows whose plate normalizes to nothing are
/// skipped, since they can never be joined.
pub fn parse_fleet(table: &Table, declared: &DeclaredSchema) -> Result<Parsed<FleetRecord>> {
    let manifest = manifest_for(table, SourceKind::Fleet, declared, &HashSet::new())?;
    let plate = manifest.index(Concept::Plate);
    let unit = manifest.index(Concept::Unit);
    let ownership = manifest.index(Concept::Ownership);
    let class = manifest.index(Concept::StandardClass);
    let lease = manifest.index(Concept::MonthlyLeaseCost);
    let characterization = manifest.index(Concept::Characterization);
    let header = move |idx: Option<usize>| {
        idx.and_then(|i| table.headers.get(i))
            .map(String::as_str)
            .unwrap_or("")
    };

    let mut records = Vec::with_capacity(table.len());
    let mut skipped = 0;
    for row in &table.rows {
        let plate_raw = row.get(plate).trim();
        if normalize_plate(plate_raw).is_empty() {
            skipped += 1;
            continue;
        }

        let mut flags = Vec::new();
        let ownership_raw = row.get(ownership).trim();
        let ownership_kind = parse_ownership(ownership_raw, header(ownership));
        if ownership_kind.is_none() && !ownership_raw.is_empty() {
            flags.push(RowFlag::unparseable(header(ownership), ownership_raw));
        }
        let monthly_lease_cost = optional_value(row.get(lease), header(lease), parse_amount, &mut flags);

        records.push(FleetRecord {
            source_row: row.line,
            plate: plate_raw.to_string(),
            unit: row.get(unit).trim().to_string(),
            ownership_kind,
            standard_class: text_or_na(row.get(class)),
            monthly_lease_cost,
            characterization: text_or_na(row.get(characterization)),
            flags,
        });
    }

    debug!(source = %table.name, records = records.len(), skipped, "Fleet records parsed");
    Ok(Parsed {
        manifest,
        records,
        skipped,
    })
}
