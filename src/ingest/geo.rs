use std::collections::HashSet;

use tracing::{debug, warn};

use super::{Parsed, manifest_for};
use crate::error::Result;
use crate::model::{LocationType, RowFlag, UnitGeo};
use crate::normalize::fold_text;
use crate::parser::{Cell, parse_cell, parse_coordinate};
use crate::schema::{Concept, DeclaredSchema, SourceKind};
use crate::table::Table;

fn location_type(raw: &str) -> Option<LocationType> {
    let folded = fold_text(raw);
    if folded.contains("BAIRRO") {
        Some(LocationType::Neighborhood)
    } else if folded.contains("MUNIC") || folded.contains("CIDADE") {
        Some(LocationType::Municipality)
    } else {
        None
    }
}

/// Parses the unit/location mapping. Without a type column the type comes
/// from the location column's header (`Bairro` vs `Município`).
pub fn parse_geo(table: &Table, declared: &DeclaredSchema) -> Result<Parsed<UnitGeo>> {
    let manifest = manifest_for(table, SourceKind::Geo, declared, &HashSet::new())?;
    let unit = manifest.index(Concept::Unit);
    let location = manifest.index(Concept::LocationName);
    let kind = manifest.index(Concept::LocationType);
    let city = manifest.index(Concept::ReferenceCity);
    let lat = manifest.index(Concept::Latitude);
    let lon = manifest.index(Concept::Longitude);

    let header_type = location
        .and_then(|i| table.headers.get(i))
        .and_then(|h| location_type(h))
        .unwrap_or(LocationType::Municipality);

    let mut records = Vec::with_capacity(table.len());
    let mut skipped = 0;
    let mut bad_coordinates = 0;
    for row in &table.rows {
        let unit_raw = row.get(unit).trim();
        let location_name = row.get(location).trim();
        if unit_raw.is_empty() || location_name.is_empty() {
            skipped += 1;
            continue;
        }

        let mut flags = Vec::new();
        let mut coordinate = |idx: Option<usize>, limit: f64| {
            let cell = parse_cell(row.get(idx), |s| parse_coordinate(s, limit));
            if let Cell::Invalid(value) = &cell {
                bad_coordinates += 1;
                let column = idx.and_then(|i| table.headers.get(i)).map_or("", String::as_str);
                flags.push(RowFlag::unparseable(column, value.clone()));
            }
            cell.value()
        };
        let latitude = coordinate(lat, 90.0);
        let longitude = coordinate(lon, 180.0);

        let reference_city = Some(row.get(city).trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        if !flags.is_empty() {
            warn!(source = %table.name, line = row.line, unit = unit_raw, "Invalid coordinates");
        }
        records.push(UnitGeo {
            unit: unit_raw.to_string(),
            location_name: location_name.to_string(),
            location_type: location_type(row.get(kind)).unwrap_or(header_type),
            reference_city,
            latitude,
            longitude,
            flags,
        });
    }

    debug!(
        source = %table.name,
        records = records.len(),
        skipped,
        bad_coordinates,
        "Geo records parsed"
    );
    Ok(Parsed {
        manifest,
        records,
        skipped,
    })
}
