use std::path::{Path, PathBuf};

use serde::Serialize;
use tabled::Tabled;

use super::render::{fixed, money, preview_table};
use crate::analyzers::types::{DuplicatePlate, UnitAllocation, UnitFleet, VehicleMove};
use crate::error::Result;
use crate::model::LocationType;
use crate::output::{write_csv, write_json};
use crate::pipeline::FleetReport;

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct UnitFleetRow {
    #[serde(rename = "Unit")]
    #[tabled(rename = "Unit")]
    pub unit: String,
    #[serde(rename = "Vehicles")]
    #[tabled(rename = "Vehicles")]
    pub vehicles: usize,
    #[serde(rename = "Owned")]
    #[tabled(rename = "Owned")]
    pub owned: usize,
    #[serde(rename = "Leased")]
    #[tabled(rename = "Leased")]
    pub leased: usize,
    #[serde(rename = "Unknown")]
    #[tabled(rename = "Unknown")]
    pub unknown: usize,
    #[serde(rename = "MonthlyLeaseCost")]
    #[tabled(rename = "MonthlyLeaseCost")]
    pub monthly_lease_cost: String,
}

impl From<&UnitFleet> for UnitFleetRow {
    fn from(u: &UnitFleet) -> Self {
        Self {
            unit: u.unit.clone(),
            vehicles: u.vehicles,
            owned: u.owned,
            leased: u.leased,
            unknown: u.unknown_ownership,
            monthly_lease_cost: fixed(u.monthly_lease_cost),
        }
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct DuplicateRow {
    #[serde(rename = "Plate")]
    #[tabled(rename = "Plate")]
    pub plate: String,
    #[serde(rename = "Rows")]
    #[tabled(rename = "Rows")]
    pub rows: String,
    #[serde(rename = "Units")]
    #[tabled(rename = "Units")]
    pub units: String,
}

impl From<&DuplicatePlate> for DuplicateRow {
    fn from(d: &DuplicatePlate) -> Self {
        Self {
            plate: d.plate.clone(),
            rows: d.rows.iter().map(|r| r.to_string()).collect::<Vec<_>>().join(", "),
            units: d.units.join(" | "),
        }
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct CountRow {
    #[serde(rename = "Name")]
    #[tabled(rename = "Name")]
    pub name: String,
    #[serde(rename = "Count")]
    #[tabled(rename = "Count")]
    pub count: usize,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct AllocationRow {
    #[serde(rename = "Unit")]
    #[tabled(rename = "Unit")]
    pub unit: String,
    #[serde(rename = "Vehicles")]
    #[tabled(rename = "Vehicles")]
    pub vehicles: usize,
    #[serde(rename = "Entities")]
    #[tabled(rename = "Entities")]
    pub entities: usize,
    #[serde(rename = "Ratio")]
    #[tabled(rename = "Ratio")]
    pub ratio: String,
    #[serde(rename = "FairShare")]
    #[tabled(rename = "FairShare")]
    pub fair_share: String,
    #[serde(rename = "Deviation")]
    #[tabled(rename = "Deviation")]
    pub deviation: String,
    #[serde(rename = "VehiclesAfter")]
    #[tabled(rename = "VehiclesAfter")]
    pub vehicles_after: usize,
}

impl From<&UnitAllocation> for AllocationRow {
    fn from(a: &UnitAllocation) -> Self {
        Self {
            unit: a.unit.clone(),
            vehicles: a.vehicles,
            entities: a.entities,
            ratio: fixed(a.ratio),
            fair_share: fixed(a.fair_share),
            deviation: format!("{:+.2}", a.deviation),
            vehicles_after: a.vehicles_after,
        }
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct MoveRow {
    #[serde(rename = "From")]
    #[tabled(rename = "From")]
    pub from: String,
    #[serde(rename = "To")]
    #[tabled(rename = "To")]
    pub to: String,
    #[serde(rename = "Vehicles")]
    #[tabled(rename = "Vehicles")]
    pub vehicles: usize,
}

impl From<&VehicleMove> for MoveRow {
    fn from(m: &VehicleMove) -> Self {
        Self {
            from: m.from.clone(),
            to: m.to.clone(),
            vehicles: m.vehicles,
        }
    }
}

fn entity_label(kind: LocationType) -> &'static str {
    match kind {
        LocationType::Municipality => "municipalities",
        LocationType::Neighborhood => "neighborhoods",
    }
}

pub fn characterization_rows(report: &FleetReport) -> Vec<CountRow> {
    let mut out: Vec<CountRow> = report
        .summary
        .characterization
        .iter()
        .map(|(name, count)| CountRow {
            name: name.clone(),
            count: *count,
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    out
}

pub fn render(report: &FleetReport, max_rows: usize) {
    let s = &report.summary;
    let note = format!(
        "{} vehicles on {} rows, {} owned, {} leased, lease {} / month",
        s.vehicles,
        s.rows,
        s.owned,
        s.leased,
        money(s.monthly_lease_cost)
    );
    let units: Vec<UnitFleetRow> = s.units.iter().map(UnitFleetRow::from).collect();
    preview_table("Fleet by unit", Some(&note), &units, max_rows);
    preview_table("Characterization", None, &characterization_rows(report), max_rows);

    let duplicates: Vec<DuplicateRow> = s.duplicates.iter().map(DuplicateRow::from).collect();
    preview_table(
        "Plates listed more than once",
        Some("counted once, under the first row"),
        &duplicates,
        max_rows,
    );

    if let Some(plan) = &report.redistribution {
        let note = format!(
            "mean {:.2} vehicles per entity over {}; advisory",
            plan.mean_ratio,
            entity_label(report.entity_kind)
        );
        let units: Vec<AllocationRow> = plan.units.iter().map(AllocationRow::from).collect();
        preview_table("Redistribution", Some(&note), &units, max_rows);
        let moves: Vec<MoveRow> = plan.moves.iter().map(MoveRow::from).collect();
        preview_table("Suggested moves", None, &moves, max_rows);
        if !plan.excluded.is_empty() {
            println!("Units without {}: {}\n", entity_label(report.entity_kind), plan.excluded.join(", "));
        }
    }
}

pub fn export(report: &FleetReport, dir: &Path, gzip: bool) -> Result<Vec<PathBuf>> {
    let s = &report.summary;
    let units: Vec<UnitFleetRow> = s.units.iter().map(UnitFleetRow::from).collect();
    let duplicates: Vec<DuplicateRow> = s.duplicates.iter().map(DuplicateRow::from).collect();

    let mut written = vec![
        write_csv(dir, "fleet_by_unit", &units, gzip)?,
        write_csv(dir, "fleet_duplicates", &duplicates, gzip)?,
        write_csv(dir, "fleet_characterization", &characterization_rows(report), gzip)?,
        write_json(dir, "fleet_summary", s, gzip)?,
    ];
    if let Some(plan) = &report.redistribution {
        let units: Vec<AllocationRow> = plan.units.iter().map(AllocationRow::from).collect();
        let moves: Vec<MoveRow> = plan.moves.iter().map(MoveRow::from).collect();
        written.push(write_csv(dir, "fleet_redistribution", &units, gzip)?);
        written.push(write_csv(dir, "fleet_moves", &moves, gzip)?);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::types::FleetSummary;
    use std::collections::BTreeMap;

    #[test]
    fn test_rows_format_plans_and_duplicates() {
        let row = AllocationRow::from(&UnitAllocation {
            unit: "3 BPM".to_string(),
            vehicles: 12,
            entities: 4,
            ratio: 3.0,
            fair_share: 10.5,
            deviation: 1.5,
            vehicles_after: 11,
        });
        assert_eq!(row.deviation, "+1.50");
        assert_eq!(row.fair_share, "10.50");

        let dup = DuplicateRow::from(&DuplicatePlate {
            plate: "ABC1234".to_string(),
            rows: vec![2, 9],
            units: vec!["1 BPM".to_string(), "3 BPM".to_string()],
        });
        assert_eq!(dup.rows, "2, 9");
        assert_eq!(dup.units, "1 BPM | 3 BPM");
    }

    #[test]
    fn test_characterization_sorted_by_count() {
        let report = FleetReport {
            summary: FleetSummary {
                rows: 3,
                vehicles: 3,
                owned: 3,
                leased: 0,
                monthly_lease_cost: 0.0,
                units: Vec::new(),
                duplicates: Vec::new(),
                characterization: BTreeMap::from([
                    ("CARACTERIZADA".to_string(), 2),
                    ("DESCARACTERIZADA".to_string(), 1),
                ]),
            },
            redistribution: None,
            entity_kind: LocationType::Municipality,
            flags: BTreeMap::new(),
        };
        let rows = characterization_rows(&report);
        assert_eq!(rows[0].name, "CARACTERIZADA");
        assert_eq!(rows[1].count, 1);

        let dir = tempfile::tempdir().unwrap();
        let written = export(&report, dir.path(), false).unwrap();
        assert_eq!(written.len(), 4);
        assert!(written.iter().all(|p| p.exists()));
    }
}
