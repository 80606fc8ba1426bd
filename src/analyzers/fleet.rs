use std::collections::{BTreeMap, BTreeSet};

use crate::analyzers::types::{DuplicatePlate, FleetSummary, UnitFleet};
use crate::model::{FleetRecord, OwnershipKind};
use crate::normalize::{UnitNormalizer, normalize_plate};

/// Vehicle counts, ownership split and lease costs per unit.
///
/// Vehicles are counted once per distinct plate; a plate listed twice is
/// reported under `duplicates` and counted for the first unit it appears in.
pub fn summarize_fleet(fleet: &[FleetRecord], normalizer: &UnitNormalizer) -> FleetSummary {
    let mut by_plate: BTreeMap<String, Vec<&FleetRecord>> = BTreeMap::new();
    for vehicle in fleet {
        by_plate
            .entry(normalize_plate(&vehicle.plate))
            .or_default()
            .push(vehicle);
    }

    let mut units: BTreeMap<String, UnitFleet> = BTreeMap::new();
    let mut characterization: BTreeMap<String, usize> = BTreeMap::new();
    let mut duplicates = Vec::new();

    for (plate, rows) in &by_plate {
        let Some(vehicle) = rows.first() else {
            continue;
        };
        if rows.len() > 1 {
            let names: BTreeSet<String> = rows.iter().map(|r| r.unit.clone()).collect();
            duplicates.push(DuplicatePlate {
                plate: plate.clone(),
                rows: rows.iter().map(|r| r.source_row).collect(),
                units: names.into_iter().collect(),
            });
        }

        let unit_key = normalizer.key(&vehicle.unit);
        let entry = units.entry(unit_key.clone()).or_insert_with(|| UnitFleet {
            unit: unit_key,
            vehicles: 0,
            owned: 0,
            leased: 0,
            unknown_ownership: 0,
            monthly_lease_cost: 0.0,
        });
        entry.vehicles += 1;
        match vehicle.ownership_kind {
            Some(OwnershipKind::Owned) => entry.owned += 1,
            Some(OwnershipKind::Leased) => entry.leased += 1,
            None => entry.unknown_ownership += 1,
        }
        if vehicle.is_leased() {
            entry.monthly_lease_cost += vehicle.monthly_lease_cost.unwrap_or(0.0);
        }
        *characterization
            .entry(vehicle.characterization.to_uppercase())
            .or_default() += 1;
    }

    let mut units: Vec<UnitFleet> = units.into_values().collect();
    units.sort_by(|a, b| b.vehicles.cmp(&a.vehicles).then_with(|| a.unit.cmp(&b.unit)));

    FleetSummary {
        rows: fleet.len(),
        vehicles: by_plate.len(),
        owned: units.iter().map(|u| u.owned).sum(),
        leased: units.iter().map(|u| u.leased).sum(),
        monthly_lease_cost: units.iter().map(|u| u.monthly_lease_cost).sum(),
        units,
        duplicates,
        characterization,
    }
}
