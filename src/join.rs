//! Left joins from fuel records to the fleet roster and the unit mapping.
//!
//! Every fuel record yields exactly one [`JoinedRecord`], in input order.
//! Duplicate right-side keys never fan out: one candidate is chosen, the row
//! is flagged and the key is reported as a [`JoinAmbiguity`].

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::{info, warn};

use crate::model::{
    FleetRecord, FuelRecord, JoinedRecord, LeaseRate, NOT_FOUND, Resolution, RowFlag, UnitGeo,
};
use crate::normalize::{UnitNormalizer, fold_text, normalize_plate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinSide {
    Fleet,
    Geo,
}

/// A join key that matched more than one right-side row. A warning, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinAmbiguity {
    pub side: JoinSide,
    pub key: String,
    pub candidates: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct JoinSummary {
    pub records: usize,
    pub fleet_matched: usize,
    pub geo_matched: usize,
    pub flags: BTreeMap<&'static str, usize>,
}

#[derive(Debug, Clone)]
pub struct JoinOutput {
    pub records: Vec<JoinedRecord>,
    pub ambiguities: Vec<JoinAmbiguity>,
    pub summary: JoinSummary,
}

/// Fills `monthly_lease_cost` of leased vehicles that have none from the
/// rate table (classes compared folded, first rate per class wins). Leased
/// vehicles whose class has no rate are flagged.
pub fn backfill_lease_costs(fleet: &[FleetRecord], rates: &[LeaseRate]) -> Vec<FleetRecord> {
    let mut by_class: HashMap<String, f64> = HashMap::new();
    for rate in rates {
        by_class
            .entry(fold_text(&rate.standard_class))
            .or_insert(rate.monthly_rate);
    }

    fleet
        .iter()
        .map(|vehicle| {
            let mut vehicle = vehicle.clone();
            if vehicle.is_leased() && vehicle.monthly_lease_cost.is_none() {
                match by_class.get(&fold_text(&vehicle.standard_class)) {
                    Some(rate) => vehicle.monthly_lease_cost = Some(*rate),
                    None => vehicle.flags.push(RowFlag::MissingLeaseRate {
                        standard_class: vehicle.standard_class.clone(),
                    }),
                }
            }
            vehicle
        })
        .collect()
}

/// Groups rows by key, preserving source order inside each group.
fn index_by<'a, T>(rows: &'a [T], key: impl Fn(&T) -> String) -> HashMap<String, Vec<&'a T>> {
    let mut index: HashMap<String, Vec<&T>> = HashMap::new();
    for row in rows {
        let k = key(row);
        if !k.is_empty() {
            index.entry(k).or_default().push(row);
        }
    }
    index
}

pub fn join(
    fuel: &[FuelRecord],
    fleet: &[FleetRecord],
    geo: &[UnitGeo],
    normalizer: &UnitNormalizer,
) -> JoinOutput {
    let fleet_index = index_by(fleet, |f| normalize_plate(&f.plate));
    let geo_index = index_by(geo, |g| normalizer.key(&g.unit));

    let mut ambiguities: BTreeMap<(u8, String), JoinAmbiguity> = BTreeMap::new();
    let mut summary = JoinSummary {
        records: fuel.len(),
        ..Default::default()
    };

    let mut records = Vec::with_capacity(fuel.len());
    for record in fuel {
        let mut flags = record.flags.clone();
        let fuel_unit = (!record.unit.trim().is_empty()).then(|| normalizer.normalize(&record.unit));

        let plate_key = normalize_plate(&record.plate);
        let fleet_match = if plate_key.is_empty() {
            None
        } else {
            match fleet_index.get(&plate_key).map(Vec::as_slice) {
                None | Some([]) => {
                    flags.push(RowFlag::UnmatchedPlate);
                    None
                }
                Some([only]) => Some(*only),
                Some(candidates) => {
                    let same_unit: Vec<&&FleetRecord> = match &fuel_unit {
                        Some(unit) => candidates
                            .iter()
                            .filter(|c| normalizer.key(&c.unit) == unit.value)
                            .collect(),
                        None => Vec::new(),
                    };
                    let (chosen, resolved_by) = match same_unit.as_slice() {
                        [one] => (**one, Resolution::UnitMatch),
                        _ => (candidates[0], Resolution::SourceOrder),
                    };
                    flags.push(RowFlag::AmbiguousPlate {
                        candidates: candidates.len(),
                        chosen_unit: chosen.unit.clone(),
                        resolved_by,
                    });
                    ambiguities
                        .entry((0, plate_key.clone()))
                        .or_insert_with(|| JoinAmbiguity {
                            side: JoinSide::Fleet,
                            key: plate_key.clone(),
                            candidates: candidates.len(),
                        });
                    Some(chosen)
                }
            }
        };

        let unit = match (fuel_unit, fleet_match) {
            (Some(unit), _) => Some(unit),
            (None, Some(vehicle)) if !vehicle.unit.trim().is_empty() => Some(normalizer.normalize(&vehicle.unit)),
            _ => None,
        };
        if let Some(unit) = unit.as_ref().filter(|u| u.is_ambiguous()) {
            flags.push(RowFlag::AliasConflict {
                rules: unit.conflicts.clone(),
            });
        }
        let unit_key = unit.map_or_else(|| NOT_FOUND.to_string(), |u| u.value);

        let geo_match = match geo_index.get(&unit_key).map(Vec::as_slice) {
            None | Some([]) => {
                flags.push(RowFlag::UnmatchedUnit);
                None
            }
            Some([only]) => Some(*only),
            Some(candidates) => {
                let seats: Vec<&&UnitGeo> = candidates.iter().filter(|g| is_seat(g)).collect();
                match seats.as_slice() {
                    [seat] => Some(**seat),
                    _ => {
                        flags.push(RowFlag::AmbiguousUnit {
                            candidates: candidates.len(),
                        });
                        ambiguities
                            .entry((1, unit_key.clone()))
                            .or_insert_with(|| JoinAmbiguity {
                                side: JoinSide::Geo,
                                key: unit_key.clone(),
                                candidates: candidates.len(),
                            });
                        Some(candidates[0])
                    }
                }
            }
        };

        summary.fleet_matched += usize::from(fleet_match.is_some());
        summary.geo_matched += usize::from(geo_match.is_some());
        for flag in &flags {
            *summary.flags.entry(flag.code()).or_default() += 1;
        }

        records.push(JoinedRecord {
            fuel: record.clone(),
            unit_key,
            fleet: fleet_match.cloned(),
            geo: geo_match.cloned(),
            flags,
        });
    }

    let ambiguities: Vec<JoinAmbiguity> = ambiguities.into_values().collect();
    info!(
        records = summary.records,
        fleet_matched = summary.fleet_matched,
        geo_matched = summary.geo_matched,
        "Join complete"
    );
    for (code, count) in &summary.flags {
        warn!(flag = code, count, "Rows flagged during join");
    }
    if !ambiguities.is_empty() {
        warn!(keys = ambiguities.len(), "Join keys matched more than one row");
    }

    JoinOutput {
        records,
        ambiguities,
        summary,
    }
}

/// The row whose location is the unit's reference city.
fn is_seat(geo: &UnitGeo) -> bool {
    geo.reference_city
        .as_deref()
        .is_some_and(|city| fold_text(city) == fold_text(&geo.location_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LocationType, OwnershipKind};
    use crate::normalize::AliasRuleSet;

    fn fuel(row: usize, plate: &str, unit: &str) -> FuelRecord {
        FuelRecord {
            source_row: row,
            plate: plate.to_string(),
            unit: unit.to_string(),
            fuel_type: "Diesel".to_string(),
            liters: Some(10.0),
            amount_spent: Some(60.0),
            date: None,
            flags: Vec::new(),
        }
    }

    fn vehicle(row: usize, plate: &str, unit: &str) -> FleetRecord {
        FleetRecord {
            source_row: row,
            plate: plate.to_string(),
            unit: unit.to_string(),
            ownership_kind: Some(OwnershipKind::Owned),
            standard_class: "SUV".to_string(),
            monthly_lease_cost: None,
            characterization: "Caracterizada".to_string(),
            flags: Vec::new(),
        }
    }

    fn place(unit: &str, name: &str, city: Option<&str>) -> UnitGeo {
        UnitGeo {
            unit: unit.to_string(),
            location_name: name.to_string(),
            location_type: LocationType::Municipality,
            reference_city: city.map(str::to_string),
            latitude: None,
            longitude: None,
            flags: Vec::new(),
        }
    }

    fn normalizer() -> UnitNormalizer {
        UnitNormalizer::new(AliasRuleSet::builtin().unwrap())
    }

    #[test]
    fn test_every_fuel_row_appears_exactly_once() {
        let fuel_rows = vec![
            fuel(2, "abc-1234", "3º BPM"),
            fuel(3, "ZZZ0000", "3º BPM"),
            fuel(4, "DUP1111", ""),
            fuel(5, "", "Unidade Fantasma"),
        ];
        let fleet = vec![
            vehicle(2, "ABC1234", "3 BPM"),
            vehicle(3, "DUP1111", "1 BPM"),
            vehicle(4, "dup-1111", "2 BPM"),
        ];
        let geo = vec![place("3º BPM", "Arapiraca", None)];

        let out = join(&fuel_rows, &fleet, &geo, &normalizer());
        assert_eq!(out.records.len(), fuel_rows.len());
        let rows: Vec<usize> = out.records.iter().map(|r| r.fuel.source_row).collect();
        assert_eq!(rows, vec![2, 3, 4, 5]);

        let matched = &out.records[0];
        assert_eq!(matched.unit_key, "3 BPM");
        assert_eq!(matched.fleet.as_ref().map(|f| f.source_row), Some(2));
        assert_eq!(matched.location_name(), "Arapiraca");
        assert!(matched.flags.is_empty());

        let unmatched = &out.records[1];
        assert!(unmatched.has_flag("unmatched_plate"));
        assert_eq!(unmatched.standard_class(), NOT_FOUND);
        assert_eq!(unmatched.ownership(), "N/A");
        assert_eq!(unmatched.monthly_lease_cost(), 0.0);

        let duplicated = &out.records[2];
        assert!(duplicated.has_flag("ambiguous_plate"));
        assert_eq!(duplicated.fleet.as_ref().map(|f| f.source_row), Some(3));
        assert_eq!(duplicated.unit_key, "1 BPM");
        assert!(duplicated.has_flag("unmatched_unit"));

        let ghost = &out.records[3];
        assert!(!ghost.has_flag("unmatched_plate"));
        assert!(ghost.has_flag("unmatched_unit"));
        assert_eq!(ghost.location_name(), NOT_FOUND);

        assert_eq!(
            out.ambiguities,
            vec![JoinAmbiguity {
                side: JoinSide::Fleet,
                key: "DUP1111".to_string(),
                candidates: 2
            }]
        );
        assert_eq!(out.summary.fleet_matched, 2);
        assert_eq!(out.summary.flags.get("ambiguous_plate"), Some(&1));
    }

    #[test]
    fn test_duplicate_plate_prefers_the_unit_of_the_fuel_row() {
        let fleet = vec![vehicle(2, "DUP1111", "1º BPM"), vehicle(3, "DUP1111", "2º BPM")];
        let out = join(&[fuel(2, "DUP1111", "2 BPM")], &fleet, &[], &normalizer());
        let record = &out.records[0];
        assert_eq!(record.fleet.as_ref().map(|f| f.source_row), Some(3));
        assert!(record.flags.contains(&RowFlag::AmbiguousPlate {
            candidates: 2,
            chosen_unit: "2º BPM".to_string(),
            resolved_by: Resolution::UnitMatch,
        }));
    }

    #[test]
    fn test_geo_prefers_the_reference_city_row() {
        let geo = vec![
            place("3 BPM", "Craíbas", Some("Arapiraca")),
            place("3 BPM", "ARAPIRACA", Some("Arapiraca")),
            place("1 BPM", "Farol", None),
            place("1 BPM", "Jatiúca", None),
        ];
        let out = join(
            &[fuel(2, "", "3º BPM"), fuel(3, "", "1o BPM")],
            &[],
            &geo,
            &normalizer(),
        );
        assert_eq!(out.records[0].location_name(), "ARAPIRACA");
        assert!(!out.records[0].has_flag("ambiguous_unit"));
        assert_eq!(out.records[1].location_name(), "Farol");
        assert!(out.records[1].has_flag("ambiguous_unit"));
        assert_eq!(out.ambiguities.len(), 1);
        assert_eq!(out.ambiguities[0].side, JoinSide::Geo);
    }

    #[test]
    fn test_backfill_lease_costs() {
        let mut leased = vehicle(2, "AAA1111", "3 BPM");
        leased.ownership_kind = Some(OwnershipKind::Leased);
        let mut unknown_class = leased.clone();
        unknown_class.standard_class = "Blindado".to_string();
        let mut priced = leased.clone();
        priced.monthly_lease_cost = Some(1.0);
        let owned = vehicle(5, "BBB2222", "3 BPM");

        let rates = vec![
            LeaseRate {
                standard_class: "suv".to_string(),
                monthly_rate: 4500.0,
            },
            LeaseRate {
                standard_class: "SUV".to_string(),
                monthly_rate: 9999.0,
            },
        ];
        let out = backfill_lease_costs(&[leased, unknown_class, priced, owned], &rates);
        assert_eq!(out[0].monthly_lease_cost, Some(4500.0));
        assert_eq!(out[1].monthly_lease_cost, None);
        assert_eq!(
            out[1].flags,
            vec![RowFlag::MissingLeaseRate {
                standard_class: "Blindado".to_string()
            }]
        );
        assert_eq!(out[2].monthly_lease_cost, Some(1.0));
        assert_eq!(out[3].monthly_lease_cost, None);
        assert!(out[3].flags.is_empty());
    }
}
