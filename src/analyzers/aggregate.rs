use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::analyzers::types::{FuelMix, GroupSummary, MonthlyPoint, UnitHeat};
use crate::analyzers::utility::{mean, pct};
use crate::model::{JoinedRecord, NOT_AVAILABLE, NOT_FOUND};
use crate::normalize::{fold_text, normalize_plate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Unit,
    Plate,
    FuelType,
    /// Calendar month of the record date, `YYYY-MM`.
    Month,
}

impl FromStr for GroupBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unit" | "opm" => Ok(GroupBy::Unit),
            "plate" => Ok(GroupBy::Plate),
            "fuel" | "fuel-type" | "fuel_type" => Ok(GroupBy::FuelType),
            "month" => Ok(GroupBy::Month),
            other => Err(format!("unknown grouping '{other}' (unit, plate, fuel-type, month)")),
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GroupBy::Unit => "unit",
            GroupBy::Plate => "plate",
            GroupBy::FuelType => "fuel-type",
            GroupBy::Month => "month",
        })
    }
}

pub fn month_key(record: &JoinedRecord) -> String {
    record
        .fuel
        .date
        .map_or_else(|| NOT_AVAILABLE.to_string(), |d| d.format("%Y-%m").to_string())
}

fn plate_key(record: &JoinedRecord) -> String {
    let plate = normalize_plate(&record.fuel.plate);
    if plate.is_empty() { NOT_FOUND.to_string() } else { plate }
}

pub fn group_key(record: &JoinedRecord, by: GroupBy) -> String {
    match by {
        GroupBy::Unit => record.unit_key.clone(),
        GroupBy::Plate => plate_key(record),
        GroupBy::FuelType => fold_text(&record.fuel.fuel_type),
        GroupBy::Month => month_key(record),
    }
}

/// Count, sums and means per group, sorted by descending liters then key.
pub fn group_by(records: &[&JoinedRecord], by: GroupBy) -> Vec<GroupSummary> {
    #[derive(Default)]
    struct Acc {
        records: usize,
        plates: HashSet<String>,
        liters: Vec<f64>,
        amounts: Vec<f64>,
    }

    let mut groups: HashMap<String, Acc> = HashMap::new();
    for record in records {
        let acc = groups.entry(group_key(record, by)).or_default();
        acc.records += 1;
        let plate = normalize_plate(&record.fuel.plate);
        if !plate.is_empty() {
            acc.plates.insert(plate);
        }
        acc.liters.extend(record.fuel.liters);
        acc.amounts.extend(record.fuel.amount_spent);
    }

    let mut out: Vec<GroupSummary> = groups
        .into_iter()
        .map(|(key, acc)| GroupSummary {
            key,
            records: acc.records,
            vehicles: acc.plates.len(),
            liters_total: acc.liters.iter().sum(),
            liters_mean: mean(&acc.liters),
            amount_total: acc.amounts.iter().sum(),
            amount_mean: mean(&acc.amounts),
        })
        .collect();

    out.sort_by(|a, b| {
        b.liters_total
            .total_cmp(&a.liters_total)
            .then_with(|| a.key.cmp(&b.key))
    });
    out
}

/// Liters per fuel type (folded), largest first.
pub fn fuel_mix(records: &[&JoinedRecord]) -> Vec<FuelMix> {
    let groups = group_by(records, GroupBy::FuelType);
    let total: f64 = groups.iter().map(|g| g.liters_total).sum();
    groups
        .into_iter()
        .map(|g| FuelMix {
            share: pct(g.liters_total, total),
            fuel_type: g.key,
            liters: g.liters_total,
        })
        .collect()
}

/// Liters per month and fuel type, in chronological order (`N/A` last).
pub fn monthly_series(records: &[&JoinedRecord]) -> Vec<MonthlyPoint> {
    let mut series: BTreeMap<(bool, String, String), f64> = BTreeMap::new();
    for record in records {
        let month = month_key(record);
        let undated = record.fuel.date.is_none();
        *series
            .entry((undated, month, fold_text(&record.fuel.fuel_type)))
            .or_default() += record.fuel.liters.unwrap_or(0.0);
    }
    series
        .into_iter()
        .map(|((_, month, fuel_type), liters)| MonthlyPoint {
            month,
            fuel_type,
            liters,
        })
        .collect()
}

/// Liters per unit with the coordinates of the matched location.
pub fn unit_heat(records: &[&JoinedRecord]) -> Vec<UnitHeat> {
    let mut by_unit: BTreeMap<&str, UnitHeat> = BTreeMap::new();
    for record in records {
        let entry = by_unit
            .entry(record.unit_key.as_str())
            .or_insert_with(|| UnitHeat {
                unit_key: record.unit_key.clone(),
                liters: 0.0,
                latitude: None,
                longitude: None,
            });
        entry.liters += record.fuel.liters.unwrap_or(0.0);
        if entry.latitude.is_none() {
            if let Some(geo) = &record.geo {
                entry.latitude = geo.latitude;
                entry.longitude = geo.longitude;
            }
        }
    }
    let mut out: Vec<UnitHeat> = by_unit.into_values().collect();
    out.sort_by(|a, b| b.liters.total_cmp(&a.liters).then_with(|| a.unit_key.cmp(&b.unit_key)));
    out
}

/// Liters summed per vehicle, averaged over vehicles.
pub fn mean_liters_per_vehicle(records: &[&JoinedRecord]) -> f64 {
    let per_plate: Vec<f64> = group_by(records, GroupBy::Plate)
        .into_iter()
        .filter(|g| g.key != NOT_FOUND)
        .map(|g| g.liters_total)
        .collect();
    mean(&per_plate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FuelRecord, LocationType, UnitGeo};
    use chrono::NaiveDate;

    fn record(plate: &str, unit: &str, fuel: &str, liters: Option<f64>, amount: Option<f64>, month: Option<u32>) -> JoinedRecord {
        JoinedRecord {
            fuel: FuelRecord {
                source_row: 2,
                plate: plate.to_string(),
                unit: unit.to_string(),
                fuel_type: fuel.to_string(),
                liters,
                amount_spent: amount,
                date: month.and_then(|m| NaiveDate::from_ymd_opt(2025, m, 10)),
                flags: Vec::new(),
            },
            unit_key: unit.to_string(),
            fleet: None,
            geo: None,
            flags: Vec::new(),
        }
    }

    fn sample() -> Vec<JoinedRecord> {
        vec![
            record("ABC1234", "3 BPM", "Diesel", Some(40.0), Some(240.0), Some(1)),
            record("abc-1234", "3 BPM", "DIESEL", Some(20.0), None, Some(2)),
            record("DEF5678", "1 BPM", "Gasolina", Some(30.0), Some(180.0), Some(2)),
            record("GHI9012", "1 BPM", "Gasolina", None, Some(50.0), None),
        ]
    }

    #[test]
    fn test_group_by_unit() {
        let records = sample();
        let refs: Vec<&JoinedRecord> = records.iter().collect();
        let groups = group_by(&refs, GroupBy::Unit);

        assert_eq!(groups.len(), 2);
        let first = &groups[0];
        assert_eq!(first.key, "3 BPM");
        assert_eq!(first.records, 2);
        assert_eq!(first.vehicles, 1);
        assert_eq!(first.liters_total, 60.0);
        assert_eq!(first.liters_mean, 30.0);
        assert_eq!(first.amount_total, 240.0);
        assert_eq!(first.amount_mean, 240.0);

        let second = &groups[1];
        assert_eq!(second.vehicles, 2);
        assert_eq!(second.liters_mean, 30.0);
        assert_eq!(second.amount_mean, 115.0);
    }

    #[test]
    fn test_group_by_fuel_type_and_month() {
        let records = sample();
        let refs: Vec<&JoinedRecord> = records.iter().collect();

        let by_fuel = group_by(&refs, GroupBy::FuelType);
        assert_eq!(by_fuel[0].key, "DIESEL");
        assert_eq!(by_fuel[0].records, 2);

        let by_month: Vec<String> = group_by(&refs, GroupBy::Month).into_iter().map(|g| g.key).collect();
        assert_eq!(by_month, vec!["2025-02", "2025-01", "N/A"]);
    }

    #[test]
    fn test_fuel_mix_and_monthly_series() {
        let records = sample();
        let refs: Vec<&JoinedRecord> = records.iter().collect();

        let mix = fuel_mix(&refs);
        assert_eq!(mix[0].fuel_type, "DIESEL");
        assert_eq!(mix[0].share, 60.0 / 90.0 * 100.0);

        let series = monthly_series(&refs);
        let months: Vec<(&str, &str)> = series.iter().map(|p| (p.month.as_str(), p.fuel_type.as_str())).collect();
        assert_eq!(
            months,
            vec![
                ("2025-01", "DIESEL"),
                ("2025-02", "DIESEL"),
                ("2025-02", "GASOLINA"),
                ("N/A", "GASOLINA"),
            ]
        );
    }

    #[test]
    fn test_mean_liters_per_vehicle_sums_per_plate_first() {
        let records = sample();
        let refs: Vec<&JoinedRecord> = records.iter().collect();
        // ABC1234: 60, DEF5678: 30, GHI9012: 0
        assert_eq!(mean_liters_per_vehicle(&refs), 30.0);
    }

    #[test]
    fn test_unit_heat_takes_coordinates_from_geo() {
        let mut with_geo = record("ABC1234", "3 BPM", "Diesel", Some(10.0), None, None);
        with_geo.geo = Some(UnitGeo {
            unit: "3º BPM".to_string(),
            location_name: "Arapiraca".to_string(),
            location_type: LocationType::Municipality,
            reference_city: None,
            latitude: Some(-9.75),
            longitude: Some(-36.66),
            flags: Vec::new(),
        });
        let other = record("DEF5678", "3 BPM", "Diesel", Some(5.0), None, None);
        let heat = unit_heat(&[&other, &with_geo]);
        assert_eq!(heat.len(), 1);
        assert_eq!(heat[0].liters, 15.0);
        assert_eq!(heat[0].latitude, Some(-9.75));
    }
}
