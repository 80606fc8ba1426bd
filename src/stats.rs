use chrono::{DateTime, Utc};
use serde::Serialize;

use std::collections::BTreeSet;

use crate::analyzers::aggregate::mean_liters_per_vehicle;
use crate::model::{JoinedRecord, RowFlag};
use crate::normalize::normalize_plate;

/// One row of the run history: headline figures of a fuel run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct FuelStats {
    pub timestamp: DateTime<Utc>,
    pub fuel_source: Option<String>,
    pub filter: Option<String>,
    pub records: usize,

    // totals
    pub vehicles: usize,
    pub units: usize,
    pub total_liters: f64,
    pub total_spent: f64,
    pub mean_liters_per_vehicle: f64,
    pub outliers: usize,

    // join coverage
    pub fleet_matched: usize,
    pub geo_matched: usize,

    // flags
    pub unparseable: usize,
    pub missing_plate: usize,
    pub unmatched_plate: usize,
    pub ambiguous_plate: usize,
    pub unmatched_unit: usize,
    pub ambiguous_unit: usize,
    pub alias_conflict: usize,

    // error tracking
    pub error_type: Option<String>,
    pub error_message: Option<String>,
}

impl FuelStats {
    pub fn from_records(records: &[&JoinedRecord]) -> Self {
        let mut s = FuelStats {
            timestamp: Utc::now(),
            records: records.len(),
            ..Default::default()
        };

        let mut plates = BTreeSet::new();
        let mut units = BTreeSet::new();

        for r in records {
            s.total_liters += r.fuel.liters.unwrap_or(0.0);
            s.total_spent += r.fuel.amount_spent.unwrap_or(0.0);

            let plate = normalize_plate(&r.fuel.plate);
            if !plate.is_empty() {
                plates.insert(plate);
            }
            units.insert(r.unit_key.as_str());

            if r.fleet.is_some() {
                s.fleet_matched += 1;
            }
            if r.geo.is_some() {
                s.geo_matched += 1;
            }

            for flag in &r.flags {
                match flag {
                    RowFlag::Unparseable { .. } => s.unparseable += 1,
                    RowFlag::MissingPlate => s.missing_plate += 1,
                    RowFlag::UnmatchedPlate => s.unmatched_plate += 1,
                    RowFlag::AmbiguousPlate { .. } => s.ambiguous_plate += 1,
                    RowFlag::UnmatchedUnit => s.unmatched_unit += 1,
                    RowFlag::AmbiguousUnit { .. } => s.ambiguous_unit += 1,
                    RowFlag::AliasConflict { .. } => s.alias_conflict += 1,
                    RowFlag::MissingLeaseRate { .. } => {}
                }
            }
        }

        s.vehicles = plates.len();
        s.units = units.len();
        s.mean_liters_per_vehicle = mean_liters_per_vehicle(records);
        s
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    pub fn fleet_match_pct(&self) -> f64 {
        Self::pct(self.fleet_matched, self.records)
    }

    pub fn geo_match_pct(&self) -> f64 {
        Self::pct(self.geo_matched, self.records)
    }

    /// Create an error record with timestamp and error information
    pub fn from_error(error_type: &str, error_message: &str) -> Self {
        FuelStats {
            timestamp: Utc::now(),
            error_type: Some(error_type.to_string()),
            error_message: Some(error_message.to_string()),
            ..Default::default()
        }
    }

    pub fn with_outliers(mut self, outliers: usize) -> Self {
        self.outliers = outliers;
        self
    }

    /// Set run metadata (source and filter description)
    pub fn with_run_info(mut self, fuel_source: &str, filter: &str) -> Self {
        self.fuel_source = Some(fuel_source.to_string());
        self.filter = (!filter.is_empty()).then(|| filter.to_string());
        self
    }
}
