//! Data types produced by the analyzers.

use std::collections::BTreeMap;

use serde::Serialize;

/// Totals for one group of joined records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub key: String,
    pub records: usize,
    /// Distinct normalized plates in the group.
    pub vehicles: usize,
    pub liters_total: f64,
    /// Mean over records that have a liters value.
    pub liters_mean: f64,
    pub amount_total: f64,
    pub amount_mean: f64,
}

/// A transaction whose metric deviates from the mean by more than the threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outlier {
    pub source_row: usize,
    pub plate: String,
    pub unit_key: String,
    pub value: f64,
    pub zscore: f64,
}

/// Share of the total liters per fuel type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuelMix {
    pub fuel_type: String,
    pub liters: f64,
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyPoint {
    /// `YYYY-MM`, or `N/A` for undated records.
    pub month: String,
    pub fuel_type: String,
    pub liters: f64,
}

/// Liters per unit with the unit's coordinates, for heat maps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitHeat {
    pub unit_key: String,
    pub liters: f64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitAllocation {
    pub unit: String,
    pub vehicles: usize,
    pub entities: usize,
    pub ratio: f64,
    pub fair_share: f64,
    /// Positive for a surplus, negative for a deficit.
    pub deviation: f64,
    /// Vehicle count once every suggested move is applied.
    pub vehicles_after: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VehicleMove {
    pub from: String,
    pub to: String,
    pub vehicles: usize,
}

/// Advisory reallocation of vehicles toward the mean vehicles-per-entity ratio.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedistributionPlan {
    pub mean_ratio: f64,
    pub units: Vec<UnitAllocation>,
    pub moves: Vec<VehicleMove>,
    /// Units that have vehicles but no entities; left out of the ratio.
    pub excluded: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitFleet {
    pub unit: String,
    pub vehicles: usize,
    pub owned: usize,
    pub leased: usize,
    pub unknown_ownership: usize,
    pub monthly_lease_cost: f64,
}

/// A plate listed on more than one fleet row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicatePlate {
    pub plate: String,
    pub rows: Vec<usize>,
    pub units: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetSummary {
    pub rows: usize,
    pub vehicles: usize,
    pub owned: usize,
    pub leased: usize,
    pub monthly_lease_cost: f64,
    pub units: Vec<UnitFleet>,
    pub duplicates: Vec<DuplicatePlate>,
    pub characterization: BTreeMap<String, usize>,
}
