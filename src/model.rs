//! Value objects passed between pipeline stages.
//!
//! Records are built once by the ingest parsers and never mutated after the
//! join; each stage takes them by reference and produces new values.

use chrono::NaiveDate;
use serde::Serialize;

/// Placeholder for text fields whose right-side match is missing.
pub const NOT_FOUND: &str = "NOT FOUND";
/// Placeholder for optional text fields with no value.
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnershipKind {
    Owned,
    Leased,
}

impl OwnershipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnershipKind::Owned => "OWNED",
            OwnershipKind::Leased => "LEASED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationType {
    Municipality,
    Neighborhood,
}

/// How an ambiguous plate match was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Exactly one candidate shared the fuel record's unit.
    UnitMatch,
    /// No unit tie-break; the first candidate in source order was used.
    SourceOrder,
}

/// A per-row anomaly. Flags never abort a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowFlag {
    Unparseable { column: String, value: String },
    MissingPlate,
    UnmatchedPlate,
    AmbiguousPlate {
        candidates: usize,
        chosen_unit: String,
        resolved_by: Resolution,
    },
    UnmatchedUnit,
    AmbiguousUnit { candidates: usize },
    AliasConflict { rules: Vec<String> },
    MissingLeaseRate { standard_class: String },
}

impl RowFlag {
    pub fn code(&self) -> &'static str {
        match self {
            RowFlag::Unparseable { .. } => "unparseable",
            RowFlag::MissingPlate => "missing_plate",
            RowFlag::UnmatchedPlate => "unmatched_plate",
            RowFlag::AmbiguousPlate { .. } => "ambiguous_plate",
            RowFlag::UnmatchedUnit => "unmatched_unit",
            RowFlag::AmbiguousUnit { .. } => "ambiguous_unit",
            RowFlag::AliasConflict { .. } => "alias_conflict",
            RowFlag::MissingLeaseRate { .. } => "missing_lease_rate",
        }
    }

    pub fn unparseable(column: &str, value: impl Into<String>) -> Self {
        RowFlag::Unparseable {
            column: column.to_string(),
            value: value.into(),
        }
    }
}

/// Joins flag codes for flat exports, e.g. `unmatched_plate|unparseable`.
pub fn flag_codes(flags: &[RowFlag]) -> String {
    flags.iter().map(RowFlag::code).collect::<Vec<_>>().join("|")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuelRecord {
    /// 1-based line in the source, header included.
    pub source_row: usize,
    pub plate: String,
    pub unit: String,
    pub fuel_type: String,
    /// `None` when the cell was blank or unparseable (the latter is flagged).
    pub liters: Option<f64>,
    pub amount_spent: Option<f64>,
    pub date: Option<NaiveDate>,
    pub flags: Vec<RowFlag>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetRecord {
    pub source_row: usize,
    pub plate: String,
    pub unit: String,
    pub ownership_kind: Option<OwnershipKind>,
    pub standard_class: String,
    pub monthly_lease_cost: Option<f64>,
    pub characterization: String,
    pub flags: Vec<RowFlag>,
}

impl FleetRecord {
    pub fn is_leased(&self) -> bool {
        self.ownership_kind == Some(OwnershipKind::Leased)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitGeo {
    pub unit: String,
    pub location_name: String,
    pub location_type: LocationType,
    pub reference_city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub flags: Vec<RowFlag>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaseRate {
    pub standard_class: String,
    pub monthly_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonnelRecord {
    pub registration: String,
    pub name: String,
    pub war_name: String,
    pub rank: String,
    pub sector: String,
    pub posting: String,
    pub status: String,
    pub function_grade: Option<String>,
}

/// One fuel record with its (optional) fleet and geo matches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinedRecord {
    pub fuel: FuelRecord,
    /// Canonical unit used for grouping, filtering and the geo join.
    pub unit_key: String,
    pub fleet: Option<FleetRecord>,
    pub geo: Option<UnitGeo>,
    /// Parse flags of the fuel row followed by join flags.
    pub flags: Vec<RowFlag>,
}

impl JoinedRecord {
    pub fn standard_class(&self) -> &str {
        self.fleet.as_ref().map_or(NOT_FOUND, |f| f.standard_class.as_str())
    }

    pub fn characterization(&self) -> &str {
        self.fleet.as_ref().map_or(NOT_FOUND, |f| f.characterization.as_str())
    }

    pub fn ownership(&self) -> &str {
        self.fleet
            .as_ref()
            .and_then(|f| f.ownership_kind)
            .map_or(NOT_AVAILABLE, |k| k.as_str())
    }

    pub fn monthly_lease_cost(&self) -> f64 {
        self.fleet
            .as_ref()
            .and_then(|f| f.monthly_lease_cost)
            .unwrap_or(0.0)
    }

    pub fn location_name(&self) -> &str {
        self.geo.as_ref().map_or(NOT_FOUND, |g| g.location_name.as_str())
    }

    pub fn has_flag(&self, code: &str) -> bool {
        self.flags.iter().any(|f| f.code() == code)
    }
}
