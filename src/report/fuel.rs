use std::path::{Path, PathBuf};

use serde::Serialize;
use tabled::Tabled;

use super::render::{fixed, money, optional, preview_table, thousands};
use crate::analyzers::types::{FuelMix, GroupSummary, MonthlyPoint, Outlier, UnitHeat};
use crate::error::Result;
use crate::join::{JoinAmbiguity, JoinSide};
use crate::model::{JoinedRecord, flag_codes};
use crate::output::{write_csv, write_json};
use crate::pipeline::FuelReport;

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct KpiRow {
    #[serde(rename = "Metric")]
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct GroupRow {
    #[serde(rename = "Group")]
    #[tabled(rename = "Group")]
    pub key: String,
    #[serde(rename = "Records")]
    #[tabled(rename = "Records")]
    pub records: usize,
    #[serde(rename = "Vehicles")]
    #[tabled(rename = "Vehicles")]
    pub vehicles: usize,
    #[serde(rename = "LitersTotal")]
    #[tabled(rename = "LitersTotal")]
    pub liters_total: String,
    #[serde(rename = "LitersMean")]
    #[tabled(rename = "LitersMean")]
    pub liters_mean: String,
    #[serde(rename = "AmountTotal")]
    #[tabled(rename = "AmountTotal")]
    pub amount_total: String,
    #[serde(rename = "AmountMean")]
    #[tabled(rename = "AmountMean")]
    pub amount_mean: String,
}

impl From<&GroupSummary> for GroupRow {
    fn from(g: &GroupSummary) -> Self {
        Self {
            key: g.key.clone(),
            records: g.records,
            vehicles: g.vehicles,
            liters_total: fixed(g.liters_total),
            liters_mean: fixed(g.liters_mean),
            amount_total: fixed(g.amount_total),
            amount_mean: fixed(g.amount_mean),
        }
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct OutlierRow {
    #[serde(rename = "Row")]
    #[tabled(rename = "Row")]
    pub source_row: usize,
    #[serde(rename = "Plate")]
    #[tabled(rename = "Plate")]
    pub plate: String,
    #[serde(rename = "Unit")]
    #[tabled(rename = "Unit")]
    pub unit: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: String,
    #[serde(rename = "ZScore")]
    #[tabled(rename = "ZScore")]
    pub zscore: String,
}

impl From<&Outlier> for OutlierRow {
    fn from(o: &Outlier) -> Self {
        Self {
            source_row: o.source_row,
            plate: o.plate.clone(),
            unit: o.unit_key.clone(),
            value: fixed(o.value),
            zscore: fixed(o.zscore),
        }
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct FuelMixRow {
    #[serde(rename = "FuelType")]
    #[tabled(rename = "FuelType")]
    pub fuel_type: String,
    #[serde(rename = "Liters")]
    #[tabled(rename = "Liters")]
    pub liters: String,
    #[serde(rename = "SharePct")]
    #[tabled(rename = "SharePct")]
    pub share: String,
}

impl From<&FuelMix> for FuelMixRow {
    fn from(m: &FuelMix) -> Self {
        Self {
            fuel_type: m.fuel_type.clone(),
            liters: fixed(m.liters),
            share: fixed(m.share),
        }
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct MonthlyRow {
    #[serde(rename = "Month")]
    #[tabled(rename = "Month")]
    pub month: String,
    #[serde(rename = "FuelType")]
    #[tabled(rename = "FuelType")]
    pub fuel_type: String,
    #[serde(rename = "Liters")]
    #[tabled(rename = "Liters")]
    pub liters: String,
}

impl From<&MonthlyPoint> for MonthlyRow {
    fn from(p: &MonthlyPoint) -> Self {
        Self {
            month: p.month.clone(),
            fuel_type: p.fuel_type.clone(),
            liters: fixed(p.liters),
        }
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct HeatRow {
    #[serde(rename = "Unit")]
    #[tabled(rename = "Unit")]
    pub unit: String,
    #[serde(rename = "Liters")]
    #[tabled(rename = "Liters")]
    pub liters: String,
    #[serde(rename = "Latitude")]
    #[tabled(rename = "Latitude")]
    pub latitude: String,
    #[serde(rename = "Longitude")]
    #[tabled(rename = "Longitude")]
    pub longitude: String,
}

impl From<&UnitHeat> for HeatRow {
    fn from(h: &UnitHeat) -> Self {
        let coord = |v: Option<f64>| v.map(|c| format!("{c:.6}")).unwrap_or_default();
        Self {
            unit: h.unit_key.clone(),
            liters: fixed(h.liters),
            latitude: coord(h.latitude),
            longitude: coord(h.longitude),
        }
    }
}

/// Flat export of a joined record. CSV-friendly: no nested values.
#[derive(Debug, Serialize, Tabled, Clone)]
pub struct JoinedRow {
    #[serde(rename = "Row")]
    #[tabled(rename = "Row")]
    pub source_row: usize,
    #[serde(rename = "Date")]
    #[tabled(rename = "Date")]
    pub date: String,
    #[serde(rename = "Plate")]
    #[tabled(rename = "Plate")]
    pub plate: String,
    #[serde(rename = "Unit")]
    #[tabled(rename = "Unit")]
    pub unit: String,
    #[serde(rename = "UnitKey")]
    #[tabled(rename = "UnitKey")]
    pub unit_key: String,
    #[serde(rename = "FuelType")]
    #[tabled(rename = "FuelType")]
    pub fuel_type: String,
    #[serde(rename = "Liters")]
    #[tabled(rename = "Liters")]
    pub liters: String,
    #[serde(rename = "Amount")]
    #[tabled(rename = "Amount")]
    pub amount: String,
    #[serde(rename = "Ownership")]
    #[tabled(rename = "Ownership")]
    pub ownership: String,
    #[serde(rename = "StandardClass")]
    #[tabled(rename = "StandardClass")]
    pub standard_class: String,
    #[serde(rename = "MonthlyLeaseCost")]
    #[tabled(rename = "MonthlyLeaseCost")]
    pub monthly_lease_cost: String,
    #[serde(rename = "Characterization")]
    #[tabled(rename = "Characterization")]
    pub characterization: String,
    #[serde(rename = "Location")]
    #[tabled(rename = "Location")]
    pub location: String,
    #[serde(rename = "Flags")]
    #[tabled(rename = "Flags")]
    pub flags: String,
}

impl From<&JoinedRecord> for JoinedRow {
    fn from(r: &JoinedRecord) -> Self {
        Self {
            source_row: r.fuel.source_row,
            date: r.fuel.date.map(|d| d.to_string()).unwrap_or_default(),
            plate: r.fuel.plate.clone(),
            unit: r.fuel.unit.clone(),
            unit_key: r.unit_key.clone(),
            fuel_type: r.fuel.fuel_type.clone(),
            liters: optional(r.fuel.liters),
            amount: optional(r.fuel.amount_spent),
            ownership: r.ownership().to_string(),
            standard_class: r.standard_class().to_string(),
            monthly_lease_cost: fixed(r.monthly_lease_cost()),
            characterization: r.characterization().to_string(),
            location: r.location_name().to_string(),
            flags: flag_codes(&r.flags),
        }
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct AmbiguityRow {
    #[serde(rename = "Side")]
    #[tabled(rename = "Side")]
    pub side: String,
    #[serde(rename = "Key")]
    #[tabled(rename = "Key")]
    pub key: String,
    #[serde(rename = "Candidates")]
    #[tabled(rename = "Candidates")]
    pub candidates: usize,
}

impl From<&JoinAmbiguity> for AmbiguityRow {
    fn from(a: &JoinAmbiguity) -> Self {
        Self {
            side: match a.side {
                JoinSide::Fleet => "fleet",
                JoinSide::Geo => "geo",
            }
            .to_string(),
            key: a.key.clone(),
            candidates: a.candidates,
        }
    }
}

fn rows<'a, S: 'a, R: From<&'a S>>(items: &'a [S]) -> Vec<R> {
    items.iter().map(R::from).collect()
}

/// Headline figures, formatted the way the dashboard cards show them.
pub fn kpis(report: &FuelReport) -> Vec<KpiRow> {
    let s = &report.stats;
    let kpi = |metric: &str, value: String| KpiRow {
        metric: metric.to_string(),
        value,
    };
    vec![
        kpi("Records", s.records.to_string()),
        kpi("Vehicles", s.vehicles.to_string()),
        kpi("Units", s.units.to_string()),
        kpi("Total liters (L)", thousands(s.total_liters, 0)),
        kpi("Total spent", money(s.total_spent)),
        kpi("Mean per vehicle (L)", thousands(s.mean_liters_per_vehicle, 1)),
        kpi("Fleet match", format!("{:.1}%", s.fleet_match_pct())),
        kpi("Unit match", format!("{:.1}%", s.geo_match_pct())),
        kpi(
            "Outliers",
            format!("{} ({} > {}σ)", s.outliers, report.metric, report.threshold),
        ),
    ]
}

pub fn render(report: &FuelReport, max_rows: usize) {
    preview_table("Key figures", report.stats.filter.as_deref(), &kpis(report), max_rows);
    preview_table(
        &format!("Consumption by {}", report.group_by),
        None,
        &rows::<_, GroupRow>(&report.groups),
        max_rows,
    );
    preview_table("Fuel mix", None, &rows::<_, FuelMixRow>(&report.fuel_mix), max_rows);
    preview_table("Monthly consumption", None, &rows::<_, MonthlyRow>(&report.monthly), max_rows);
    preview_table(
        "Anomalies",
        Some(&format!("|z| > {} on {}", report.threshold, report.metric)),
        &rows::<_, OutlierRow>(&report.outliers),
        max_rows,
    );
    if !report.ambiguities.is_empty() {
        preview_table(
            "Ambiguous join keys",
            Some("first candidate used unless the unit settled it"),
            &rows::<_, AmbiguityRow>(&report.ambiguities),
            max_rows,
        );
    }
}

/// Writes every fuel table under `dir`. Returns the files written.
pub fn export(report: &FuelReport, dir: &Path, gzip: bool) -> Result<Vec<PathBuf>> {
    Ok(vec![
        write_csv(dir, "fuel_records", &rows::<_, JoinedRow>(&report.records), gzip)?,
        write_csv(dir, &format!("fuel_by_{}", report.group_by), &rows::<_, GroupRow>(&report.groups), gzip)?,
        write_csv(dir, "fuel_mix", &rows::<_, FuelMixRow>(&report.fuel_mix), gzip)?,
        write_csv(dir, "fuel_monthly", &rows::<_, MonthlyRow>(&report.monthly), gzip)?,
        write_csv(dir, "fuel_outliers", &rows::<_, OutlierRow>(&report.outliers), gzip)?,
        write_csv(dir, "fuel_heatmap", &rows::<_, HeatRow>(&report.heat), gzip)?,
        write_json(dir, "fuel_summary", &report.stats, gzip)?,
    ])
}
