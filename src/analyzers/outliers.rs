use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::analyzers::types::Outlier;
use crate::analyzers::utility::{mean, stddev};
use crate::model::JoinedRecord;

pub const DEFAULT_THRESHOLD: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Liters,
    Amount,
}

impl Metric {
    fn value(&self, record: &JoinedRecord) -> Option<f64> {
        match self {
            Metric::Liters => record.fuel.liters,
            Metric::Amount => record.fuel.amount_spent,
        }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "liters" | "litros" => Ok(Metric::Liters),
            "amount" | "valor" => Ok(Metric::Amount),
            other => Err(format!("unknown metric '{other}' (liters, amount)")),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Metric::Liters => "liters",
            Metric::Amount => "amount",
        })
    }
}

/// Population z-scores, or `None` when there are fewer than two values or
/// the standard deviation is zero or not finite.
pub fn zscores(values: &[f64]) -> Option<Vec<f64>> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let sd = stddev(values, m);
    if !sd.is_finite() || sd == 0.0 {
        return None;
    }
    Some(values.iter().map(|v| (v - m) / sd).collect())
}

/// Flags transactions with `|z| > threshold`, largest value first.
///
/// Records sharing a source row (one wide-layout row split per fuel) are
/// summed into one transaction. Rows without any value for the metric are
/// left out of the statistics.
pub fn detect_outliers(records: &[&JoinedRecord], metric: Metric, threshold: f64) -> Vec<Outlier> {
    let mut rows: Vec<(&JoinedRecord, f64)> = Vec::new();
    let mut position: HashMap<usize, usize> = HashMap::new();
    for &record in records {
        let Some(value) = metric.value(record) else {
            continue;
        };
        match position.get(&record.fuel.source_row) {
            Some(&i) => rows[i].1 += value,
            None => {
                position.insert(record.fuel.source_row, rows.len());
                rows.push((record, value));
            }
        }
    }

    let values: Vec<f64> = rows.iter().map(|(_, v)| *v).collect();
    let Some(z) = zscores(&values) else {
        return Vec::new();
    };

    let mut out: Vec<Outlier> = rows
        .iter()
        .zip(z)
        .filter(|(_, z)| z.abs() > threshold)
        .map(|((record, value), z)| Outlier {
            source_row: record.fuel.source_row,
            plate: record.fuel.plate.clone(),
            unit_key: record.unit_key.clone(),
            value: *value,
            zscore: z,
        })
        .collect();
    out.sort_by(|a, b| b.value.total_cmp(&a.value).then(a.source_row.cmp(&b.source_row)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FuelRecord;

    fn record(row: usize, liters: Option<f64>) -> JoinedRecord {
        JoinedRecord {
            fuel: FuelRecord {
                source_row: row,
                plate: format!("AAA{row:04}"),
                unit: "3 BPM".to_string(),
                fuel_type: "Diesel".to_string(),
                liters,
                amount_spent: liters.map(|l| l * 6.0),
                date: None,
                flags: Vec::new(),
            },
            unit_key: "3 BPM".to_string(),
            fleet: None,
            geo: None,
            flags: Vec::new(),
        }
    }

    fn run(records: &[JoinedRecord], metric: Metric) -> Vec<Outlier> {
        let refs: Vec<&JoinedRecord> = records.iter().collect();
        detect_outliers(&refs, metric, DEFAULT_THRESHOLD)
    }

    #[test]
    fn test_flags_the_spike() {
        let mut records: Vec<JoinedRecord> = (2..11).map(|r| record(r, Some(10.0))).collect();
        records.push(record(11, Some(100.0)));

        let out = run(&records, Metric::Liters);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source_row, 11);
        assert_eq!(out[0].value, 100.0);
        assert_eq!(out[0].zscore, 3.0);
        assert_eq!(run(&records, Metric::Amount).len(), 1);
    }

    #[test]
    fn test_constant_values_and_tiny_inputs_flag_nothing() {
        let constant: Vec<JoinedRecord> = (2..20).map(|r| record(r, Some(7.0))).collect();
        assert!(run(&constant, Metric::Liters).is_empty());
        assert!(run(&[record(2, Some(1e9))], Metric::Liters).is_empty());
        assert!(run(&[], Metric::Liters).is_empty());
        assert_eq!(zscores(&[5.0, 5.0]), None);
    }

    #[test]
    fn test_missing_values_are_left_out() {
        let mut records: Vec<JoinedRecord> = (2..11).map(|r| record(r, Some(10.0))).collect();
        records.push(record(11, None));
        records.push(record(12, None));
        assert!(run(&records, Metric::Liters).is_empty());
    }

    #[test]
    fn test_records_of_one_row_are_summed() {
        let mut records: Vec<JoinedRecord> = (2..11).map(|r| record(r, Some(10.0))).collect();
        records.push(record(11, Some(50.0)));
        records.push(record(11, Some(50.0)));
        let out = run(&records, Metric::Liters);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value, 100.0);
    }

    #[test]
    fn test_threshold_is_strict() {
        let values = [1.0, 1.0, 1.0, 1.0, 100.0];
        let z = zscores(&values).unwrap();
        assert!((z[4] - 2.0).abs() < 1e-12);

        let records: Vec<JoinedRecord> = values
            .iter()
            .enumerate()
            .map(|(i, v)| record(i + 2, Some(*v)))
            .collect();
        assert!(run(&records, Metric::Liters).is_empty());

        let mut records: Vec<JoinedRecord> = (2..11).map(|r| record(r, Some(1.0))).collect();
        records.push(record(11, Some(100.0)));
        let out = run(&records, Metric::Liters);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source_row, 11);
        assert!((out[0].zscore - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_metric() {
        assert_eq!("Litros".parse::<Metric>(), Ok(Metric::Liters));
        assert!("km".parse::<Metric>().is_err());
    }
}
