use std::collections::{BTreeSet, HashSet};
use std::fmt;

use chrono::NaiveDate;

use crate::model::JoinedRecord;
use crate::normalize::{UnitNormalizer, fold_text};

/// A selection over joined records. Empty selections mean "all".
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    units: HashSet<String>,
    fuel_types: HashSet<String>,
}

impl RecordFilter {
    pub fn between(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    /// Units are compared by canonical key, so `3º BPM` selects `3 BPM`.
    pub fn units<S: AsRef<str>>(mut self, units: &[S], normalizer: &UnitNormalizer) -> Self {
        self.units = units.iter().map(|u| normalizer.key(u.as_ref())).collect();
        self
    }

    pub fn fuel_types<S: AsRef<str>>(mut self, fuel_types: &[S]) -> Self {
        self.fuel_types = fuel_types.iter().map(|f| fold_text(f.as_ref())).collect();
        self
    }

    /// Undated rows only pass when no date bound is set.
    pub fn matches(&self, record: &JoinedRecord) -> bool {
        if self.from.is_some() || self.to.is_some() {
            let Some(date) = record.fuel.date else {
                return false;
            };
            if self.from.is_some_and(|from| date < from) || self.to.is_some_and(|to| date > to) {
                return false;
            }
        }
        if !self.units.is_empty() && !self.units.contains(&record.unit_key) {
            return false;
        }
        if !self.fuel_types.is_empty() && !self.fuel_types.contains(&fold_text(&record.fuel.fuel_type)) {
            return false;
        }
        true
    }

    pub fn apply<'a>(&self, records: &'a [JoinedRecord]) -> Vec<&'a JoinedRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}

/// `from=.. to=.. units=A|B fuel=X`, empty when nothing is selected.
impl fmt::Display for RecordFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(from) = self.from {
            parts.push(format!("from={from}"));
        }
        if let Some(to) = self.to {
            parts.push(format!("to={to}"));
        }
        if !self.units.is_empty() {
            let units: BTreeSet<&str> = self.units.iter().map(String::as_str).collect();
            parts.push(format!("units={}", units.into_iter().collect::<Vec<_>>().join("|")));
        }
        if !self.fuel_types.is_empty() {
            let fuels: BTreeSet<&str> = self.fuel_types.iter().map(String::as_str).collect();
            parts.push(format!("fuel={}", fuels.into_iter().collect::<Vec<_>>().join("|")));
        }
        f.write_str(&parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FuelRecord;
    use crate::normalize::AliasRuleSet;

    fn record(unit_key: &str, fuel_type: &str, date: Option<NaiveDate>) -> JoinedRecord {
        JoinedRecord {
            fuel: FuelRecord {
                source_row: 2,
                plate: "ABC1234".to_string(),
                unit: unit_key.to_string(),
                fuel_type: fuel_type.to_string(),
                liters: Some(1.0),
                amount_spent: None,
                date,
                flags: Vec::new(),
            },
            unit_key: unit_key.to_string(),
            fleet: None,
            geo: None,
            flags: Vec::new(),
        }
    }

    fn day(d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2025, 3, d)
    }

    #[test]
    fn test_empty_filter_keeps_everything() {
        let records = vec![record("3 BPM", "Diesel", None), record("1 BPM", "Gasolina", day(1))];
        assert_eq!(RecordFilter::default().apply(&records).len(), 2);
    }

    #[test]
    fn test_date_range_is_inclusive_and_drops_undated_rows() {
        let records = vec![
            record("3 BPM", "Diesel", day(1)),
            record("3 BPM", "Diesel", day(15)),
            record("3 BPM", "Diesel", day(31)),
            record("3 BPM", "Diesel", None),
        ];
        let filter = RecordFilter::default().between(day(1), day(15));
        let kept: Vec<_> = filter.apply(&records).iter().map(|r| r.fuel.date).collect();
        assert_eq!(kept, vec![day(1), day(15)]);
    }

    #[test]
    fn test_units_and_fuel_types_compare_normalized() {
        let normalizer = UnitNormalizer::new(AliasRuleSet::builtin().unwrap());
        let records = vec![
            record("3 BPM", "Álcool", None),
            record("3 BPM", "Diesel", None),
            record("1 BPM", "Álcool", None),
        ];
        let filter = RecordFilter::default()
            .units(&["3º BPM"], &normalizer)
            .fuel_types(&["alcool"]);
        let kept = filter.apply(&records);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].fuel.fuel_type, "Álcool");
    }

    #[test]
    fn test_display_describes_the_selection() {
        let normalizer = UnitNormalizer::new(AliasRuleSet::builtin().unwrap());
        assert_eq!(RecordFilter::default().to_string(), "");
        let filter = RecordFilter::default()
            .between(day(1), None)
            .units(&["3º BPM", "1 BPM"], &normalizer)
            .fuel_types(&["diesel"]);
        assert_eq!(filter.to_string(), "from=2025-03-01 units=1 BPM|3 BPM fuel=DIESEL");
    }
}
