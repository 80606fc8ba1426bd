//! Personnel rosters: merge, function grades, search and headcounts.
//!
//! Records carry no CPF; the parser never reads that column.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::ingest::FunctionAssignment;
use crate::model::PersonnelRecord;
use crate::normalize::fold_text;

/// Status of a posting not yet published in a bulletin.
pub const DEFAULT_STATUS: &str = "SEM BGO";
pub const STATUS_OPTIONS: [&str; 3] = ["CLASSIFICADO", "VAGA CORRETA", DEFAULT_STATUS];

/// Concatenates rosters, keeping the first record per registration.
/// Records without a registration are never treated as duplicates.
pub fn merge_rosters(rosters: Vec<Vec<PersonnelRecord>>) -> Vec<PersonnelRecord> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::new();
    let mut duplicates = 0usize;
    for record in rosters.into_iter().flatten() {
        let key = record.registration.trim().to_string();
        if !key.is_empty() && !seen.insert(key) {
            duplicates += 1;
            continue;
        }
        merged.push(record);
    }
    debug!(records = merged.len(), duplicates, "Rosters merged");
    merged
}

/// Fills missing function grades by war name (folded, first entry wins).
pub fn attach_function_grades(records: &mut [PersonnelRecord], functions: &[FunctionAssignment]) {
    let mut by_name: HashMap<String, &str> = HashMap::new();
    for f in functions {
        by_name
            .entry(fold_text(&f.war_name))
            .or_insert(f.function_grade.as_str());
    }
    for record in records.iter_mut().filter(|r| r.function_grade.is_none()) {
        if let Some(grade) = by_name.get(&fold_text(&record.war_name)) {
            record.function_grade = Some(grade.to_string());
        }
    }
}

/// Case and accent insensitive substring search over name, registration,
/// war name, rank, sector and posting. An empty query matches everyone.
pub fn search<'a>(records: &'a [PersonnelRecord], query: &str) -> Vec<&'a PersonnelRecord> {
    let needle = fold_text(query);
    if needle.is_empty() {
        return records.iter().collect();
    }
    records
        .iter()
        .filter(|r| {
            [&r.name, &r.registration, &r.war_name, &r.rank, &r.sector, &r.posting]
                .iter()
                .any(|field| fold_text(field).contains(&needle))
        })
        .collect()
}

/// Keeps records whose status is one of `statuses` (folded). Empty keeps all.
pub fn filter_status<'a>(records: Vec<&'a PersonnelRecord>, statuses: &[String]) -> Vec<&'a PersonnelRecord> {
    if statuses.is_empty() {
        return records;
    }
    let wanted: HashSet<String> = statuses.iter().map(|s| fold_text(s)).collect();
    records
        .into_iter()
        .filter(|r| wanted.contains(&fold_text(&r.status)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonnelSummary {
    pub headcount: usize,
    pub sectors: usize,
    /// Largest sector first.
    pub by_sector: Vec<(String, usize)>,
    pub by_rank: Vec<(String, usize)>,
    pub by_status: Vec<(String, usize)>,
}

fn counts<'a>(values: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut map: BTreeMap<String, usize> = BTreeMap::new();
    for v in values.filter(|v| !v.trim().is_empty()) {
        *map.entry(v.trim().to_string()).or_default() += 1;
    }
    let mut out: Vec<(String, usize)> = map.into_iter().collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}

pub fn summarize(records: &[&PersonnelRecord]) -> PersonnelSummary {
    let by_sector = counts(records.iter().map(|r| r.sector.as_str()));
    PersonnelSummary {
        headcount: records.len(),
        sectors: by_sector.len(),
        by_sector,
        by_rank: counts(records.iter().map(|r| r.rank.as_str())),
        by_status: counts(records.iter().map(|r| r.status.as_str())),
    }
}
