use std::path::{Path, PathBuf};

use serde::Serialize;
use tabled::Tabled;

use super::fleet::CountRow;
use super::render::preview_table;
use crate::error::Result;
use crate::model::{NOT_AVAILABLE, PersonnelRecord};
use crate::output::{write_csv, write_json};
use crate::pipeline::PersonnelReport;

/// Exported roster line. Never carries CPF.
#[derive(Debug, Serialize, Tabled, Clone)]
pub struct PersonnelRow {
    #[serde(rename = "Registration")]
    #[tabled(rename = "Registration")]
    pub registration: String,
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: String,
    #[serde(rename = "Name")]
    #[tabled(rename = "Name")]
    pub name: String,
    #[serde(rename = "WarName")]
    #[tabled(rename = "WarName")]
    pub war_name: String,
    #[serde(rename = "Sector")]
    #[tabled(rename = "Sector")]
    pub sector: String,
    #[serde(rename = "Posting")]
    #[tabled(rename = "Posting")]
    pub posting: String,
    #[serde(rename = "Status")]
    #[tabled(rename = "Status")]
    pub status: String,
    #[serde(rename = "FunctionGrade")]
    #[tabled(rename = "FunctionGrade")]
    pub function_grade: String,
}

impl From<&PersonnelRecord> for PersonnelRow {
    fn from(p: &PersonnelRecord) -> Self {
        Self {
            registration: p.registration.clone(),
            rank: p.rank.clone(),
            name: p.name.clone(),
            war_name: p.war_name.clone(),
            sector: p.sector.clone(),
            posting: p.posting.clone(),
            status: p.status.clone(),
            function_grade: p
                .function_grade
                .clone()
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        }
    }
}

fn counts(pairs: &[(String, usize)]) -> Vec<CountRow> {
    pairs
        .iter()
        .map(|(name, count)| CountRow {
            name: name.clone(),
            count: *count,
        })
        .collect()
}

pub fn render(report: &PersonnelReport, max_rows: usize) {
    let s = &report.summary;
    let note = format!("{} people in {} sectors", s.headcount, s.sectors);
    let roster: Vec<PersonnelRow> = report.records.iter().map(PersonnelRow::from).collect();
    preview_table("Roster", Some(&note), &roster, max_rows);
    preview_table("By sector", None, &counts(&s.by_sector), max_rows);
    preview_table("By rank", None, &counts(&s.by_rank), max_rows);
    preview_table("By status", None, &counts(&s.by_status), max_rows);
}

pub fn export(report: &PersonnelReport, dir: &Path, gzip: bool) -> Result<Vec<PathBuf>> {
    let roster: Vec<PersonnelRow> = report.records.iter().map(PersonnelRow::from).collect();
    Ok(vec![
        write_csv(dir, "personnel", &roster, gzip)?,
        write_csv(dir, "personnel_by_sector", &counts(&report.summary.by_sector), gzip)?,
        write_csv(dir, "personnel_by_rank", &counts(&report.summary.by_rank), gzip)?,
        write_json(dir, "personnel_summary", &report.summary, gzip)?,
    ])
}
