use std::collections::HashSet;

use tracing::debug;

use super::{Parsed, manifest_for};
use crate::error::Result;
use crate::model::PersonnelRecord;
use crate::personnel::DEFAULT_STATUS;
use crate::schema::{Concept, DeclaredSchema, SourceKind};
use crate::table::{Row, Table};

/// One line of the functions roster: who holds which function grade.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionAssignment {
    pub war_name: String,
    pub function_grade: String,
}

fn cell(row: &Row, idx: Option<usize>) -> String {
    row.get(idx).trim().to_string()
}

/// Parses one personnel roster. Rows without a name are skipped. A roster
/// without a status column gets [`DEFAULT_STATUS`] on every row.
pub fn parse_personnel(table: &Table, declared: &DeclaredSchema) -> Result<Parsed<PersonnelRecord>> {
    let manifest = manifest_for(table, SourceKind::Personnel, declared, &HashSet::new())?;
    let registration = manifest.index(Concept::Registration);
    let name = manifest.index(Concept::Name);
    let war_name = manifest.index(Concept::WarName);
    let rank = manifest.index(Concept::Rank);
    let sector = manifest.index(Concept::Sector);
    let posting = manifest.index(Concept::Posting);
    let status = manifest.index(Concept::Status);
    let grade = manifest.index(Concept::FunctionGrade);

    let mut records = Vec::with_capacity(table.len());
    let mut skipped = 0;
    for row in &table.rows {
        let full_name = cell(row, name);
        if full_name.is_empty() {
            skipped += 1;
            continue;
        }
        let status = Some(cell(row, status))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_STATUS.to_string());

        records.push(PersonnelRecord {
            registration: cell(row, registration),
            name: full_name,
            war_name: cell(row, war_name),
            rank: cell(row, rank),
            sector: cell(row, sector),
            posting: cell(row, posting),
            status,
            function_grade: Some(cell(row, grade)).filter(|g| !g.is_empty()),
        });
    }

    debug!(source = %table.name, records = records.len(), skipped, "Personnel roster parsed");
    Ok(Parsed {
        manifest,
        records,
        skipped,
    })
}

pub fn parse_functions(table: &Table, declared: &DeclaredSchema) -> Result<Parsed<FunctionAssignment>> {
    let manifest = manifest_for(table, SourceKind::Functions, declared, &HashSet::new())?;
    let war_name = manifest.index(Concept::WarName);
    let grade = manifest.index(Concept::FunctionGrade);

    let mut records = Vec::new();
    let mut skipped = 0;
    for row in &table.rows {
        let (war_name, function_grade) = (cell(row, war_name), cell(row, grade));
        if war_name.is_empty() || function_grade.is_empty() {
            skipped += 1;
            continue;
        }
        records.push(FunctionAssignment {
            war_name,
            function_grade,
        });
    }

    Ok(Parsed {
        manifest,
        records,
        skipped,
    })
}
