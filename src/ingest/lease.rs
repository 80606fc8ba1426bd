use std::collections::HashSet;

use tracing::{debug, warn};

use super::{Parsed, manifest_for};
use crate::error::Result;
use crate::model::LeaseRate;
use crate::parser::parse_amount;
use crate::schema::{Concept, DeclaredSchema, SourceKind};
use crate::table::Table;

/// Parses the lease-rate table. Rows without a class or with an unreadable
/// rate are skipped; a rate table has no row to attach a flag to.
pub fn parse_lease_rates(table: &Table, declared: &DeclaredSchema) -> Result<Parsed<LeaseRate>> {
    let manifest = manifest_for(table, SourceKind::LeaseRates, declared, &HashSet::new())?;
    let class = manifest.index(Concept::StandardClass);
    let rate = manifest.index(Concept::MonthlyRate);

    let mut records = Vec::new();
    let mut skipped = 0;
    for row in &table.rows {
        let standard_class = row.get(class).trim();
        match parse_amount(row.get(rate)) {
            Some(monthly_rate) if !standard_class.is_empty() => records.push(LeaseRate {
                standard_class: standard_class.to_string(),
                monthly_rate,
            }),
            _ => {
                warn!(source = %table.name, line = row.line, "Lease rate row skipped");
                skipped += 1;
            }
        }
    }

    debug!(source = %table.name, records = records.len(), skipped, "Lease rates parsed");
    Ok(Parsed {
        manifest,
        records,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lease_rates() {
        let csv = "Padrão;Valor Mensal\nSUV;R$ 4.500,00\nSedan;?\n;100\nPicape 4x4;3200\n";
        let table = Table::from_csv_bytes("locacao.csv", csv.as_bytes()).unwrap();
        let parsed = parse_lease_rates(&table, &DeclaredSchema::default()).unwrap();
        assert_eq!(
            parsed.records,
            vec![
                LeaseRate {
                    standard_class: "SUV".to_string(),
                    monthly_rate: 4500.0
                },
                LeaseRate {
                    standard_class: "Picape 4x4".to_string(),
                    monthly_rate: 3200.0
                },
            ]
        );
        assert_eq!(parsed.skipped, 2);
    }
}
