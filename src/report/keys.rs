use serde::Serialize;
use tabled::Tabled;

use super::render::preview_table;
use crate::normalize::{AliasRule, AliasRuleSet, UnitNormalizer, normalize_plate};

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct RuleRow {
    #[tabled(rename = "Id")]
    pub id: String,
    #[tabled(rename = "Enabled")]
    pub enabled: bool,
    #[tabled(rename = "Pattern")]
    pub pattern: String,
    #[tabled(rename = "Canonical")]
    pub canonical: String,
    #[tabled(rename = "Examples")]
    pub examples: usize,
    #[tabled(rename = "Note")]
    pub note: String,
}

impl From<&AliasRule> for RuleRow {
    fn from(r: &AliasRule) -> Self {
        Self {
            id: r.id.clone(),
            enabled: r.enabled,
            pattern: r.pattern().to_string(),
            canonical: r.canonical.clone(),
            examples: r.examples.len(),
            note: r.note.clone().unwrap_or_default(),
        }
    }
}

/// Canonical keys of one ad-hoc input.
#[derive(Debug, Serialize, Tabled, Clone)]
pub struct KeyRow {
    #[tabled(rename = "Input")]
    pub input: String,
    #[tabled(rename = "Plate")]
    pub plate: String,
    #[tabled(rename = "Unit")]
    pub unit: String,
    #[tabled(rename = "Rule")]
    pub rule: String,
    #[tabled(rename = "Conflicts")]
    pub conflicts: String,
}

pub fn key_row(input: &str, normalizer: &UnitNormalizer) -> KeyRow {
    let unit = normalizer.normalize(input);
    KeyRow {
        input: input.to_string(),
        plate: normalize_plate(input),
        unit: unit.value,
        rule: unit.rule.unwrap_or_default(),
        conflicts: unit.conflicts.join(", "),
    }
}

/// Examples and fixed points are checked at load for enabled rules only.
pub fn rules_note(rules: &AliasRuleSet) -> String {
    format!(
        "version {}, {} of {} enabled, enabled rules verified",
        rules.version(),
        rules.enabled().count(),
        rules.rules().len()
    )
}

pub fn render_rules(rules: &AliasRuleSet) {
    let rows: Vec<RuleRow> = rules.rules().iter().map(RuleRow::from).collect();
    preview_table("Unit alias rules", Some(&rules_note(rules)), &rows, rows.len());
}

pub fn render_keys(inputs: &[String], normalizer: &UnitNormalizer) {
    let rows: Vec<KeyRow> = inputs.iter().map(|i| key_row(i, normalizer)).collect();
    preview_table("Canonical keys", None, &rows, rows.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_row_shows_both_keys() {
        let normalizer = UnitNormalizer::new(AliasRuleSet::builtin().unwrap());
        let row = key_row("3ª CPM/I", &normalizer);
        assert_eq!(row.unit, "3 CPMI");
        assert_eq!(row.rule, "cpmi");
        assert_eq!(row.plate, "3CPMI");
        assert_eq!(row.conflicts, "");
    }

    #[test]
    fn test_rules_note_counts_enabled_rules() {
        let rules = AliasRuleSet::builtin().unwrap();
        let note = rules_note(&rules);
        let enabled = rules.enabled().count();
        assert!(enabled < rules.rules().len());
        assert!(note.contains(&format!("{enabled} of {} enabled", rules.rules().len())));
        assert!(note.ends_with("enabled rules verified"));
    }
}
