//! Unit-name alias table.
//!
//! Stored as a versioned JSON document:
//! ```json
//! {
//!   "version": 1,
//!   "rules": [
//!     { "id": "bpm", "pattern": "0*(\\d+)\\s*O?\\s*B\\s*P\\s*M", "canonical": "$1 BPM",
//!       "examples": [["1º BPM", "1 BPM"]] }
//!   ]
//! }
//! ```
//! Patterns run against the cleaned name (see [`clean_unit_text`]) and must
//! match it entirely. Rules are tried in file order.

use std::collections::HashSet;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;

use super::text::clean_unit_text;
use crate::error::{PipelineError, Result};

pub const RULES_FORMAT_VERSION: u32 = 1;

/// Rule table shipped with the crate, used when no path is configured.
pub const DEFAULT_RULES_JSON: &str = include_str!("../../config/unit_aliases.json");

#[derive(Debug, Deserialize)]
struct RuleFile {
    version: u32,
    rules: Vec<RuleEntry>,
}

#[derive(Debug, Deserialize)]
struct RuleEntry {
    id: String,
    pattern: String,
    canonical: String,
    #[serde(default = "enabled_by_default")]
    enabled: bool,
    #[serde(default)]
    note: Option<String>,
    #[serde(default)]
    examples: Vec<(String, String)>,
}

fn enabled_by_default() -> bool {
    true
}

/// A raw spelling pinned to the canonical value it must normalize to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleExample {
    pub raw: String,
    pub expected: String,
}

#[derive(Debug, Clone)]
pub struct AliasRule {
    pub id: String,
    pub canonical: String,
    pub enabled: bool,
    pub note: Option<String>,
    pub examples: Vec<RuleExample>,
    source_pattern: String,
    pattern: Regex,
}

impl AliasRule {
    /// The pattern as written in the rule file.
    pub fn pattern(&self) -> &str {
        &self.source_pattern
    }

    /// Expands the canonical template if the pattern matches `cleaned` entirely.
    pub fn apply(&self, cleaned: &str) -> Option<String> {
        let caps = self.pattern.captures(cleaned)?;
        let mut out = String::new();
        caps.expand(&self.canonical, &mut out);
        Some(out)
    }
}

/// Outcome of running the enabled rules over one cleaned name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Resolution {
    pub value: String,
    pub rule: Option<String>,
    pub conflicts: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AliasRuleSet {
    version: u32,
    rules: Vec<AliasRule>,
}

impl AliasRuleSet {
    /// A set with no rules: names are only cleaned.
    pub fn empty() -> Self {
        Self {
            version: RULES_FORMAT_VERSION,
            rules: Vec::new(),
        }
    }

    /// Parses and validates the rule table embedded in the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_json(DEFAULT_RULES_JSON)
    }

    /// Loads the rule table from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Rules(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&content)
    }

    /// Parses a rule table and validates it.
    ///
    /// # Errors
    ///
    /// Fails on an unknown format version, duplicate or empty ids, patterns
    /// that do not compile, canonical values that are not stable under
    /// normalization, and examples that do not normalize to their expected
    /// value.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: RuleFile =
            serde_json::from_str(json).map_err(|e| PipelineError::Rules(e.to_string()))?;

        if file.version != RULES_FORMAT_VERSION {
            return Err(PipelineError::Rules(format!(
                "unsupported rule format version {} (expected {RULES_FORMAT_VERSION})",
                file.version
            )));
        }

        let mut seen = HashSet::new();
        let mut rules = Vec::with_capacity(file.rules.len());
        for entry in file.rules {
            if entry.id.trim().is_empty() {
                return Err(PipelineError::Rules("rule with an empty id".to_string()));
            }
            if !seen.insert(entry.id.clone()) {
                return Err(PipelineError::Rules(format!("duplicate rule id `{}`", entry.id)));
            }
            if entry.canonical.trim().is_empty() {
                return Err(PipelineError::Rules(format!(
                    "rule `{}` has an empty canonical value",
                    entry.id
                )));
            }
            let pattern = Regex::new(&format!("^(?:{})$", entry.pattern))
                .map_err(|e| PipelineError::Rules(format!("rule `{}`: {e}", entry.id)))?;

            rules.push(AliasRule {
                id: entry.id,
                canonical: entry.canonical,
                enabled: entry.enabled,
                note: entry.note,
                examples: entry
                    .examples
                    .into_iter()
                    .map(|(raw, expected)| RuleExample { raw, expected })
                    .collect(),
                source_pattern: entry.pattern,
                pattern,
            });
        }

        let set = Self {
            version: file.version,
            rules,
        };
        set.check_fixed_points()?;
        Ok(set)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn rules(&self) -> &[AliasRule] {
        &self.rules
    }

    pub fn enabled(&self) -> impl Iterator<Item = &AliasRule> {
        self.rules.iter().filter(|r| r.enabled)
    }

    pub(crate) fn resolve(&self, cleaned: &str) -> Resolution {
        let hits: Vec<(&str, String)> = self
            .enabled()
            .filter_map(|rule| rule.apply(cleaned).map(|out| (rule.id.as_str(), out)))
            .collect();

        let Some((winner_id, winner_value)) = hits.first() else {
            return Resolution {
                value: cleaned.to_string(),
                rule: None,
                conflicts: Vec::new(),
            };
        };

        let conflicts = if hits.iter().any(|(_, out)| out != winner_value) {
            hits.iter().map(|(id, _)| id.to_string()).collect()
        } else {
            Vec::new()
        };

        Resolution {
            value: winner_value.clone(),
            rule: Some(winner_id.to_string()),
            conflicts,
        }
    }

    fn normalize(&self, raw: &str) -> String {
        self.resolve(&clean_unit_text(raw)).value
    }

    fn check_fixed_points(&self) -> Result<()> {
        for rule in self.enabled() {
            if !rule.canonical.contains('$') {
                let again = self.normalize(&rule.canonical);
                if again != rule.canonical {
                    return Err(PipelineError::Rules(format!(
                        "rule `{}`: canonical `{}` normalizes to `{again}`",
                        rule.id, rule.canonical
                    )));
                }
            }
            for example in &rule.examples {
                let got = self.normalize(&example.raw);
                if got != example.expected {
                    return Err(PipelineError::Rules(format!(
                        "rule `{}`: `{}` normalizes to `{got}`, expected `{}`",
                        rule.id, example.raw, example.expected
                    )));
                }
                let again = self.normalize(&example.expected);
                if again != example.expected {
                    return Err(PipelineError::Rules(format!(
                        "rule `{}`: canonical `{}` is not stable (becomes `{again}`)",
                        rule.id, example.expected
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules_json(body: &str) -> String {
        format!(r#"{{ "version": 1, "rules": [{body}] }}"#)
    }

    #[test]
    fn test_builtin_rules_load() {
        let set = AliasRuleSet::builtin().unwrap();
        assert_eq!(set.version(), RULES_FORMAT_VERSION);
        assert!(set.rules().iter().any(|r| r.id == "bpm"));
        assert!(set.rules().iter().any(|r| !r.enabled));
    }

    #[test]
    fn test_every_builtin_example_is_pinned() {
        let set = AliasRuleSet::builtin().unwrap();
        let mut checked = 0;
        for rule in set.enabled() {
            for ex in &rule.examples {
                assert_eq!(set.normalize(&ex.raw), ex.expected, "rule {}", rule.id);
                checked += 1;
            }
        }
        assert!(checked >= 20);
    }

    #[test]
    fn test_rejects_unknown_version() {
        let err = AliasRuleSet::from_json(r#"{ "version": 7, "rules": [] }"#).unwrap_err();
        assert!(err.to_string().contains("version 7"));
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let json = rules_json(
            r#"{ "id": "a", "pattern": "X", "canonical": "X" },
               { "id": "a", "pattern": "Y", "canonical": "Y" }"#,
        );
        let err = AliasRuleSet::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("duplicate rule id `a`"));
    }

    #[test]
    fn test_rejects_bad_pattern() {
        let json = rules_json(r#"{ "id": "broken", "pattern": "(", "canonical": "X" }"#);
        let err = AliasRuleSet::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_rejects_unstable_canonical() {
        // Cleanup turns "/" into a space, so "CPM/I" can never be a fixed point.
        let json = rules_json(r#"{ "id": "slash", "pattern": "CPMI", "canonical": "CPM/I" }"#);
        let err = AliasRuleSet::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("slash"));
    }

    #[test]
    fn test_rejects_failing_example() {
        let json = rules_json(
            r#"{ "id": "bpm", "pattern": "(\\d+) BPM", "canonical": "$1 BPM",
                 "examples": [["1 B P M", "1 BPM"]] }"#,
        );
        let err = AliasRuleSet::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("expected `1 BPM`"));
    }

    #[test]
    fn test_disabled_rules_are_not_applied() {
        let json = rules_json(
            r#"{ "id": "off", "pattern": "FOO", "canonical": "BAR", "enabled": false }"#,
        );
        let set = AliasRuleSet::from_json(&json).unwrap();
        assert_eq!(set.resolve("FOO").value, "FOO");
        assert_eq!(set.resolve("FOO").rule, None);
    }

    #[test]
    fn test_conflicting_rules_are_reported() {
        let json = rules_json(
            r#"{ "id": "specific", "pattern": "(\\d+) CIA (\\d+) BPM", "canonical": "$1 CIA $2 BPM" },
               { "id": "fold", "pattern": "\\d+ CIA (\\d+) BPM", "canonical": "$1 BPM" }"#,
        );
        let set = AliasRuleSet::from_json(&json).unwrap();
        let res = set.resolve("1 CIA 5 BPM");
        assert_eq!(res.value, "1 CIA 5 BPM");
        assert_eq!(res.rule.as_deref(), Some("specific"));
        assert_eq!(res.conflicts, vec!["specific".to_string(), "fold".to_string()]);
    }

    #[test]
    fn test_agreeing_rules_are_not_a_conflict() {
        let set = AliasRuleSet::builtin().unwrap();
        // Matched by both `cpmi` and the generic ordinal fallback, same output.
        let res = set.resolve("3A CPMI");
        assert_eq!(res.value, "3 CPMI");
        assert!(res.conflicts.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aliases.json");
        std::fs::write(
            &path,
            rules_json(r#"{ "id": "q", "pattern": "Q C G", "canonical": "QCG" }"#),
        )
        .unwrap();
        let set = AliasRuleSet::load(&path).unwrap();
        assert_eq!(set.rules().len(), 1);
        assert_eq!(set.resolve("Q C G").value, "QCG");
    }
}
