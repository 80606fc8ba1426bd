use super::rules::AliasRuleSet;
use super::text::clean_unit_text;

/// Canonical unit name plus how it was reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitKey {
    pub value: String,
    /// Id of the alias rule that produced `value`, if any.
    pub rule: Option<String>,
    /// Ids of every enabled rule that matched when they disagree on the output.
    /// Empty when the name was unambiguous.
    pub conflicts: Vec<String>,
}

impl UnitKey {
    pub fn is_ambiguous(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct UnitNormalizer {
    rules: AliasRuleSet,
}

impl UnitNormalizer {
    pub fn new(rules: AliasRuleSet) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &AliasRuleSet {
        &self.rules
    }

    pub fn normalize(&self, raw: &str) -> UnitKey {
        let res = self.rules.resolve(&clean_unit_text(raw));
        UnitKey {
            value: res.value,
            rule: res.rule,
            conflicts: res.conflicts,
        }
    }

    /// Shorthand for `normalize(raw).value`.
    pub fn key(&self, raw: &str) -> String {
        self.normalize(raw).value
    }
}

impl Default for UnitNormalizer {
    fn default() -> Self {
        Self::new(AliasRuleSet::empty())
    }
}
