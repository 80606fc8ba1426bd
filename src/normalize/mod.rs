//! Join-key canonicalization.
//!
//! Canonical forms produced here are only ever compared for equality; the
//! raw strings stay on the records for display.

mod plate;
mod rules;
mod text;
mod unit;

pub use plate::normalize_plate;
pub use rules::{AliasRule, AliasRuleSet, RuleExample, DEFAULT_RULES_JSON, RULES_FORMAT_VERSION};
pub use text::{clean_unit_text, fold_text, strip_accents};
pub use unit::{UnitKey, UnitNormalizer};
