//! Typed parsers that turn decoded tables into records.
//!
//! A missing required column fails the whole source with a schema error.
//! Anything wrong inside a row is recorded as a [`crate::model::RowFlag`] on
//! that row, or the row is skipped and counted when it has no usable key.

mod fleet;
mod fuel;
mod geo;
mod lease;
mod personnel;

pub use fleet::{parse_fleet, parse_ownership};
pub use fuel::{FuelLayout, detect_layout, parse_fuel};
pub use geo::parse_geo;
pub use lease::parse_lease_rates;
pub use personnel::{FunctionAssignment, parse_functions, parse_personnel};

use std::collections::HashSet;

use crate::error::Result;
use crate::model::{NOT_AVAILABLE, RowFlag};
use crate::parser::{Cell, parse_cell};
use crate::schema::{DeclaredSchema, Manifest, SourceKind, detect};
use crate::table::Table;

/// Records parsed from one source, with the column manifest used.
#[derive(Debug, Clone)]
pub struct Parsed<T> {
    pub manifest: Manifest,
    pub records: Vec<T>,
    /// Rows dropped because their key column was blank.
    pub skipped: usize,
}

impl<T> Parsed<T> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn manifest_for(
    table: &Table,
    kind: SourceKind,
    declared: &DeclaredSchema,
    reserved: &HashSet<usize>,
) -> Result<Manifest> {
    let manifest = detect(&table.name, kind, &table.headers, declared, reserved);
    manifest.check_required()?;
    Ok(manifest)
}

/// Trimmed text, or `N/A` when blank.
fn text_or_na(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Parses an optional cell, pushing an `Unparseable` flag for malformed input.
fn optional_value<T>(
    raw: &str,
    column: &str,
    parse: impl Fn(&str) -> Option<T>,
    flags: &mut Vec<RowFlag>,
) -> Option<T> {
    match parse_cell(raw, parse) {
        Cell::Value(v) => Some(v),
        Cell::Blank => None,
        Cell::Invalid(value) => {
            flags.push(RowFlag::unparseable(column, value));
            None
        }
    }
}
