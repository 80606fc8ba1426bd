//! Column detection.
//!
//! Every source kind declares the concepts it needs and a small vocabulary
//! of header spellings for each. Headers are folded (accents stripped,
//! uppercased) before matching. Detection runs in two passes over the
//! concepts in declaration order: exact header matches first, then substring
//! matches. A column is assigned to at most one concept, so more specific
//! concepts are declared before the ones whose vocabulary would swallow them
//! (`WarName` before `Name`).
//!
//! A [`DeclaredSchema`] names columns explicitly and always wins over
//! detection.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::normalize::fold_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Concept {
    Plate,
    Unit,
    FuelType,
    Liters,
    AmountSpent,
    Date,
    Ownership,
    StandardClass,
    MonthlyLeaseCost,
    Characterization,
    LocationName,
    LocationType,
    ReferenceCity,
    Latitude,
    Longitude,
    MonthlyRate,
    Registration,
    Name,
    WarName,
    Rank,
    Sector,
    Posting,
    Status,
    FunctionGrade,
}

impl Concept {
    pub fn as_str(&self) -> &'static str {
        match self {
            Concept::Plate => "plate",
            Concept::Unit => "unit",
            Concept::FuelType => "fuel_type",
            Concept::Liters => "liters",
            Concept::AmountSpent => "amount_spent",
            Concept::Date => "date",
            Concept::Ownership => "ownership",
            Concept::StandardClass => "standard_class",
            Concept::MonthlyLeaseCost => "monthly_lease_cost",
            Concept::Characterization => "characterization",
            Concept::LocationName => "location_name",
            Concept::LocationType => "location_type",
            Concept::ReferenceCity => "reference_city",
            Concept::Latitude => "latitude",
            Concept::Longitude => "longitude",
            Concept::MonthlyRate => "monthly_rate",
            Concept::Registration => "registration",
            Concept::Name => "name",
            Concept::WarName => "war_name",
            Concept::Rank => "rank",
            Concept::Sector => "sector",
            Concept::Posting => "posting",
            Concept::Status => "status",
            Concept::FunctionGrade => "function_grade",
        }
    }
}

impl fmt::Display for Concept {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Fuel,
    Fleet,
    Geo,
    LeaseRates,
    Personnel,
    Functions,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Fuel => "fuel",
            SourceKind::Fleet => "fleet",
            SourceKind::Geo => "geo",
            SourceKind::LeaseRates => "lease_rates",
            SourceKind::Personnel => "personnel",
            SourceKind::Functions => "functions",
        }
    }

    /// Concepts this kind of source is matched against, in detection order.
    pub fn concepts(&self) -> &'static [ConceptSpec] {
        match self {
            SourceKind::Fuel => FUEL,
            SourceKind::Fleet => FLEET,
            SourceKind::Geo => GEO,
            SourceKind::LeaseRates => LEASE_RATES,
            SourceKind::Personnel => PERSONNEL,
            SourceKind::Functions => FUNCTIONS,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConceptSpec {
    pub concept: Concept,
    /// Folded header spellings, most specific first.
    pub candidates: &'static [&'static str],
    pub required: bool,
}

const fn spec(concept: Concept, candidates: &'static [&'static str], required: bool) -> ConceptSpec {
    ConceptSpec {
        concept,
        candidates,
        required,
    }
}

const PLATE: &[&str] = &["PLACA", "PLATE"];
const UNIT: &[&str] = &["OPM", "UNIDADE", "LOTACAO"];
const CLASS: &[&str] = &["PADRAO", "CATEGORIA", "CLASSE"];

// Liters and the fuel-type column are optional here because the wide layout
// (one liters column per fuel) has neither; the fuel parser enforces them.
static FUEL: &[ConceptSpec] = &[
    spec(Concept::Plate, PLATE, true),
    spec(Concept::Unit, UNIT, true),
    spec(Concept::FuelType, &["COMBUSTIVEL", "PRODUTO", "TIPO"], false),
    spec(Concept::Liters, &["LITROS", "LITRO", "QUANTIDADE", "QTD"], false),
    spec(Concept::AmountSpent, &["VALOR", "CUSTO", "GASTO", "TOTAL"], false),
    spec(Concept::Date, &["DATA", "DATE"], false),
];

static FLEET: &[ConceptSpec] = &[
    spec(Concept::Plate, PLATE, true),
    spec(Concept::Unit, UNIT, true),
    spec(Concept::MonthlyLeaseCost, &["VALOR MENSAL", "CUSTO MENSAL", "VALOR LOCACAO", "VALOR"], false),
    spec(Concept::Ownership, &["PROPRIEDADE", "LOCADO", "SITUACAO", "TIPO FROTA", "TIPO"], false),
    spec(Concept::StandardClass, CLASS, false),
    spec(Concept::Characterization, &["CARACTERIZACAO", "CARACTERIZADA"], false),
];

static GEO: &[ConceptSpec] = &[
    spec(Concept::Unit, &["OPM", "UNIDADE"], true),
    spec(Concept::ReferenceCity, &["CIDADE REFERENCIA", "CIDADE SEDE", "CIDADE", "SEDE"], false),
    spec(Concept::LocationName, &["MUNICIPIO", "BAIRRO", "LOCALIDADE", "LOCAL"], true),
    spec(Concept::LocationType, &["TIPO"], false),
    spec(Concept::Latitude, &["LATITUDE", "LAT"], false),
    spec(Concept::Longitude, &["LONGITUDE", "LON", "LNG"], false),
];

static LEASE_RATES: &[ConceptSpec] = &[
    spec(Concept::StandardClass, CLASS, true),
    spec(Concept::MonthlyRate, &["VALOR MENSAL", "VALOR", "MENSAL", "PRECO"], true),
];

static PERSONNEL: &[ConceptSpec] = &[
    spec(Concept::Registration, &["MAT", "MATRICULA"], false),
    spec(Concept::WarName, &["N GUERRA", "NOME DE GUERRA", "GUERRA"], false),
    spec(Concept::Name, &["NOME"], true),
    spec(Concept::FunctionGrade, &["GRADUACAO DA FUNCAO", "POSTO_GRAD_FUNCAO"], false),
    spec(Concept::Rank, &["P/G", "POSTO", "GRADUACAO"], false),
    spec(Concept::Sector, &["SETOR"], false),
    spec(Concept::Posting, &["LOTACAO"], false),
    spec(Concept::Status, &["STATUS_OCUPACAO", "STATUS"], false),
];

static FUNCTIONS: &[ConceptSpec] = &[
    spec(Concept::WarName, &["NOME DE GUERRA", "N GUERRA", "GUERRA"], true),
    spec(Concept::FunctionGrade, &["GRADUACAO DA FUNCAO", "POSTO_GRAD_FUNCAO", "FUNCAO"], true),
];

/// Result of looking up one concept in a header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ColumnMatch {
    Found { column: String, index: usize },
    NotFound { candidates_tried: Vec<String> },
}

impl ColumnMatch {
    pub fn index(&self) -> Option<usize> {
        match self {
            ColumnMatch::Found { index, .. } => Some(*index),
            ColumnMatch::NotFound { .. } => None,
        }
    }
}

/// Which header each concept resolved to for one loaded source.
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub source_name: String,
    pub kind: SourceKind,
    pub columns: Vec<(Concept, ColumnMatch)>,
}

impl Manifest {
    pub fn get(&self, concept: Concept) -> Option<&ColumnMatch> {
        self.columns
            .iter()
            .find(|(c, _)| *c == concept)
            .map(|(_, m)| m)
    }

    pub fn index(&self, concept: Concept) -> Option<usize> {
        self.get(concept).and_then(ColumnMatch::index)
    }

    /// Column index for `concept`, or a [`PipelineError::Schema`] naming what was tried.
    pub fn require(&self, concept: Concept) -> Result<usize> {
        match self.get(concept) {
            Some(ColumnMatch::Found { index, .. }) => Ok(*index),
            Some(ColumnMatch::NotFound { candidates_tried }) => Err(PipelineError::Schema {
                source_name: self.source_name.clone(),
                concept,
                candidates: candidates_tried.clone(),
            }),
            None => Err(PipelineError::Schema {
                source_name: self.source_name.clone(),
                concept,
                candidates: Vec::new(),
            }),
        }
    }

    /// Fails on the first required concept that was not found.
    pub fn check_required(&self) -> Result<()> {
        for spec in self.kind.concepts().iter().filter(|s| s.required) {
            self.require(spec.concept)?;
        }
        Ok(())
    }
}

/// Explicit column names per source kind, loaded from JSON:
/// ```json
/// { "fuel": { "plate": "PLACA VTR", "liters": "QTD ABASTECIDA" } }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct DeclaredSchema {
    entries: HashMap<SourceKind, HashMap<Concept, String>>,
}

impl DeclaredSchema {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read column overrides {}: {e}", path.display()))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| PipelineError::Config(format!("invalid column overrides: {e}")))
    }

    pub fn with(mut self, kind: SourceKind, concept: Concept, column: impl Into<String>) -> Self {
        self.entries
            .entry(kind)
            .or_default()
            .insert(concept, column.into());
        self
    }

    pub fn column_for(&self, kind: SourceKind, concept: Concept) -> Option<&str> {
        self.entries
            .get(&kind)
            .and_then(|m| m.get(&concept))
            .map(String::as_str)
    }
}

/// Resolves every concept of `kind` against `headers`.
///
/// Columns listed in `reserved` are never assigned by detection (the fuel
/// parser reserves its per-fuel liters columns this way).
pub fn detect(
    source_name: &str,
    kind: SourceKind,
    headers: &[String],
    declared: &DeclaredSchema,
    reserved: &HashSet<usize>,
) -> Manifest {
    let folded: Vec<String> = headers.iter().map(|h| fold_text(h)).collect();
    let specs = kind.concepts();
    let mut used: HashSet<usize> = reserved.clone();
    let mut found: HashMap<Concept, usize> = HashMap::new();

    for spec in specs {
        if let Some(column) = declared.column_for(kind, spec.concept) {
            let wanted = fold_text(column);
            if let Some(idx) = folded.iter().position(|h| *h == wanted) {
                used.insert(idx);
                found.insert(spec.concept, idx);
            }
        }
    }

    for exact in [true, false] {
        for spec in specs {
            if found.contains_key(&spec.concept) || declared.column_for(kind, spec.concept).is_some() {
                continue;
            }
            let hit = spec.candidates.iter().find_map(|cand| {
                folded.iter().enumerate().position(|(idx, h)| {
                    let hit = if exact { h.as_str() == *cand } else { h.contains(*cand) };
                    hit && !used.contains(&idx)
                })
            });
            if let Some(idx) = hit {
                used.insert(idx);
                found.insert(spec.concept, idx);
            }
        }
    }

    let columns = specs
        .iter()
        .map(|spec| {
            let m = match found.get(&spec.concept) {
                Some(&index) => ColumnMatch::Found {
                    column: headers[index].clone(),
                    index,
                },
                None => ColumnMatch::NotFound {
                    candidates_tried: match declared.column_for(kind, spec.concept) {
                        Some(column) => vec![column.to_string()],
                        None => spec.candidates.iter().map(|c| c.to_lowercase()).collect(),
                    },
                },
            };
            (spec.concept, m)
        })
        .collect();

    Manifest {
        source_name: source_name.to_string(),
        kind,
        columns,
    }
}
