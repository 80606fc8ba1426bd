//! Run settings read from the environment (`.env` is loaded by the binary).
//!
//! | Variable                | Default            |
//! |-------------------------|--------------------|
//! | `FUEL_SOURCE`           | unset              |
//! | `FLEET_SOURCE`          | unset              |
//! | `GEO_SOURCE`            | unset              |
//! | `LEASE_SOURCE`          | unset              |
//! | `PERSONNEL_SOURCES`     | unset, comma list  |
//! | `FUNCTIONS_SOURCE`      | unset              |
//! | `UNIT_ALIASES_PATH`     | embedded table     |
//! | `COLUMN_OVERRIDES_PATH` | detection only     |
//! | `CACHE_TTL_SECS`        | 3600               |
//! | `ZSCORE_THRESHOLD`      | 2                  |
//! | `SOURCE_TOKEN`          | none               |

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::analyzers::outliers::DEFAULT_THRESHOLD;
use crate::error::{PipelineError, Result};
use crate::fetch::auth::ApiKey;
use crate::fetch::{BasicClient, HttpClient};
use crate::normalize::AliasRuleSet;
use crate::schema::DeclaredSchema;
use crate::source::SourceId;

pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Where each spreadsheet comes from. Unset sources are skipped where optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sources {
    pub fuel: Option<SourceId>,
    pub fleet: Option<SourceId>,
    pub geo: Option<SourceId>,
    pub lease: Option<SourceId>,
    pub personnel: Vec<SourceId>,
    pub functions: Option<SourceId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub sources: Sources,
    pub cache_ttl: Duration,
    pub zscore_threshold: f64,
    pub unit_aliases_path: Option<PathBuf>,
    pub column_overrides_path: Option<PathBuf>,
    pub source_token: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sources: Sources::default(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            zscore_threshold: DEFAULT_THRESHOLD,
            unit_aliases_path: None,
            column_overrides_path: None,
            source_token: None,
        }
    }
}

/// Comma-separated list of sources, blanks dropped.
pub fn source_list(raw: &str) -> Vec<SourceId> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(SourceId::parse)
        .collect()
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from `lookup`; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let source = |key: &str| get(key).map(|v| SourceId::parse(&v));

        let cache_ttl = match get("CACHE_TTL_SECS") {
            Some(v) => Duration::from_secs(
                v.parse()
                    .map_err(|_| PipelineError::Config(format!("CACHE_TTL_SECS must be whole seconds, got '{v}'")))?,
            ),
            None => Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        };

        let zscore_threshold = match get("ZSCORE_THRESHOLD") {
            Some(v) => parse_threshold(&v)?,
            None => DEFAULT_THRESHOLD,
        };

        let settings = Settings {
            sources: Sources {
                fuel: source("FUEL_SOURCE"),
                fleet: source("FLEET_SOURCE"),
                geo: source("GEO_SOURCE"),
                lease: source("LEASE_SOURCE"),
                personnel: get("PERSONNEL_SOURCES").map(|v| source_list(&v)).unwrap_or_default(),
                functions: source("FUNCTIONS_SOURCE"),
            },
            cache_ttl,
            zscore_threshold,
            unit_aliases_path: get("UNIT_ALIASES_PATH").map(PathBuf::from),
            column_overrides_path: get("COLUMN_OVERRIDES_PATH").map(PathBuf::from),
            source_token: get("SOURCE_TOKEN"),
        };
        debug!(
            cache_ttl_secs = settings.cache_ttl.as_secs(),
            zscore_threshold = settings.zscore_threshold,
            token = settings.source_token.is_some(),
            "Settings loaded"
        );
        Ok(settings)
    }

    /// The configured alias table, or the embedded one.
    pub fn alias_rules(&self) -> Result<AliasRuleSet> {
        match &self.unit_aliases_path {
            Some(path) => AliasRuleSet::load(path),
            None => AliasRuleSet::builtin(),
        }
    }

    pub fn declared_schema(&self) -> Result<DeclaredSchema> {
        match &self.column_overrides_path {
            Some(path) => DeclaredSchema::load(path),
            None => Ok(DeclaredSchema::default()),
        }
    }

    /// Basic client, wrapped with a bearer token when `SOURCE_TOKEN` is set.
    pub fn http_client(&self) -> Result<Box<dyn HttpClient>> {
        match &self.source_token {
            Some(token) => {
                let client = ApiKey::bearer(BasicClient::new(), token)
                    .map_err(|e| PipelineError::Config(format!("SOURCE_TOKEN: {e}")))?;
                Ok(Box::new(client))
            }
            None => Ok(Box::new(BasicClient::new())),
        }
    }
}

/// A finite, positive z-score threshold.
pub fn parse_threshold(raw: &str) -> Result<f64> {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(PipelineError::Config(format!(
            "z-score threshold must be a positive number, got '{raw}'"
        ))),
    }
}
