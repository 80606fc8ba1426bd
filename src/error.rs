//! Run-level errors.
//!
//! Anything in here aborts the current pipeline run. Per-row problems are
//! never errors; they travel with the rows as [`crate::model::RowFlag`]s.

use thiserror::Error;

use crate::schema::Concept;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required column could not be located in a source.
    #[error("{source_name}: no column found for {concept} (tried: {})", candidates.join(", "))]
    Schema {
        source_name: String,
        concept: Concept,
        candidates: Vec<String>,
    },

    /// A remote source was unreachable or answered with a non-success status.
    #[error("failed to fetch {source_id}: {message}")]
    Fetch { source_id: String, message: String },

    /// The bytes of a source could not be decoded as CSV or XLSX.
    #[error("failed to decode {source_id}: {message}")]
    Decode { source_id: String, message: String },

    #[error("invalid unit alias rules: {0}")]
    Rules(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn fetch(source_id: impl Into<String>, message: impl ToString) -> Self {
        Self::Fetch {
            source_id: source_id.into(),
            message: message.to_string(),
        }
    }

    /// Short tag recorded in the run history.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Schema { .. } => "schema_error",
            Self::Fetch { .. } => "fetch_error",
            Self::Decode { .. } => "decode_error",
            Self::Rules(_) => "rules_error",
            Self::Config(_) => "config_error",
            Self::Io(_) => "io_error",
            Self::Csv(_) => "csv_error",
            Self::Json(_) => "json_error",
        }
    }

    pub fn decode(source_id: impl Into<String>, message: impl ToString) -> Self {
        Self::Decode {
            source_id: source_id.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_names_the_concept_and_candidates() {
        let err = PipelineError::Schema {
            source_name: "fuel".to_string(),
            concept: Concept::Plate,
            candidates: vec!["placa".to_string(), "plate".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("fuel"));
        assert!(msg.contains("plate"));
        assert!(msg.contains("placa, plate"));
        assert_eq!(err.kind(), "schema_error");
    }
}
