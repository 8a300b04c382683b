//! Crate-level errors for the enrichment and reporting pipeline.

use thiserror::Error;

use crate::point::MalformedPointError;
use crate::region::{BoundaryError, OverrideError, ResolutionError};

/// Why a single record could not be enriched.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    Point(#[from] MalformedPointError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

#[derive(Debug, Error)]
pub enum GeoEventsError {
    #[error(transparent)]
    Resolve(#[from] RecordError),

    #[error("row {row} (id '{id}'): {source}")]
    Row {
        row: usize,
        id: String,
        #[source]
        source: RecordError,
    },

    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("duplicate event id '{0}'")]
    DuplicateId(String),

    #[error("invalid {column} '{value}' in row {row}")]
    InvalidField {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("moving-average window must be a positive odd number, got {0}")]
    InvalidWindow(usize),

    #[error(transparent)]
    Overrides(#[from] OverrideError),

    #[error(transparent)]
    Boundary(#[from] BoundaryError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
