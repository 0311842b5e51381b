//! Error types for configuration authoring and backend access.
//!
//! Validation problems are recoverable and carry the offending values so the
//! UI can render a descriptive message; schema problems indicate a
//! programming or config-file error and must fail loudly; transport problems
//! come from the backend and never touch the in-memory configuration.

use thiserror::Error;

/// Recoverable configuration problems. Submission is blocked until corrected.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Fewer than two numeric bin edges survived parsing
    #[error("at least two numeric bin edges are required, found {found}")]
    InsufficientBins { found: usize },

    /// Label count does not match the bin interval count
    #[error("expected {expected} labels for bins {edges:?}, found {found}")]
    LabelCountMismatch {
        expected: usize,
        found: usize,
        edges: Vec<f64>,
    },

    /// A derived column with this name already exists
    #[error("duplicate derived column name: {0}")]
    DuplicateColumnName(String),

    /// A per-file filter already exists for this file
    #[error("a filter already exists for file: {0}")]
    DuplicateFilterKey(String),

    /// An aggregation or metric list contains an empty entry
    #[error("empty entry in {section}")]
    EmptyColumnEntry { section: String },

    /// A multiply column needs at least two source columns
    #[error("multiply column {name} needs at least 2 columns, found {found}")]
    TooFewMultiplyColumns { name: String, found: usize },

    /// The buffer layer references a file missing from the catalog
    #[error("buffer layer references unknown data file: {0}")]
    UnknownLayer(String),

    /// A numeric buffer field must be strictly positive
    #[error("buffer field {field} must be a positive number")]
    NonPositiveField { field: String },

    /// Isochrone travel times must not be empty
    #[error("travel_time must contain at least one value")]
    EmptyTravelTime,
}

/// Dynamic-schema failures. An unrecognized discriminator or field is a
/// programming error, never a silent default.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Discriminator value outside the six known buffer types
    #[error("unknown buffer type: {0}")]
    UnknownBufferType(String),

    /// Field name not part of the active variant's field set
    #[error("field {field} does not exist for buffer type {buffer_type}")]
    UnknownField {
        buffer_type: String,
        field: String,
    },

    /// Field value of the wrong shape or domain
    #[error("invalid value for field {field}: {reason}")]
    InvalidFieldValue { field: String, reason: String },

    /// Wire config carried no buffer layer entry
    #[error("wire config contains no buffer_layer entry")]
    MissingBufferLayer,
}

/// Backend request failures. The configuration is left unchanged so the
/// user can retry without re-entering data.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned status {status} for {url}")]
    Status { status: u16, url: String },
}

/// Anything an editing-session mutation can fail with.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}
