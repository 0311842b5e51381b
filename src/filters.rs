//! Per-file and global column filters.
//!
//! Per-file filters form a keyed registry with insertion-stable ordering;
//! partially specified entries are legal and mean "no filter applied yet"
//! for that dimension. Global filters are only meaningful fully specified,
//! so their triple is required at the type level.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// Comparison operator understood by the analysis backend.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "!=")]
    Ne,
}

/// Filter comparison value; the backend accepts strings and numbers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum FilterValue {
    Number(f64),
    Text(String),
}

/// One per-file filter. All three dimensions are individually optional; a
/// non-empty entry is expected to be completed before the backend can
/// apply it, but this layer does not block on partial entries.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct FilterSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<FilterValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<FilterOp>,
}

impl FilterSpec {
    pub fn is_complete(&self) -> bool {
        self.column.is_some() && self.value.is_some() && self.operator.is_some()
    }
}

/// A fully-specified filter applied after aggregation, across all files.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GlobalFilter {
    pub column: String,
    pub value: FilterValue,
    pub operator: FilterOp,
}

/// Keyed collection of per-file filters.
///
/// File names are not validated against the catalog; a filter may be
/// staged for a file the catalog does not (yet) list.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(transparent)]
pub struct FilterRegistry(IndexMap<String, FilterSpec>);

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an empty filter placeholder for `file`. Adding a file that
    /// already has an entry is rejected and leaves the registry unchanged.
    pub fn add(&mut self, file: &str) -> Result<(), ValidationError> {
        if self.0.contains_key(file) {
            return Err(ValidationError::DuplicateFilterKey(file.to_string()));
        }
        self.0.insert(file.to_string(), FilterSpec::default());
        Ok(())
    }

    /// Remove the filter for `file`. Removing a missing key is a no-op.
    pub fn remove(&mut self, file: &str) {
        self.0.shift_remove(file);
    }

    pub fn set(&mut self, file: &str, spec: FilterSpec) {
        self.0.insert(file.to_string(), spec);
    }

    pub fn get(&self, file: &str) -> Option<&FilterSpec> {
        self.0.get(file)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FilterSpec)> {
        self.0.iter()
    }
}
