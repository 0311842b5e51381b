//! Histogram bin normalization.
//!
//! Users type bin edges and labels as raw comma-separated strings. This
//! module turns them into a validated `BinSpec`: ordered numeric edges with
//! an optional positive-infinity sentinel and one label per interval.

use serde_json::Value;

use crate::errors::ValidationError;

/// Normalized histogram bins: `edges[i], edges[i+1]` is a right-inclusive
/// interval labeled `labels[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct BinSpec {
    pub edges: Vec<f64>,
    pub labels: Vec<String>,
}

impl BinSpec {
    /// Whether the user-supplied edges are non-decreasing. Out-of-order
    /// edges are accepted by `normalize`; callers can use this to warn.
    pub fn is_monotone(&self) -> bool {
        self.edges.windows(2).all(|pair| pair[0] <= pair[1])
    }

    /// Edges for the wire format, with the positive-infinity sentinel
    /// replaced by the literal `"Infinity"` token (numeric infinity is not
    /// valid JSON). Only the positive sentinel gets the token.
    pub fn wire_edges(&self) -> Vec<Value> {
        self.edges
            .iter()
            .map(|&edge| {
                if edge == f64::INFINITY {
                    Value::String("Infinity".to_string())
                } else {
                    serde_json::Number::from_f64(edge)
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                }
            })
            .collect()
    }
}

/// Parse raw bin and label strings into a `BinSpec`.
///
/// Bin tokens are comma-split, trimmed, `infinity` (any casing) mapped to
/// the positive-infinity sentinel, and anything unparseable discarded.
/// Labels are comma-split and trimmed with empties discarded. If the last
/// label ends in `+` and the last edge is finite, an infinity edge is
/// appended so open-ended top buckets need not spell out `infinity`.
pub fn normalize(custom_bins: &str, custom_labels: &str) -> Result<BinSpec, ValidationError> {
    let mut edges: Vec<f64> = custom_bins
        .split(',')
        .filter_map(|token| {
            let token = token.trim();
            if token.eq_ignore_ascii_case("infinity") {
                Some(f64::INFINITY)
            } else {
                // f64::from_str also accepts inf/-inf spellings; a negative
                // infinity must not survive to masquerade as the open-ended
                // top bound.
                token
                    .parse::<f64>()
                    .ok()
                    .filter(|v| !v.is_nan() && *v != f64::NEG_INFINITY)
            }
        })
        .collect();

    let labels: Vec<String> = custom_labels
        .split(',')
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(String::from)
        .collect();

    if edges.len() < 2 {
        return Err(ValidationError::InsufficientBins { found: edges.len() });
    }

    let open_ended = labels.last().is_some_and(|label| label.ends_with('+'));
    if open_ended && edges.last().is_some_and(|edge| edge.is_finite()) {
        edges.push(f64::INFINITY);
    }

    let expected = edges.len() - 1;
    if labels.len() != expected {
        return Err(ValidationError::LabelCountMismatch {
            expected,
            found: labels.len(),
            edges,
        });
    }

    Ok(BinSpec { edges, labels })
}
