//! ## Structure
//! Canonical in-memory model of one pipeline configuration.
//!
//! ```text
//! PipelineConfig
//!   ├── data_files: Vec<DataFileRef>
//!   ├── buffer_layer: BufferLayerConfig        (tagged union, see buffer)
//!   ├── filter_data_files: FilterRegistry
//!   ├── ratio_columns / multiply_columns       (derived columns, keyed by name)
//!   ├── sum/max/min/mean/std/count/count_distinct_columns: Vec<String>
//!   ├── groupby_columns / post_aggregation_metrics: Vec<String>
//!   ├── filter_global: Vec<GlobalFilter>
//!   ├── join_layers: JoinLayers                (fixed four geometry classes)
//!   └── colors: IndexMap<layer, rgba>
//! ```
//!
//! Every section of the wire format exists here even when empty. All
//! relationships are name-based lookups; no entity holds a back-reference
//! to its container.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::buffer::{BufferLayerConfig, BufferParams, BufferType, GeometryType};
use crate::errors::ValidationError;
use crate::filters::{FilterRegistry, GlobalFilter};

/// One input layer from the backend's file catalog. `name` is unique within
/// the configuration; `path` is backend-supplied and read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFileRef {
    pub name: String,
    pub path: String,
}

/// Derived column dividing one source column by another. Either side may
/// still be unset while the operator is editing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct RatioColumn {
    #[serde(default)]
    pub numerator: Option<String>,
    #[serde(default)]
    pub denominator: Option<String>,
}

/// Derived column multiplying two or more source columns.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct MultiplyColumn {
    pub columns: Vec<String>,
}

/// The seven aggregation column lists, addressed by operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationKind {
    Sum,
    Max,
    Min,
    Mean,
    Std,
    Count,
    CountDistinct,
}

impl AggregationKind {
    pub const ALL: [AggregationKind; 7] = [
        AggregationKind::Sum,
        AggregationKind::Max,
        AggregationKind::Min,
        AggregationKind::Mean,
        AggregationKind::Std,
        AggregationKind::Count,
        AggregationKind::CountDistinct,
    ];

    pub fn section(&self) -> &'static str {
        match self {
            AggregationKind::Sum => "sum_columns",
            AggregationKind::Max => "max_columns",
            AggregationKind::Min => "min_columns",
            AggregationKind::Mean => "mean_columns",
            AggregationKind::Std => "std_columns",
            AggregationKind::Count => "count_columns",
            AggregationKind::CountDistinct => "count_distinct_columns",
        }
    }
}

/// Spatial join predicate for one geometry class.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JoinPredicate {
    Contains,
    Intersects,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinRule {
    #[serde(rename = "type")]
    pub predicate: JoinPredicate,
}

/// Join predicates for the four geometry classes; all four are always
/// present.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinLayers {
    pub points: JoinRule,
    pub polygons: JoinRule,
    pub multipolygons: JoinRule,
    pub linestrings: JoinRule,
}

impl Default for JoinLayers {
    fn default() -> Self {
        JoinLayers {
            points: JoinRule {
                predicate: JoinPredicate::Contains,
            },
            polygons: JoinRule {
                predicate: JoinPredicate::Intersects,
            },
            multipolygons: JoinRule {
                predicate: JoinPredicate::Intersects,
            },
            linestrings: JoinRule {
                predicate: JoinPredicate::Intersects,
            },
        }
    }
}

/// Geometry class selector for join-rule edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinGeometry {
    Points,
    Polygons,
    Multipolygons,
    Linestrings,
}

/// Chart aggregation choice shared by histogram and bar-chart requests.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChartAggregationOp {
    #[default]
    Count,
    Sum,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ChartAggregation {
    #[serde(rename = "type")]
    pub op: ChartAggregationOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

/// Histogram request as authored; `custom_bins` / `custom_labels` stay raw
/// until normalized by `bins::normalize` at submission time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistogramRequest {
    pub columns: Vec<String>,
    pub groupby: Option<String>,
    pub aggregation: ChartAggregation,
    pub custom_bins: String,
    pub custom_labels: String,
}

/// Bar-chart request; bar charts have no bin fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BarChartRequest {
    pub columns: Vec<String>,
    pub groupby: Option<String>,
    pub aggregation: ChartAggregation,
}

// Layer colors assigned in rotation when the catalog is seeded.
const COLOR_PALETTE: [&str; 5] = [
    "[200, 30, 0, 160]",
    "[0, 200, 0, 160]",
    "[0, 30, 200, 160]",
    "[255, 255, 0, 160]",
    "[255, 165, 0, 160]",
];

/// Root of the configuration authored by one editing session.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub data_files: Vec<DataFileRef>,
    pub buffer_layer: BufferLayerConfig,
    pub filter_data_files: FilterRegistry,
    pub ratio_columns: IndexMap<String, RatioColumn>,
    pub multiply_columns: IndexMap<String, MultiplyColumn>,
    pub sum_columns: Vec<String>,
    pub max_columns: Vec<String>,
    pub min_columns: Vec<String>,
    pub mean_columns: Vec<String>,
    pub std_columns: Vec<String>,
    pub count_columns: Vec<String>,
    pub count_distinct_columns: Vec<String>,
    pub groupby_columns: Vec<String>,
    pub filter_global: Vec<GlobalFilter>,
    pub post_aggregation_metrics: Vec<String>,
    pub activate_visualisation: bool,
    pub join_layers: JoinLayers,
    pub colors: IndexMap<String, String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            data_files: Vec::new(),
            buffer_layer: BufferLayerConfig {
                layer_name: String::new(),
                geometry_type: GeometryType::Point,
                params: BufferType::Circular.default_params(),
            },
            filter_data_files: FilterRegistry::new(),
            ratio_columns: IndexMap::new(),
            multiply_columns: IndexMap::new(),
            sum_columns: Vec::new(),
            max_columns: Vec::new(),
            min_columns: Vec::new(),
            mean_columns: Vec::new(),
            std_columns: Vec::new(),
            count_columns: Vec::new(),
            count_distinct_columns: Vec::new(),
            groupby_columns: Vec::new(),
            filter_global: Vec::new(),
            post_aggregation_metrics: Vec::new(),
            activate_visualisation: false,
            join_layers: JoinLayers::default(),
            colors: IndexMap::new(),
        }
    }
}

impl PipelineConfig {
    /// Apply a `/list_files` catalog: replaces the data-file list, assigns
    /// layer colors from the palette rotation, and points the buffer layer
    /// at the first catalog entry when its current layer is not listed.
    pub fn seed_catalog(&mut self, catalog: &IndexMap<String, String>) {
        self.data_files = catalog
            .iter()
            .map(|(name, path)| DataFileRef {
                name: name.clone(),
                path: path.clone(),
            })
            .collect();
        self.colors = catalog
            .keys()
            .enumerate()
            .map(|(i, name)| {
                (
                    name.clone(),
                    COLOR_PALETTE[i % COLOR_PALETTE.len()].to_string(),
                )
            })
            .collect();
        if !catalog.contains_key(&self.buffer_layer.layer_name) {
            if let Some(first) = catalog.keys().next() {
                self.buffer_layer.layer_name = first.clone();
            }
        }
    }

    pub fn has_data_file(&self, name: &str) -> bool {
        self.data_files.iter().any(|file| file.name == name)
    }

    /// Register a ratio column; duplicate names are a validation error,
    /// never a silent overwrite.
    pub fn add_ratio_column(
        &mut self,
        name: &str,
        ratio: RatioColumn,
    ) -> Result<(), ValidationError> {
        if self.ratio_columns.contains_key(name) || self.multiply_columns.contains_key(name) {
            return Err(ValidationError::DuplicateColumnName(name.to_string()));
        }
        self.ratio_columns.insert(name.to_string(), ratio);
        Ok(())
    }

    pub fn remove_ratio_column(&mut self, name: &str) {
        self.ratio_columns.shift_remove(name);
    }

    /// Register a multiply column; same duplicate-name rule as ratios.
    pub fn add_multiply_column(
        &mut self,
        name: &str,
        multiply: MultiplyColumn,
    ) -> Result<(), ValidationError> {
        if self.multiply_columns.contains_key(name) || self.ratio_columns.contains_key(name) {
            return Err(ValidationError::DuplicateColumnName(name.to_string()));
        }
        self.multiply_columns.insert(name.to_string(), multiply);
        Ok(())
    }

    pub fn remove_multiply_column(&mut self, name: &str) {
        self.multiply_columns.shift_remove(name);
    }

    pub fn columns(&self, kind: AggregationKind) -> &Vec<String> {
        match kind {
            AggregationKind::Sum => &self.sum_columns,
            AggregationKind::Max => &self.max_columns,
            AggregationKind::Min => &self.min_columns,
            AggregationKind::Mean => &self.mean_columns,
            AggregationKind::Std => &self.std_columns,
            AggregationKind::Count => &self.count_columns,
            AggregationKind::CountDistinct => &self.count_distinct_columns,
        }
    }

    pub fn columns_mut(&mut self, kind: AggregationKind) -> &mut Vec<String> {
        match kind {
            AggregationKind::Sum => &mut self.sum_columns,
            AggregationKind::Max => &mut self.max_columns,
            AggregationKind::Min => &mut self.min_columns,
            AggregationKind::Mean => &mut self.mean_columns,
            AggregationKind::Std => &mut self.std_columns,
            AggregationKind::Count => &mut self.count_columns,
            AggregationKind::CountDistinct => &mut self.count_distinct_columns,
        }
    }

    pub fn join_rule_mut(&mut self, geometry: JoinGeometry) -> &mut JoinRule {
        match geometry {
            JoinGeometry::Points => &mut self.join_layers.points,
            JoinGeometry::Polygons => &mut self.join_layers.polygons,
            JoinGeometry::Multipolygons => &mut self.join_layers.multipolygons,
            JoinGeometry::Linestrings => &mut self.join_layers.linestrings,
        }
    }

    /// Check everything submission depends on. Per-file filters may stay
    /// partial and may reference files absent from the catalog; neither
    /// blocks submission.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.has_data_file(&self.buffer_layer.layer_name) {
            return Err(ValidationError::UnknownLayer(
                self.buffer_layer.layer_name.clone(),
            ));
        }
        self.validate_buffer_params()?;

        for kind in AggregationKind::ALL {
            validate_entries(self.columns(kind), kind.section())?;
        }
        validate_entries(&self.groupby_columns, "groupby_columns")?;
        validate_entries(&self.post_aggregation_metrics, "post_aggregation_metrics")?;

        for (name, multiply) in &self.multiply_columns {
            if multiply.columns.len() < 2 {
                return Err(ValidationError::TooFewMultiplyColumns {
                    name: name.clone(),
                    found: multiply.columns.len(),
                });
            }
            validate_entries(&multiply.columns, "multiply_columns")?;
        }

        for filter in &self.filter_global {
            if filter.column.trim().is_empty() {
                return Err(ValidationError::EmptyColumnEntry {
                    section: "filter_global".to_string(),
                });
            }
        }
        Ok(())
    }

    fn validate_buffer_params(&self) -> Result<(), ValidationError> {
        match &self.buffer_layer.params {
            BufferParams::Circular { distance } => positive("distance", *distance),
            BufferParams::Grid { wide, length } | BufferParams::ZonesGrid { wide, length } => {
                positive("wide", *wide)?;
                positive("length", *length)
            }
            BufferParams::Isochrone {
                travel_time,
                speed,
                network_buffer,
                ..
            } => {
                if travel_time.is_empty() {
                    return Err(ValidationError::EmptyTravelTime);
                }
                for minutes in travel_time {
                    positive("travel_time", *minutes)?;
                }
                positive("speed", *speed)?;
                positive("network_buffer", *network_buffer)
            }
            BufferParams::Network { distance, .. } => positive("distance", *distance),
            BufferParams::Zones => Ok(()),
        }
    }
}

fn positive(field: &str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::NonPositiveField {
            field: field.to_string(),
        })
    }
}

fn validate_entries(entries: &[String], section: &str) -> Result<(), ValidationError> {
    if entries.iter().any(|entry| entry.trim().is_empty()) {
        return Err(ValidationError::EmptyColumnEntry {
            section: section.to_string(),
        });
    }
    Ok(())
}
